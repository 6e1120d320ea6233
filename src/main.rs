// ==========================================
// 门店活动排班校验系统 - 命令行入口
// ==========================================
// 用法: shift-guard [db_path] <command> [args...]
// 结果以 JSON 输出到 stdout，日志输出到 stderr
// SHIFT_GUARD_LOG_JSON=1 时日志为 JSON 行格式
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use shift_guard::api::{default_db_path, ScheduleValidationApi};
use shift_guard::db::{init_schema, open_sqlite_connection, read_schema_version};
use shift_guard::logging;

const COMMANDS: &[&str] = &[
    "init",
    "verify-day",
    "verify-range",
    "validate-week",
    "fixable",
    "quick-check",
    "apply-fix",
];

const USAGE: &str = "\
usage: shift-guard [db_path] <command> [args...]

commands:
  init                                    create or upgrade the schema
  verify-day <YYYY-MM-DD>                 single-day validation
  verify-range <start> <end> [run_id]     range validation (run_id merges its proposals)
  validate-week <week_start>              weekly validation with health score
  fixable <week_start>                    issues with their fix options
  quick-check <employee_id> <YYYY-MM-DDTHH:MM> <event_ref>
  apply-fix <action> <target_json>        e.g. apply-fix unschedule '{\"assignment_id\": 3}'";

fn main() -> Result<()> {
    if std::env::var("SHIFT_GUARD_LOG_JSON").map_or(false, |v| v == "1") {
        logging::init_json();
    } else {
        logging::init();
    }

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", USAGE);
        return Ok(());
    }

    // 首个参数不是命令时视为数据库路径
    let db_path = if COMMANDS.contains(&args[0].as_str()) {
        default_db_path()
    } else {
        args.remove(0)
    };
    let Some(command) = (!args.is_empty()).then(|| args.remove(0)) else {
        bail!("missing command\n\n{}", USAGE);
    };
    tracing::info!(db_path = %db_path, command = %command, "shift-guard {}", shift_guard::VERSION);

    if command == "init" {
        let conn = open_sqlite_connection(&db_path)?;
        init_schema(&conn)?;
        let version = read_schema_version(&conn)?;
        return print_json(&serde_json::json!({ "db_path": db_path, "schema_version": version }));
    }

    let api = ScheduleValidationApi::open(&db_path)?;
    match command.as_str() {
        "verify-day" => print_json(&api.verify_day(parse_date(arg(&args, 0, "date")?)?)?),
        "verify-range" => {
            let start = parse_date(arg(&args, 0, "start")?)?;
            let end = parse_date(arg(&args, 1, "end")?)?;
            let run_id = args.get(2).map(String::as_str);
            print_json(&api.verify_range(start, end, run_id.is_some(), run_id)?)
        }
        "validate-week" => print_json(&api.validate_week(parse_date(arg(&args, 0, "week_start")?)?)?),
        "fixable" => print_json(&api.get_fixable_issues(parse_date(arg(&args, 0, "week_start")?)?)?),
        "quick-check" => {
            let employee_id = arg(&args, 0, "employee_id")?;
            let timestamp = parse_datetime(arg(&args, 1, "timestamp")?)?;
            let event_ref: i64 = arg(&args, 2, "event_ref")?
                .parse()
                .context("event_ref must be an integer")?;
            print_json(&api.quick_conflict_check(employee_id, timestamp, event_ref)?)
        }
        "apply-fix" => {
            let action = arg(&args, 0, "action")?;
            let target: serde_json::Value =
                serde_json::from_str(arg(&args, 1, "target_json")?).context("target_json is not valid JSON")?;
            let outcome = api.apply_fix_raw(action, target);
            print_json(&outcome)?;
            if !outcome.success {
                std::process::exit(1);
            }
            Ok(())
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{}>", name))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").with_context(|| format!("invalid date '{}'", raw))
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| anyhow!("invalid timestamp '{}'", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
