// ==========================================
// 门店活动排班校验系统 - 行映射工具
// ==========================================
// 职责: 日期/时间戳/枚举列的解析与格式化
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;

use crate::db::{DATETIME_FORMAT, DATE_FORMAT};

/// 格式化日期
pub fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// 格式化时间戳
pub fn fmt_datetime(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// 解析日期列
pub fn parse_date_col(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .or_else(|_| parse_datetime_text(raw).map(|ts| ts.date()).ok_or(()))
        .map_err(|_| conversion_error(idx, format!("invalid date: {}", raw)))
}

/// 解析时间戳列（兼容 'T' 分隔与秒级缺省）
pub fn parse_datetime_col(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    parse_datetime_text(raw).ok_or_else(|| conversion_error(idx, format!("invalid datetime: {}", raw)))
}

fn parse_datetime_text(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    [DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// 解析可选时间戳列
pub fn parse_opt_datetime_col(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_datetime_col(idx, &s)).transpose()
}

/// 解析枚举列
pub fn parse_enum_col<T>(idx: usize, raw: &str, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| conversion_error(idx, format!("unknown value: {}", raw)))
}
