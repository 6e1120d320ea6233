// ==========================================
// 门店活动排班校验系统 - 排班校验 API
// ==========================================
// 职责: 对外暴露校验、修复向导、快速检查、候选人建议、提案审批
// 所有返回值均可 serde 序列化
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::fix::{FixAction, FixOutcome, FixableIssue};
use crate::domain::issue::{RangeValidationResult, ValidationResult, WeeklyValidationResult};
use crate::engine::{
    ApprovalOutcome, ApprovalService, AssignmentSubmitter, CandidateSuggester, CandidateSuggestion,
    ConflictCheck, DailyRuleEngine, FixApplier, FixOptionGenerator, NoOpSubmitter, RangeRuleEngine,
    RunApprovalSummary, ValidationRepositories, WeeklyAggregator,
};

/// 数据库默认路径
///
/// 优先级: SHIFT_GUARD_DB_PATH 环境变量 > 用户数据目录 > 当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var("SHIFT_GUARD_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./shift_guard.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("shift-guard");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("shift_guard.db");
        }
    }
    path.to_string_lossy().to_string()
}

// ==========================================
// ScheduleValidationApi - 排班校验 API
// ==========================================

/// 排班校验API
///
/// 职责：
/// 1. 单日/区间/周校验
/// 2. 修复向导（问题 + 修复菜单、执行修复）
/// 3. 快速冲突检查与候选人建议
/// 4. 提案审批与拒绝
pub struct ScheduleValidationApi {
    config_manager: Arc<ConfigManager>,
    daily_engine: DailyRuleEngine,
    range_engine: RangeRuleEngine,
    weekly_aggregator: WeeklyAggregator,
    fix_generator: FixOptionGenerator,
    fix_applier: FixApplier,
    candidate_suggester: CandidateSuggester,
    approval_service: ApprovalService,
}

impl ScheduleValidationApi {
    /// 基于共享连接创建（外部提交使用 NoOpSubmitter）
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self::with_submitter(conn, Arc::new(NoOpSubmitter))
    }

    /// 基于共享连接创建并注入外部提交者
    pub fn with_submitter(conn: Arc<Mutex<Connection>>, submitter: Arc<dyn AssignmentSubmitter>) -> Self {
        let repos = ValidationRepositories::new(conn.clone());
        let config_manager = Arc::new(ConfigManager::new(conn));

        Self {
            daily_engine: DailyRuleEngine::new(repos.clone(), config_manager.clone()),
            range_engine: RangeRuleEngine::new(repos.clone(), config_manager.clone()),
            weekly_aggregator: WeeklyAggregator::new(repos.clone(), config_manager.clone()),
            fix_generator: FixOptionGenerator::new(repos.clone(), config_manager.clone()),
            fix_applier: FixApplier::new(repos.clone(), config_manager.clone()),
            candidate_suggester: CandidateSuggester::new(repos.clone(), config_manager.clone()),
            approval_service: ApprovalService::new(repos, config_manager.clone(), submitter),
            config_manager,
        }
    }

    /// 打开数据库文件（必要时建表）并创建 API
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        info!(db_path, "数据库已打开");
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    pub fn config_manager(&self) -> Arc<ConfigManager> {
        self.config_manager.clone()
    }

    // ==========================================
    // 校验接口
    // ==========================================

    /// 单日校验
    pub fn verify_day(&self, date: NaiveDate) -> ApiResult<ValidationResult> {
        Ok(self.daily_engine.verify_day(date)?)
    }

    /// 区间校验
    ///
    /// # 参数
    /// - include_pending: 是否合并 run_id 的待审批提案（run_id 为空时无提案可合并）
    pub fn verify_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        include_pending: bool,
        run_id: Option<&str>,
    ) -> ApiResult<RangeValidationResult> {
        Ok(self.range_engine.verify_range(start, end, include_pending, run_id)?)
    }

    /// 周校验（week_start 起 7 天）
    pub fn validate_week(&self, week_start: NaiveDate) -> ApiResult<WeeklyValidationResult> {
        Ok(self.weekly_aggregator.validate_week(week_start)?)
    }

    // ==========================================
    // 修复向导接口
    // ==========================================

    pub fn get_fixable_issues(&self, week_start: NaiveDate) -> ApiResult<Vec<FixableIssue>> {
        Ok(self.fix_generator.get_fixable_issues(week_start)?)
    }

    /// 执行修复（失败以 success=false 返回，不抛错）
    pub fn apply_fix(&self, action: &FixAction) -> FixOutcome {
        self.fix_applier.apply_fix(action)
    }

    /// 以 (动作名, 目标 JSON) 形式执行修复
    pub fn apply_fix_raw(&self, action_kind: &str, target: JsonValue) -> FixOutcome {
        self.fix_applier.apply_fix_raw(action_kind, target)
    }

    // ==========================================
    // 快速检查 / 候选人
    // ==========================================

    pub fn quick_conflict_check(
        &self,
        employee_id: &str,
        timestamp: NaiveDateTime,
        event_ref: i64,
    ) -> ApiResult<ConflictCheck> {
        if employee_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("employee_id must not be empty".to_string()));
        }
        Ok(self.range_engine.quick_conflict_check(employee_id, timestamp, event_ref)?)
    }

    pub fn suggest_candidates(
        &self,
        event_ref: i64,
        timestamp: NaiveDateTime,
        exclude: &[String],
    ) -> ApiResult<Vec<CandidateSuggestion>> {
        Ok(self.candidate_suggester.suggest_candidates(event_ref, timestamp, exclude)?)
    }

    // ==========================================
    // 提案审批接口
    // ==========================================

    pub fn approve_proposal(&self, proposal_id: i64) -> ApiResult<ApprovalOutcome> {
        Ok(self.approval_service.approve_proposal(proposal_id)?)
    }

    pub fn approve_run(&self, run_id: &str) -> ApiResult<RunApprovalSummary> {
        Ok(self.approval_service.approve_run(run_id)?)
    }

    /// 拒绝运行
    ///
    /// # 返回
    /// - 删除的提案数
    pub fn reject_run(&self, run_id: &str) -> ApiResult<usize> {
        Ok(self.approval_service.reject_run(run_id)?)
    }

    // ==========================================
    // 配置
    // ==========================================

    /// 丢弃配置缓存（下次读取时重新加载）
    pub fn invalidate_config(&self) {
        self.config_manager.invalidate();
    }
}
