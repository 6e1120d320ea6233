// ==========================================
// 门店活动排班校验系统 - 候选人评分
// ==========================================
// 用途: 手工换人建议 + 修复向导的换人候选
// 评分: 基础分 + 角色匹配 + 当日负载 + 同类型经验，裁剪到 0-100
// 排序: 分数降序，同分保持输入顺序（员工ID升序）
// ==========================================

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::{ConfigManager, ScheduleSettings};
use crate::domain::employee::Employee;
use crate::domain::schedule::{EventWindow, RecordSource, ScheduleRecord};
use crate::domain::types::EmployeeRole;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::ValidationRepositories;
use crate::engine::schedule_core::ScheduleCore;
use crate::engine::snapshot::ScheduleSnapshot;
use crate::repository::RepositoryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSuggestion {
    pub employee_id: String,
    pub name: String,
    pub role: EmployeeRole,
    /// 0-100
    pub score: u8,
    pub day_load: usize,
    pub experience: i64,
    pub reasons: Vec<String>,
}

/// 评分输入
pub struct CandidateRequest<'a> {
    pub event: &'a EventWindow,
    pub timestamp: NaiveDateTime,
    pub exclude: &'a [String],
    /// 目标时间附近的全部记录（用于冲突与负载）
    pub records: &'a [ScheduleRecord],
    /// employee_id -> 同类型历史排班数
    pub experience: &'a HashMap<String, i64>,
}

// ==========================================
// CandidateScorer - 纯函数
// ==========================================
pub struct CandidateScorer;

impl CandidateScorer {
    /// 筛选并评分候选人
    pub fn rank(
        snapshot: &ScheduleSnapshot,
        settings: &ScheduleSettings,
        request: &CandidateRequest,
    ) -> Vec<CandidateSuggestion> {
        let mut employees: Vec<&Employee> = snapshot.employees.values().collect();
        employees.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));

        let mut ranked: Vec<CandidateSuggestion> = employees
            .into_iter()
            .filter(|e| Self::is_eligible(snapshot, settings, request, e))
            .map(|e| Self::score(settings, request, e))
            .collect();

        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }

    /// 资格: 在职、角色可做、未排除、当日可用、无时间冲突、Core 不超每日上限
    pub fn is_eligible(
        snapshot: &ScheduleSnapshot,
        settings: &ScheduleSettings,
        request: &CandidateRequest,
        employee: &Employee,
    ) -> bool {
        let event_type = request.event.event_type;
        let date = request.timestamp.date();

        if !employee.is_active
            || !employee.role.can_work(event_type)
            || request.exclude.iter().any(|x| *x == employee.employee_id)
            || !snapshot.verdict(&employee.employee_id, date).is_available()
        {
            return false;
        }

        let requested = ScheduleRecord {
            source: RecordSource::Pending,
            record_id: 0,
            event_ref: request.event.event_ref,
            employee_id: employee.employee_id.clone(),
            schedule_datetime: request.timestamp,
            event_type,
            project_name: request.event.project_name.clone(),
            duration_minutes: settings.duration_minutes(event_type, request.event.estimated_minutes),
        };

        let own = request.records.iter().filter(|r| r.employee_id == employee.employee_id);
        for r in own {
            if ScheduleCore::is_double_booking(&requested, r, Some(employee.role)) {
                return false;
            }
            if event_type.is_core() && r.event_type.is_core() && r.date() == date && r.event_ref != request.event.event_ref {
                return false;
            }
        }
        true
    }

    fn score(settings: &ScheduleSettings, request: &CandidateRequest, employee: &Employee) -> CandidateSuggestion {
        let policy = &settings.fix_policy;
        let date = request.timestamp.date();
        let mut reasons = Vec::new();
        let mut score = policy.candidate_base_score;

        if employee.role.is_preferred_for(request.event.event_type) {
            score += policy.role_match_bonus;
            reasons.push(format!("preferred role ({})", employee.role));
        }

        let day_load = request
            .records
            .iter()
            .filter(|r| r.employee_id == employee.employee_id && r.date() == date)
            .count();
        if day_load == 0 {
            score += policy.idle_day_bonus;
            reasons.push("no other events that day".to_string());
        } else {
            score -= policy.day_load_penalty * day_load as i32;
            reasons.push(format!("{} other event(s) that day", day_load));
        }

        let experience = request.experience.get(&employee.employee_id).copied().unwrap_or(0);
        if experience > 0 {
            let bonus = (experience as i32)
                .saturating_mul(policy.experience_per_event)
                .min(policy.experience_cap);
            score += bonus;
            reasons.push(format!("{} prior {} event(s)", experience, request.event.event_type));
        }

        CandidateSuggestion {
            employee_id: employee.employee_id.clone(),
            name: employee.name.clone(),
            role: employee.role,
            score: score.clamp(0, 100) as u8,
            day_load,
            experience,
            reasons,
        }
    }
}

// ==========================================
// CandidateSuggester - 手工换人建议
// ==========================================
pub struct CandidateSuggester {
    repos: ValidationRepositories,
    config: Arc<ConfigManager>,
}

impl CandidateSuggester {
    pub fn new(repos: ValidationRepositories, config: Arc<ConfigManager>) -> Self {
        Self { repos, config }
    }

    /// 为活动在指定时间推荐候选人
    ///
    /// # 参数
    /// - exclude: 不参与推荐的员工（通常为当前负责人）
    #[instrument(skip(self))]
    pub fn suggest_candidates(
        &self,
        event_ref: i64,
        timestamp: NaiveDateTime,
        exclude: &[String],
    ) -> EngineResult<Vec<CandidateSuggestion>> {
        let settings = self.config.settings()?;
        let event = self
            .repos
            .event_repo
            .find_by_ref(event_ref)?
            .ok_or_else(|| EngineError::Repository(RepositoryError::not_found("event_window", event_ref)))?;

        let date = timestamp.date();
        let snapshot = self
            .repos
            .load_snapshot(date - Duration::days(1), date + Duration::days(1))?;
        let records = snapshot.committed_records(&settings);
        let experience = self.repos.assignment_repo.count_by_event_type(event.event_type)?;

        let ranked = CandidateScorer::rank(
            &snapshot,
            &settings,
            &CandidateRequest {
                event: &event,
                timestamp,
                exclude,
                records: &records,
                experience: &experience,
            },
        );
        debug!(event_ref, candidates = ranked.len(), "候选人评分完成");
        Ok(ranked)
    }
}
