// ==========================================
// 门店活动排班校验系统 - 提案审批
// ==========================================
// 流程: IMMEDIATE 事务 → 重读提案 → 快速冲突检查 → 外部提交 → 落库
// 外部提交通过 AssignmentSubmitter trait 注入（依赖倒置）
// Core 提案落库后在同一事务内补配 Supervisor
// ==========================================

use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::ConfigManager;
use crate::domain::schedule::{Assignment, NewAssignment, Proposal};
use crate::domain::types::{EventCondition, ProposalStatus, SyncStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::fix_applier::pair_supervisor_in;
use crate::engine::range_rules::RangeRuleEngine;
use crate::engine::repositories::ValidationRepositories;
use crate::repository::assignment_repo::insert_assignment;
use crate::repository::event_repo::{select_event, update_event_condition};
use crate::repository::proposal_repo::{select_proposal, update_proposal_status};
use crate::repository::RepositoryError;

// ==========================================
// 外部提交 Trait
// ==========================================

/// 排班外部提交者
///
/// 审批时把提案推送到外部排班系统；失败时提案标记为 api_failed
pub trait AssignmentSubmitter: Send + Sync {
    fn submit(&self, proposal: &Proposal) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作提交者（本地落库即视为成功）
#[derive(Debug, Clone, Default)]
pub struct NoOpSubmitter;

impl AssignmentSubmitter for NoOpSubmitter {
    fn submit(&self, proposal: &Proposal) -> Result<(), Box<dyn Error + Send + Sync>> {
        debug!(proposal_id = proposal.proposal_id, "NoOpSubmitter: 跳过外部提交");
        Ok(())
    }
}

// ==========================================
// 审批结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub proposal_id: i64,
    /// 处理后的提案状态
    pub status: ProposalStatus,
    /// false: 提案已不在待审批状态，未做任何处理
    pub processed: bool,
    pub assignment_id: Option<i64>,
    pub supervisor_assignment_id: Option<i64>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunApprovalSummary {
    pub run_id: String,
    pub submitted: usize,
    pub validation_failed: usize,
    pub api_failed: usize,
    pub outcomes: Vec<ApprovalOutcome>,
}

// ==========================================
// ApprovalService - 提案审批
// ==========================================
pub struct ApprovalService {
    repos: ValidationRepositories,
    config: Arc<ConfigManager>,
    submitter: Arc<dyn AssignmentSubmitter>,
}

impl ApprovalService {
    pub fn new(
        repos: ValidationRepositories,
        config: Arc<ConfigManager>,
        submitter: Arc<dyn AssignmentSubmitter>,
    ) -> Self {
        Self {
            repos,
            config,
            submitter,
        }
    }

    /// 审批单个提案
    ///
    /// # 返回
    /// - Ok(outcome): 含冲突/提交失败（已记录到提案状态）
    /// - Err: 基础设施错误（事务已回滚）
    #[instrument(skip(self))]
    pub fn approve_proposal(&self, proposal_id: i64) -> EngineResult<ApprovalOutcome> {
        let settings = self.config.settings()?;

        let mut conn = self.repos.lock_conn()?;
        let mut tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let proposal = select_proposal(&tx, proposal_id)?
            .ok_or_else(|| RepositoryError::not_found("proposal", proposal_id))?;
        if !proposal.status.is_active() {
            debug!(proposal_id, status = %proposal.status, "提案已处理，跳过");
            return Ok(ApprovalOutcome {
                proposal_id,
                status: proposal.status,
                processed: false,
                assignment_id: None,
                supervisor_assignment_id: None,
                message: format!("proposal already {}", proposal.status),
            });
        }
        let (Some(employee_id), Some(schedule_datetime)) =
            (proposal.employee_id.clone(), proposal.schedule_datetime)
        else {
            return Err(EngineError::InvalidInput(format!(
                "proposal {} has no employee or time set",
                proposal_id
            )));
        };

        // 1. 提交前快速冲突检查
        let check = RangeRuleEngine::check_conflict_in(
            &tx,
            &settings,
            &employee_id,
            schedule_datetime,
            proposal.event_ref,
            None,
        )?;
        if let Some(kind) = check.kind {
            let reason = format!("{:?} conflict: {}", kind, serde_json::Value::Object(check.details));
            update_proposal_status(&tx, proposal_id, ProposalStatus::ValidationFailed, Some(&reason))?;
            tx.commit().map_err(RepositoryError::from)?;
            warn!(proposal_id, employee_id = %employee_id, reason = %reason, "提案校验失败");
            return Ok(failed_outcome(proposal_id, ProposalStatus::ValidationFailed, reason));
        }

        // 2. 外部提交
        if let Err(e) = self.submitter.submit(&proposal) {
            let reason = e.to_string();
            update_proposal_status(&tx, proposal_id, ProposalStatus::ApiFailed, Some(&reason))?;
            tx.commit().map_err(RepositoryError::from)?;
            warn!(proposal_id, reason = %reason, "外部提交失败");
            return Ok(failed_outcome(proposal_id, ProposalStatus::ApiFailed, reason));
        }

        // 3. 落库
        let event = select_event(&tx, proposal.event_ref)?
            .ok_or_else(|| RepositoryError::not_found("event_window", proposal.event_ref))?;
        let assignment_id = insert_assignment(
            &tx,
            &NewAssignment {
                event_ref: proposal.event_ref,
                employee_id: employee_id.clone(),
                schedule_datetime,
                shift_block: proposal
                    .shift_block
                    .or_else(|| settings.shift_block_for(schedule_datetime.time())),
            },
        )?;
        update_event_condition(&tx, proposal.event_ref, EventCondition::Scheduled)?;
        update_proposal_status(&tx, proposal_id, ProposalStatus::ApiSubmitted, None)?;

        // 4. Core 补配 Supervisor（失败只回滚保存点）
        let mut supervisor_assignment_id = None;
        if event.event_type.is_core() {
            let sp = tx.savepoint().map_err(RepositoryError::from)?;
            let core = Assignment {
                assignment_id,
                event_ref: proposal.event_ref,
                employee_id: employee_id.clone(),
                schedule_datetime,
                shift_block: None,
                sync_status: SyncStatus::Pending,
            };
            match pair_supervisor_in(&sp, &settings, &core, &event) {
                Ok((id, _)) => {
                    sp.commit().map_err(RepositoryError::from)?;
                    supervisor_assignment_id = Some(id);
                }
                Err(e) => warn!(proposal_id, assignment_id, error = %e, "Supervisor 自动配对未完成"),
            }
        }

        tx.commit().map_err(RepositoryError::from)?;
        info!(proposal_id, assignment_id, ?supervisor_assignment_id, "提案审批通过");

        Ok(ApprovalOutcome {
            proposal_id,
            status: ProposalStatus::ApiSubmitted,
            processed: true,
            assignment_id: Some(assignment_id),
            supervisor_assignment_id,
            message: format!("{} scheduled for {} at {}", event.project_name, employee_id, schedule_datetime),
        })
    }

    /// 按提案ID顺序审批一次运行的全部待审批提案
    #[instrument(skip(self))]
    pub fn approve_run(&self, run_id: &str) -> EngineResult<RunApprovalSummary> {
        let pending: Vec<i64> = self
            .repos
            .proposal_repo
            .list_for_run(run_id)?
            .into_iter()
            .filter(|p| p.status.is_active())
            .map(|p| p.proposal_id)
            .collect();

        let mut summary = RunApprovalSummary {
            run_id: run_id.to_string(),
            ..Default::default()
        };
        for proposal_id in pending {
            let outcome = self.approve_proposal(proposal_id)?;
            match outcome.status {
                ProposalStatus::ApiSubmitted if outcome.processed => summary.submitted += 1,
                ProposalStatus::ValidationFailed => summary.validation_failed += 1,
                ProposalStatus::ApiFailed => summary.api_failed += 1,
                _ => {}
            }
            summary.outcomes.push(outcome);
        }

        info!(
            run_id,
            submitted = summary.submitted,
            validation_failed = summary.validation_failed,
            api_failed = summary.api_failed,
            "运行审批完成"
        );
        Ok(summary)
    }

    /// 拒绝运行: 删除其全部待审批提案
    #[instrument(skip(self))]
    pub fn reject_run(&self, run_id: &str) -> EngineResult<usize> {
        let deleted = self.repos.proposal_repo.delete_pending_for_run(run_id)?;
        info!(run_id, deleted, "运行已拒绝");
        Ok(deleted)
    }
}

fn failed_outcome(proposal_id: i64, status: ProposalStatus, message: String) -> ApprovalOutcome {
    ApprovalOutcome {
        proposal_id,
        status,
        processed: true,
        assignment_id: None,
        supervisor_assignment_id: None,
        message,
    }
}
