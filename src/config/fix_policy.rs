use serde::{Deserialize, Serialize};

/// 修复建议置信度策略（手工调参表，非统计模型）
///
/// 存储位置：config_kv（key='fix_policy'，JSON），缺省字段取默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixPolicy {
    // ===== 候选人评分 =====
    /// 基础分
    pub candidate_base_score: i32,

    /// 角色为该活动首选角色时加分
    pub role_match_bonus: i32,

    /// 当日无其他排班时加分
    pub idle_day_bonus: i32,

    /// 当日每多一条排班扣分
    pub day_load_penalty: i32,

    /// 每条同类型历史排班加分
    pub experience_per_event: i32,

    /// 经验加分上限
    pub experience_cap: i32,

    /// 换人建议最多列出的候选人数
    pub max_reassign_candidates: usize,

    // ===== 各生成器置信度 =====
    /// 换人建议后追加的“取消排班”兜底
    pub unschedule_fallback: u8,

    /// 每日多 Core：取消多余排班
    pub unschedule_extra: u8,

    /// 补配 Supervisor
    pub pair_supervisor: u8,

    /// 改到首个时段（Lead 首时段问题）
    pub reschedule_lead_first_slot: u8,

    /// 改到其他有效时段
    pub reschedule_slot: u8,

    /// 周上限：逐条取消
    pub weekly_cap_trim: u8,

    /// 同日重复产品：取消重复项
    pub duplicate_product_trim: u8,

    /// 时段分布再平衡
    pub distribution_rebalance: u8,

    /// 忽略（始终追加，不参与推荐）
    pub ignore: u8,
}

impl Default for FixPolicy {
    fn default() -> Self {
        Self {
            candidate_base_score: 50,
            role_match_bonus: 20,
            idle_day_bonus: 15,
            day_load_penalty: 10,
            experience_per_event: 2,
            experience_cap: 15,
            max_reassign_candidates: 3,
            unschedule_fallback: 30,
            unschedule_extra: 75,
            pair_supervisor: 85,
            reschedule_lead_first_slot: 90,
            reschedule_slot: 60,
            weekly_cap_trim: 45,
            duplicate_product_trim: 60,
            distribution_rebalance: 65,
            ignore: 10,
        }
    }
}
