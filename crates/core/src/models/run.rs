use serde::{Deserialize, Serialize};

use super::{CheckResult, GenerationId};

/// 运行状态快照
///
/// 由自动化服务在持有状态锁时生成，因此同一快照内的计数相互一致。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub concurrency_limit: u32,
    pub running: bool,
    pub initiator_user_id: Option<String>,
    pub generation_id: GenerationId,
    pub total_enqueued: u64,
    pub total_completed: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    /// 已入队但尚未派发的任务数
    pub pending: usize,
    /// 正在执行的分类数（跨代次统计）
    pub in_flight: usize,
}

/// 状态查询返回：快照加最近结果（最新在前）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub stats: RunStats,
    pub recent_results: Vec<CheckResult>,
}

/// 开启检查的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub success: bool,
    pub message: String,
    pub generation_id: GenerationId,
    pub enqueued: usize,
    /// 为 true 表示继续了一次被停止的运行，而不是开启新代次
    pub resumed: bool,
}
