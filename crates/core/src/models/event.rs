use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CheckResult, GenerationId, Lock, ReviewRecord, RunStats};

/// 事件总线主题
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    Result,
    Stats,
    Complete,
    LockUpdate,
    ReviewUpdated,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Result,
        Topic::Stats,
        Topic::Complete,
        Topic::LockUpdate,
        Topic::ReviewUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Result => "result",
            Topic::Stats => "stats",
            Topic::Complete => "complete",
            Topic::LockUpdate => "lock-update",
            Topic::ReviewUpdated => "review-updated",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个检查结果事件，只推送给发起运行的用户
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultEvent {
    pub initiator_user_id: Option<String>,
    pub result: CheckResult,
}

/// 统计更新事件，只推送给发起运行的用户
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsEvent {
    pub initiator_user_id: Option<String>,
    pub stats: RunStats,
}

/// 某一代次全部任务完成
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunCompleted {
    pub generation_id: GenerationId,
    pub initiator_user_id: Option<String>,
    pub total_completed: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub completed_at: DateTime<Utc>,
}

/// 锁状态变化；`lock` 为 None 表示已释放或过期清除
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockUpdate {
    pub record_id: String,
    pub lock: Option<Lock>,
}

/// 事件总线上传递的事件
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Result(ResultEvent),
    Stats(StatsEvent),
    Complete(RunCompleted),
    LockUpdate(LockUpdate),
    ReviewUpdated(ReviewRecord),
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::Result(_) => Topic::Result,
            BusEvent::Stats(_) => Topic::Stats,
            BusEvent::Complete(_) => Topic::Complete,
            BusEvent::LockUpdate(_) => Topic::LockUpdate,
            BusEvent::ReviewUpdated(_) => Topic::ReviewUpdated,
        }
    }

    /// 用户范围事件返回目标用户；广播事件返回 None
    pub fn audience(&self) -> Option<&str> {
        match self {
            BusEvent::Result(event) => Some(event.initiator_user_id.as_deref().unwrap_or("")),
            BusEvent::Stats(event) => Some(event.initiator_user_id.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    /// 事件负载的JSON表示
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            BusEvent::Result(event) => serde_json::to_value(event),
            BusEvent::Stats(event) => serde_json::to_value(event),
            BusEvent::Complete(event) => serde_json::to_value(event),
            BusEvent::LockUpdate(event) => serde_json::to_value(event),
            BusEvent::ReviewUpdated(event) => serde_json::to_value(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        let names: Vec<&str> = Topic::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec!["result", "stats", "complete", "lock-update", "review-updated"]
        );
        assert_eq!(
            serde_json::to_string(&Topic::LockUpdate).unwrap(),
            "\"lock-update\""
        );
    }

    #[test]
    fn test_broadcast_events_have_no_audience() {
        let event = BusEvent::LockUpdate(LockUpdate {
            record_id: "r1".into(),
            lock: None,
        });
        assert_eq!(event.topic(), Topic::LockUpdate);
        assert!(event.audience().is_none());

        let payload = event.payload().unwrap();
        assert_eq!(payload["recordId"], "r1");
        assert!(payload["lock"].is_null());
    }
}
