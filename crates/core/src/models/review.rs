use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 人工复核记录，需持有记录锁才能写入
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub record_id: String,
    pub reviewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
}
