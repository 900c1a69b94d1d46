use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 锁持有者身份
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockOwner {
    pub user_id: String,
    pub name: String,
}

/// 记录锁
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub record_id: String,
    pub owner_user_id: String,
    pub owner_name: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lock {
    /// `now > expires_at` 之后锁即失效
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn owner(&self) -> LockOwner {
        LockOwner {
            user_id: self.owner_user_id.clone(),
            name: self.owner_name.clone(),
        }
    }
}

/// 获取锁的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcquireOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<Lock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<LockOwner>,
}

impl AcquireOutcome {
    pub fn granted(lock: Lock) -> Self {
        Self {
            success: true,
            lock: Some(lock),
            locked_by: None,
        }
    }

    pub fn denied(owner: LockOwner) -> Self {
        Self {
            success: false,
            lock: None,
            locked_by: Some(owner),
        }
    }
}
