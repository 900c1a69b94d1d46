use thiserror::Error;

use crate::models::LockOwner;

/// 检查服务错误类型定义
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("无效的并发数: {value}，允许的取值: {allowed:?}")]
    InvalidConcurrency { value: u32, allowed: Vec<u32> },

    #[error("已有检查任务正在运行")]
    AlreadyRunning,

    #[error("记录 {record_id} 已被 {} 锁定", owner.name)]
    LockConflict { record_id: String, owner: LockOwner },

    #[error("修改记录 {record_id} 前必须先获取锁")]
    LockRequired { record_id: String },

    #[error("记录未找到: {id}")]
    RecordNotFound { id: String },

    #[error("浏览器自动化错误: {0}")]
    Automation(String),

    #[error("持久化错误: {0}")]
    Persistence(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl CheckerError {
    /// 冲突类错误（锁被占用或运行中），在边界上映射为冲突状态
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CheckerError::AlreadyRunning | CheckerError::LockConflict { .. }
        )
    }

    /// 同步拒绝的参数错误，从不进入队列
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CheckerError::Validation(_) | CheckerError::InvalidConcurrency { .. }
        )
    }
}

impl From<serde_json::Error> for CheckerError {
    fn from(err: serde_json::Error) -> Self {
        CheckerError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type CheckerResult<T> = std::result::Result<T, CheckerError>;
