use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 运行代次标识，每次开启新运行或重置队列时递增
pub type GenerationId = u64;

/// 检查状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CheckStatus {
    /// 目标内容仍然在线
    #[serde(rename = "LIVE")]
    Live,
    /// 目标内容已下架或不存在
    #[serde(rename = "MISSING")]
    Missing,
    /// 检查失败（超时、崩溃、无法识别的页面等）
    #[serde(rename = "ERROR")]
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Live => "LIVE",
            CheckStatus::Missing => "MISSING",
            CheckStatus::Error => "ERROR",
        }
    }

    /// LIVE 与 MISSING 都是确定的分类结果
    pub fn is_definitive(&self) -> bool {
        !matches!(self, CheckStatus::Error)
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 检查任务
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckTask {
    pub record_id: String,
    pub url: String,
    pub enqueued_at: DateTime<Utc>,
    pub generation_id: GenerationId,
}

impl CheckTask {
    pub fn new(
        record_id: impl Into<String>,
        url: impl Into<String>,
        generation_id: GenerationId,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            url: url.into(),
            enqueued_at: Utc::now(),
            generation_id,
        }
    }
}

/// 分类器输出：状态和可选的提取文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: CheckStatus,
    pub extracted_text: Option<String>,
}

impl Classification {
    pub fn live(text: Option<String>) -> Self {
        Self {
            status: CheckStatus::Live,
            extracted_text: text,
        }
    }

    pub fn missing(text: Option<String>) -> Self {
        Self {
            status: CheckStatus::Missing,
            extracted_text: text,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Error,
            extracted_text: Some(reason.into()),
        }
    }
}

/// 检查结果，创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub record_id: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub generation_id: GenerationId,
}

impl CheckResult {
    pub fn from_classification(task: &CheckTask, classification: Classification) -> Self {
        Self {
            record_id: task.record_id.clone(),
            status: classification.status,
            extracted_text: classification.extracted_text,
            checked_at: Utc::now(),
            generation_id: task.generation_id,
        }
    }
}
