use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 检查自动化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// 默认并发数
    pub default_concurrency: u32,
    /// 允许的并发取值，每个槽位对应一个浏览器会话
    pub allowed_concurrency: Vec<u32>,
    /// 单次分类的硬超时（毫秒）
    pub classification_timeout_ms: u64,
    /// 最近结果列表长度
    pub recent_results_limit: usize,
    /// 持久化失败后的重试次数
    pub persist_retries: u32,
    pub persist_retry_delay_ms: u64,
    /// 单次保存的超时（毫秒），超时按一次失败计
    pub persist_timeout_ms: u64,
    /// ERROR 结果是否抓取诊断截图
    pub capture_artifacts: bool,
    pub artifact_timeout_ms: u64,
    /// 在线标记（不区分大小写）
    pub live_markers: Vec<String>,
    /// 下架标记（不区分大小写），优先于在线标记
    pub missing_markers: Vec<String>,
    /// 关闭时等待进行中任务的时间（秒）
    pub shutdown_grace_seconds: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 3,
            allowed_concurrency: vec![3, 5, 10],
            classification_timeout_ms: 45_000,
            recent_results_limit: 50,
            persist_retries: 3,
            persist_retry_delay_ms: 500,
            persist_timeout_ms: 10_000,
            capture_artifacts: true,
            artifact_timeout_ms: 10_000,
            live_markers: vec![
                "add to cart".to_string(),
                "buy now".to_string(),
                "contact seller".to_string(),
                "view listing".to_string(),
            ],
            missing_markers: vec![
                "page not found".to_string(),
                "no longer available".to_string(),
                "listing has been removed".to_string(),
                "this listing has ended".to_string(),
            ],
            shutdown_grace_seconds: 30,
        }
    }
}

impl AutomationConfig {
    pub fn classification_timeout(&self) -> Duration {
        Duration::from_millis(self.classification_timeout_ms)
    }

    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_millis(self.artifact_timeout_ms)
    }

    pub fn persist_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persist_retry_delay_ms)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    pub fn is_allowed_concurrency(&self, value: u32) -> bool {
        self.allowed_concurrency.contains(&value)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.allowed_concurrency.is_empty() {
            return Err(anyhow::anyhow!("允许的并发取值不能为空"));
        }

        if self.allowed_concurrency.contains(&0) {
            return Err(anyhow::anyhow!("并发数必须大于0"));
        }

        if !self.is_allowed_concurrency(self.default_concurrency) {
            return Err(anyhow::anyhow!(
                "默认并发数 {} 不在允许范围 {:?} 内",
                self.default_concurrency,
                self.allowed_concurrency
            ));
        }

        if self.classification_timeout_ms == 0 {
            return Err(anyhow::anyhow!("分类超时时间必须大于0"));
        }

        if self.persist_timeout_ms == 0 {
            return Err(anyhow::anyhow!("持久化超时时间必须大于0"));
        }

        if self.recent_results_limit == 0 {
            return Err(anyhow::anyhow!("最近结果列表长度必须大于0"));
        }

        if self.live_markers.is_empty() && self.missing_markers.is_empty() {
            return Err(anyhow::anyhow!("至少需要配置一个在线或下架标记"));
        }

        Ok(())
    }
}
