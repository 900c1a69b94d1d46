use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CheckerResult;

/// 浏览器渲染后的页面快照
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    /// 跟随重定向后的最终地址
    pub final_url: String,
    pub http_status: Option<u16>,
    pub title: Option<String>,
    pub body_text: String,
}

/// 浏览器自动化能力抽象接口
///
/// 输入URL，在给定时间内返回页面快照或失败。实现方可以是远程无头浏览器服务、
/// 本地浏览器进程池或测试替身。
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// 加载并渲染页面
    async fn render(&self, url: &str, timeout: Duration) -> CheckerResult<PageSnapshot>;

    /// 抓取诊断截图，尽力而为
    async fn capture_artifact(&self, url: &str, timeout: Duration) -> CheckerResult<Vec<u8>>;

    /// 驱动名称，用于日志
    fn name(&self) -> &str;
}
