use std::time::Duration;

use async_trait::async_trait;
use checker_core::{AutomationDriver, CheckerError, CheckerResult, DriverConfig, PageSnapshot};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    url: &'a str,
    timeout_ms: u64,
}

/// 远程无头浏览器渲染服务驱动
///
/// - `POST {endpoint}/render` `{url, timeoutMs}` → [`PageSnapshot`] JSON
/// - `POST {endpoint}/screenshot` `{url, timeoutMs}` → 图片字节
pub struct HttpAutomationDriver {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpAutomationDriver {
    pub fn new(config: &DriverConfig) -> CheckerResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| CheckerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn request(&self, path: &str, url: &str, timeout: Duration) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}{}", self.endpoint, path))
            .timeout(timeout)
            .json(&RenderRequest {
                url,
                timeout_ms: timeout.as_millis() as u64,
            });

        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(
        &self,
        path: &str,
        url: &str,
        timeout: Duration,
    ) -> CheckerResult<reqwest::Response> {
        let response = self
            .request(path, url, timeout)
            .send()
            .await
            .map_err(|e| CheckerError::Automation(format!("浏览器服务请求失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                path = path,
                status = status.as_u16(),
                "Rendering service returned an error"
            );
            return Err(CheckerError::Automation(format!(
                "浏览器服务返回错误状态 {}: {}",
                status.as_u16(),
                body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl AutomationDriver for HttpAutomationDriver {
    async fn render(&self, url: &str, timeout: Duration) -> CheckerResult<PageSnapshot> {
        debug!(url = url, "Rendering page");

        let response = self.send("/render", url, timeout).await?;
        response
            .json::<PageSnapshot>()
            .await
            .map_err(|e| CheckerError::Automation(format!("解析渲染结果失败: {e}")))
    }

    async fn capture_artifact(&self, url: &str, timeout: Duration) -> CheckerResult<Vec<u8>> {
        let response = self.send("/screenshot", url, timeout).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CheckerError::Automation(format!("读取截图失败: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}
