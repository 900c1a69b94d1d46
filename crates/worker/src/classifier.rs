use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use checker_core::{
    AutomationConfig, AutomationDriver, CheckStatus, Classification, DriverConfig, PageSnapshot,
};
use chrono::Utc;
use tracing::{debug, info, warn};

const EXCERPT_CHARS: usize = 160;
const UNRECOGNIZED_PAGE: &str = "unrecognized page";

/// 分类器设置
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub live_markers: Vec<String>,
    pub missing_markers: Vec<String>,
    pub capture_artifacts: bool,
    pub artifact_timeout: Duration,
    pub artifact_dir: PathBuf,
}

impl ClassifierSettings {
    pub fn from_config(automation: &AutomationConfig, driver: &DriverConfig) -> Self {
        Self {
            live_markers: normalize_markers(&automation.live_markers),
            missing_markers: normalize_markers(&automation.missing_markers),
            capture_artifacts: automation.capture_artifacts,
            artifact_timeout: automation.artifact_timeout(),
            artifact_dir: PathBuf::from(&driver.artifact_dir),
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self::from_config(&AutomationConfig::default(), &DriverConfig::default())
    }
}

fn normalize_markers(markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect()
}

/// 列表状态分类器
///
/// 通过 [`AutomationDriver`] 加载页面并根据标记判断 LIVE / MISSING / ERROR。
/// 调用方总是得到三种状态之一：驱动错误、超时和驱动 panic 都会归一化为 ERROR。
pub struct StatusClassifier {
    driver: Arc<dyn AutomationDriver>,
    settings: ClassifierSettings,
}

impl StatusClassifier {
    pub fn new(driver: Arc<dyn AutomationDriver>, settings: ClassifierSettings) -> Self {
        Self { driver, settings }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// 分类单个URL，总耗时不超过 `timeout`
    pub async fn classify(&self, url: &str, timeout: Duration) -> Classification {
        let start_time = Instant::now();

        let driver = Arc::clone(&self.driver);
        let target = url.to_string();
        let mut render = tokio::spawn(async move { driver.render(&target, timeout).await });

        let classification = tokio::select! {
            joined = &mut render => match joined {
                Ok(Ok(snapshot)) => self.interpret(&snapshot),
                Ok(Err(e)) => Classification::error(e.to_string()),
                Err(e) => Classification::error(format!("automation session crashed: {e}")),
            },
            _ = tokio::time::sleep(timeout) => {
                render.abort();
                Classification::error(format!("timed out after {}ms", timeout.as_millis()))
            }
        };

        debug!(
            url = url,
            status = %classification.status,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Classification finished"
        );

        if classification.status == CheckStatus::Error && self.settings.capture_artifacts {
            self.spawn_artifact_capture(url);
        }

        classification
    }

    /// 根据页面快照判定状态，下架标记优先于在线标记
    pub fn interpret(&self, snapshot: &PageSnapshot) -> Classification {
        if let Some(status @ (404 | 410)) = snapshot.http_status {
            return Classification::missing(Some(format!("HTTP {status}")));
        }

        let haystack = format!(
            "{}\n{}",
            snapshot.title.as_deref().unwrap_or_default(),
            snapshot.body_text
        )
        .to_lowercase();

        if let Some(marker) = self
            .settings
            .missing_markers
            .iter()
            .find(|m| haystack.contains(m.as_str()))
        {
            return Classification::missing(Some(marker.clone()));
        }

        if self
            .settings
            .live_markers
            .iter()
            .any(|m| haystack.contains(m.as_str()))
        {
            let text = snapshot
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .or_else(|| excerpt(&snapshot.body_text));
            return Classification::live(text);
        }

        Classification::error(UNRECOGNIZED_PAGE)
    }

    fn spawn_artifact_capture(&self, url: &str) {
        let driver = Arc::clone(&self.driver);
        let url = url.to_string();
        let timeout = self.settings.artifact_timeout;
        let dir = self.settings.artifact_dir.clone();

        tokio::spawn(async move {
            let bytes = match tokio::time::timeout(timeout, driver.capture_artifact(&url, timeout))
                .await
            {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    warn!(url = %url, "Artifact capture failed: {}", e);
                    return;
                }
                Err(_) => {
                    warn!(url = %url, "Artifact capture timed out");
                    return;
                }
            };

            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                warn!("Failed to create artifact dir {}: {}", dir.display(), e);
                return;
            }

            let path = dir.join(artifact_file_name(&url));
            match tokio::fs::write(&path, &bytes).await {
                Ok(()) => info!(url = %url, path = %path.display(), "Diagnostic artifact saved"),
                Err(e) => warn!("Failed to write artifact {}: {}", path.display(), e),
            }
        });
    }
}

fn excerpt(body: &str) -> Option<String> {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(EXCERPT_CHARS).collect())
}

fn artifact_file_name(url: &str) -> String {
    let slug: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(80)
        .collect();
    format!("{}-{}.png", Utc::now().format("%Y%m%dT%H%M%S%3f"), slug)
}
