use serde::{Deserialize, Serialize};

/// 远程浏览器渲染服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub connect_timeout_seconds: u64,
    /// 诊断截图保存目录
    pub artifact_dir: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000".to_string(),
            api_token: None,
            connect_timeout_seconds: 10,
            artifact_dir: "artifacts".to_string(),
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "浏览器服务地址必须以 http:// 或 https:// 开头: {}",
                self.endpoint
            ));
        }

        if self.connect_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }

        if self.artifact_dir.is_empty() {
            return Err(anyhow::anyhow!("截图目录不能为空"));
        }

        Ok(())
    }
}

/// 记录存储配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 启动时加载的记录文件（JSON数组，元素为 `{"id": ..., "url": ...}`）
    pub seed_file: Option<String>,
}

impl StoreConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.seed_file {
            if path.trim().is_empty() {
                return Err(anyhow::anyhow!("记录文件路径不能为空字符串"));
            }
        }
        Ok(())
    }
}
