use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    automation::AutomationConfig,
    driver_store::{DriverConfig, StoreConfig},
    locks::LockConfig,
};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub automation: AutomationConfig,
    pub locks: LockConfig,
    pub driver: DriverConfig,
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: CHECKER_, nesting: __)
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file path, if None use default paths
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        // 1. Load config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/checker.toml",
                "checker.toml",
                "/etc/checker/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        // 2. Environment variable overrides - highest priority
        builder = builder.add_source(
            Environment::with_prefix("CHECKER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.automation
            .validate()
            .context("自动化检查配置验证失败")?;

        self.locks.validate().context("锁配置验证失败")?;

        self.driver.validate().context("浏览器服务配置验证失败")?;

        self.store.validate().context("记录存储配置验证失败")?;

        self.api.validate().context("API配置验证失败")?;

        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.automation.allowed_concurrency, vec![3, 5, 10]);
        assert_eq!(config.automation.classification_timeout_ms, 45_000);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [automation]
            default_concurrency = 5

            [locks]
            ttl_seconds = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.automation.default_concurrency, 5);
        assert_eq!(config.locks.ttl_seconds, 120);
        assert_eq!(config.locks.sweep_interval_seconds, 60);
        assert_eq!(config.api.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_default_concurrency_must_be_allowed() {
        let result = AppConfig::from_toml(
            r#"
            [automation]
            default_concurrency = 4
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let mut config = AppConfig::default();
        config.observability.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.driver.endpoint, config.driver.endpoint);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [driver]
            endpoint = "http://browser:3000"

            [api]
            bind_address = "127.0.0.1:9000"
            "#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.driver.endpoint, "http://browser:3000");
        assert_eq!(config.api.bind_address, "127.0.0.1:9000");
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/definitely/not/here.toml")).is_err());
    }
}
