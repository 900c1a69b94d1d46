use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub ttl_seconds: u64,
    /// 过期锁清理间隔，0 表示只做惰性过期
    pub sweep_interval_seconds: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            sweep_interval_seconds: 60,
        }
    }
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ttl_seconds == 0 {
            return Err(anyhow::anyhow!("锁的有效期必须大于0"));
        }

        Ok(())
    }
}
