//! 配置管理
//!
//! 配置加载顺序：
//! 1. 内置默认值（各配置段的 `Default` 实现）
//! 2. TOML 配置文件
//! 3. 环境变量覆盖（前缀 `CHECKER_`，层级分隔符 `__`，例如 `CHECKER_LOCKS__TTL_SECONDS=600`）
//!
//! 加载完成后逐段调用 `validate()`，任何一段不合法都会让启动失败。

pub mod models;

pub use models::*;
