//! # Checker Testing Utils
//!
//! 工作区共享的测试替身与辅助工具，作为 dev-dependency 使用：
//!
//! ```toml
//! [dev-dependencies]
//! checker-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! - [`MockAutomationDriver`]：可编排结果、延迟和闸门的浏览器驱动，记录最大并发
//! - [`MockRecordStore`]：可注入持久化失败的记录存储
//! - [`EventRecorder`]：订阅全部主题并按顺序记录事件
//! - [`TestEnv`]：异步条件等待

pub mod helpers;
pub mod mocks;

pub use helpers::*;
pub use mocks::*;
