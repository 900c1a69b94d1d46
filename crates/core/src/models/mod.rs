//! # 数据模型
//!
//! 定义检查自动化服务的核心数据结构：检查任务、检查结果、运行状态、记录锁以及事件总线上的事件。
//!
//! ## 核心模型
//!
//! ### CheckTask - 检查任务
//! 一次检查请求中某条记录对应的任务，入队后不可变，由Worker消费且只消费一次。
//!
//! ### CheckResult - 检查结果
//! 由状态分类器产生，三种状态之一：`LIVE` / `MISSING` / `ERROR`。
//!
//! ### RunStats - 运行状态快照
//! 进程内唯一运行状态的只读快照，满足 `total_completed <= total_enqueued`。
//!
//! ### Lock - 记录锁
//! 每条记录最多一个有效锁，带过期时间。
//!
//! ## 序列化
//!
//! 所有对外模型使用 camelCase JSON 字段，时间字段统一为 `DateTime<Utc>`。

pub mod check;
pub mod event;
pub mod lock;
pub mod review;
pub mod run;

pub use check::*;
pub use event::*;
pub use lock::*;
pub use review::*;
pub use run::*;
