//! 检查调度核心
//!
//! - [`AutomationService`]：共享的检查队列和有界工作池
//! - [`LockManager`]：带TTL的记录锁

pub mod automation_service;
pub mod lock_manager;

pub use automation_service::AutomationService;
pub use lock_manager::LockManager;
