pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use self::config::{
    ApiConfig, AppConfig, AutomationConfig, DriverConfig, LockConfig, ObservabilityConfig,
    StoreConfig,
};
pub use errors::*;
pub use models::*;
pub use traits::*;
