pub mod api_observability;
pub mod app_config;
pub mod automation;
pub mod driver_store;
pub mod locks;

// Re-export main types for easier imports
pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use automation::AutomationConfig;
pub use driver_store::{DriverConfig, StoreConfig};
pub use locks::LockConfig;
