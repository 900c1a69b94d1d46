pub mod event_bus;
pub mod memory_store;
pub mod observability;

pub use event_bus::{EventBus, EventHandler, Subscription, SubscriptionId};
pub use memory_store::{InMemoryRecordStore, SeedRecord};
pub use observability::{init_metrics, MetricsCollector};
