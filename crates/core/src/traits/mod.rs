pub mod automation_driver;
pub mod record_store;

pub use automation_driver::*;
pub use record_store::*;
