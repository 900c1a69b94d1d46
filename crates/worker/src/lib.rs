pub mod classifier;
pub mod drivers;

pub use classifier::{ClassifierSettings, StatusClassifier};
pub use drivers::HttpAutomationDriver;
