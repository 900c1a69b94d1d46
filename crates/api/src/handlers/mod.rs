pub mod checks;
pub mod health;
pub mod locks;
pub mod records;
