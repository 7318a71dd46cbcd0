//! Inventory load test: every iteration adjusts the stock of a random store and then reads the
//! global inventory for the same SKU.
pub mod cli;
pub mod config;
pub mod driver;

pub use config::Target;
pub use driver::Driver;
