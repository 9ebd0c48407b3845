pub mod cli;
pub mod config;
pub mod keys;
pub mod store;

pub use config::NodeConfig;
pub use store::{Snapshot, Store};
