pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod watcher;

pub mod kafka;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::Gateway;
