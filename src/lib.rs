pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;

pub use config::SnaggerConfig;
pub use error::SnaggerError;
