pub mod app;
pub mod session;

use std::env;

pub use app::{AppConfig, GoogleConfig};
pub use session::{validate_production_config, SessionConfig, SessionLayer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("{0}")]
    Insecure(String),
}

pub(crate) fn current_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}
