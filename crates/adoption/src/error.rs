use route_protocol::Slot;
use route_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Route for slot {slot} has {len} waypoints; at least {min} are required")]
    DegradedRoute { slot: Slot, len: usize, min: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
