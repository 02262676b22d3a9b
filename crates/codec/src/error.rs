use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Alias index is not valid JSON: {0}")]
    InvalidAliasIndex(#[from] serde_json::Error),

    #[error("Alias '{alias}' on map '{map}' points at invalid waypoint {id}")]
    InvalidAliasTarget { map: String, alias: String, id: u32 },
}
