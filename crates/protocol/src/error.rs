use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidSlot {
    #[error("slot id must be a positive integer, got {0}")]
    Zero(u32),

    #[error("slot id {0} does not fit in a byte")]
    OutOfRange(u32),

    #[error("slot id is not a number: {0}")]
    NotANumber(String),
}
