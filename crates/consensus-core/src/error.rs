use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("No reports found for security: {0}")]
    NotFound(String),

    #[error("Text encoding failed: {0}")]
    Encoding(String),

    #[error("Store failure: {0}")]
    Store(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt stored vector: {0}")]
    CorruptVector(String),

    #[error("Corrupt report row: {0}")]
    CorruptRow(String),
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
