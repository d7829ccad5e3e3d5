use thiserror::Error;

/// Error type for invalid inputs and configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    Config(String),
    #[error("length mismatch for {name}: expected {expected}, got {actual}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("series of {0} months is not a whole number of years")]
    PartialYear(usize),
    #[error("glacier {0} has no on-glacier bins")]
    EmptyGlacier(String),
}

/// Convenience type for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;
