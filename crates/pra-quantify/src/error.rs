use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantifyError {
    #[error("invalid filter options: {0}")]
    InvalidOptions(String),
}

pub type Result<T, E = QuantifyError> = std::result::Result<T, E>;
