use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BddError {
    #[error("structural invariant violated: {0}")]
    Malformed(String),
}

pub type Result<T, E = BddError> = std::result::Result<T, E>;
