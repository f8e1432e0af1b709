use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonteCarloError {
    #[error("target node index {0} is not a gate or variable in this PDAG")]
    UnknownTarget(u32),
}

pub type Result<T, E = MonteCarloError> = std::result::Result<T, E>;
