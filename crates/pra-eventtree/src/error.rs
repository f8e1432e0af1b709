use thiserror::Error;

use pra_model::ModelError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventTreeError {
    #[error("functional event {0} is already open on this path (forks cannot nest on the same functional event)")]
    DuplicateFunctionalEvent(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T, E = EventTreeError> = std::result::Result<T, E>;
