use thiserror::Error;

use pra_eventtree::EventTreeError;
use pra_model::ModelError;
use pra_montecarlo::MonteCarloError;
use pra_pdag::PdagError;
use pra_quantify::QuantifyError;

/// The engine's top-level error, composing every sub-crate's error type
/// (spec §7's three abort-synchronously/surface-during-build categories
/// collapse onto one enum at this boundary; numeric warnings never reach
/// here, they are accumulated on the report instead).
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed settings or a mutually-exclusive option combination,
    /// caught before any work starts.
    #[error("invalid settings: {0}")]
    Input(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Pdag(#[from] PdagError),

    #[error(transparent)]
    Bdd(#[from] pra_bdd::BddError),

    #[error(transparent)]
    Quantify(#[from] QuantifyError),

    #[error(transparent)]
    MonteCarlo(#[from] MonteCarloError),

    #[error(transparent)]
    EventTree(#[from] EventTreeError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
