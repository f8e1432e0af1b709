//! The event model: basic events, house events, gates, formulas, CCF
//! groups and parameters. Identity and metadata only — no Boolean-algebra
//! normalisation happens here, that is [`pra_pdag`]'s job.

mod ccf;
mod event;
mod formula;
mod model;

pub use ccf::{CcfFactor, CcfGroup, CcfModel};
pub use event::{BasicEvent, EventId, EventRef, Gate, HouseEvent};
pub use formula::{basic_arg, Arg, Connective, Formula};
pub use model::{Model, ModelError};

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
