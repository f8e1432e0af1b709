//! Event-tree path collection (spec §4.6): walks a fork/sequence structure,
//! applying per-path house-event overrides and collecting formulas and
//! expressions, and synthesises one analysis-ready [`Gate`] per sequence.

mod collect;
mod error;
mod model;

pub use collect::{collect_sequences, CollectedSequence};
pub use error::{EventTreeError, Result};
pub use model::{
    Branch, BranchTarget, EventTree, Fork, FunctionalEvent, InitiatingEvent, Instruction, Path,
    Sequence,
};

pub use pra_model::Gate;
