//! The canonical, indexed propositional DAG (PDAG): the internal Boolean
//! representation every downstream engine (BDD, ZBDD, Monte Carlo) walks.

mod index_map;
mod module;
mod pdag;

pub use index_map::IndexMap;
pub use pdag::{
    build, Literal, Pdag, PdagError, PdagGate, PdagOptions, PdagVariable, Vertex, FALSE_INDEX,
    TRUE_INDEX, VARIABLE_START_INDEX,
};

pub type Result<T, E = PdagError> = std::result::Result<T, E>;
