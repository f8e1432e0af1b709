//! Event-tree grammar types (spec §4.6): functional events, forks,
//! sequences and the per-branch instruction list a path walk executes.

use std::rc::Rc;

use pra_expr::ExprRef;
use pra_model::{EventId, Formula, HouseEvent};

/// A named decision point a [`Fork`] branches on (e.g. "Reactor Trip").
#[derive(Debug)]
pub struct FunctionalEvent {
    pub name: String,
}

impl FunctionalEvent {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(FunctionalEvent { name: name.into() })
    }
}

/// Terminal outcome of a walk: the collector synthesises one [`Gate`] per
/// sequence, combining every path that reaches it (spec §4.6).
#[derive(Debug)]
pub struct Sequence {
    pub id: EventId,
    pub name: String,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Sequence {
            id: EventId::fresh(),
            name: name.into(),
        })
    }
}

/// One side-effecting step executed while walking a [`Branch`].
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Force `house_event` to `state` for every formula collected later on
    /// this path (and this path only).
    SetHouseEvent(Rc<HouseEvent>, bool),
    /// Deep-clone `formula`, substituting any house events forced so far on
    /// this path, and record it as one of this path's Boolean contributions.
    CollectFormula(Formula),
    /// Record `expression` as one of this path's probability contributions.
    CollectExpression(ExprRef),
    /// Continue the walk into another tree, carrying this path's state
    /// forward (spec §4.6's `Link(other_tree)`).
    Link(Rc<EventTree>),
}

/// What a [`Branch`] leads to: either another decision (`Fork`) or a
/// terminal ([`Sequence`]).
#[derive(Debug, Clone)]
pub enum BranchTarget {
    Fork(Rc<Fork>),
    Sequence(Rc<Sequence>),
}

/// One edge of the tree: a list of instructions executed on entry, then a
/// target.
#[derive(Debug, Clone)]
pub struct Branch {
    pub instructions: Vec<Instruction>,
    pub target: BranchTarget,
}

/// One path out of a fork, labelled by the state it represents (e.g.
/// "Success"/"Failure").
#[derive(Debug, Clone)]
pub struct Path {
    pub state: String,
    pub branch: Branch,
}

/// A decision point: exactly one of [`Path`] is taken per walk.
#[derive(Debug)]
pub struct Fork {
    pub functional_event: Rc<FunctionalEvent>,
    pub paths: Vec<Path>,
}

/// A complete event tree: a name and the branch the walk starts from.
#[derive(Debug)]
pub struct EventTree {
    pub name: String,
    pub initial_state: Branch,
}

/// The event that triggers a walk of its tree.
#[derive(Debug)]
pub struct InitiatingEvent {
    pub name: String,
    pub event_tree: Rc<EventTree>,
}
