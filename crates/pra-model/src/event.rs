use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use pra_expr::ExprRef;

use crate::ccf::CcfGroup;
use crate::formula::Formula;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity shared by basic events, house events and gates: the
/// formula's argument list is keyed on this id regardless of which kind of
/// node it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u64);

impl EventId {
    pub fn fresh() -> Self {
        EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A basic (leaf) failure event: an id, a name, an optional CCF back
/// reference, and the expression giving its probability at the current
/// mission time.
#[derive(Debug)]
pub struct BasicEvent {
    pub id: EventId,
    pub name: String,
    pub ccf_group: Option<Rc<CcfGroup>>,
    pub expression: ExprRef,
}

impl BasicEvent {
    pub fn new(name: impl Into<String>, expression: ExprRef) -> Rc<Self> {
        Rc::new(BasicEvent {
            id: EventId::fresh(),
            name: name.into(),
            ccf_group: None,
            expression,
        })
    }

    pub fn with_ccf_group(
        name: impl Into<String>,
        expression: ExprRef,
        group: Rc<CcfGroup>,
    ) -> Rc<Self> {
        Rc::new(BasicEvent {
            id: EventId::fresh(),
            name: name.into(),
            ccf_group: Some(group),
            expression,
        })
    }

    /// Probability at the current mission time, clamped to `[0, 1]`.
    ///
    /// Invariant (spec §3): `0 <= p() <= 1` after clamping.
    pub fn p(&self) -> f64 {
        self.expression.value().clamp(0.0, 1.0)
    }
}

/// A Boolean house (switch) event: forced `true`/`false`.
#[derive(Debug)]
pub struct HouseEvent {
    pub id: EventId,
    pub name: String,
    state: Cell<bool>,
}

impl HouseEvent {
    pub fn new(name: impl Into<String>, state: bool) -> Rc<Self> {
        Rc::new(HouseEvent {
            id: EventId::fresh(),
            name: name.into(),
            state: Cell::new(state),
        })
    }

    pub fn state(&self) -> bool {
        self.state.get()
    }

    pub fn set_state(&self, state: bool) {
        self.state.set(state);
    }

    /// The canonical singleton `TRUE` house event.
    pub fn singleton_true() -> Rc<Self> {
        HouseEvent::new("__true__", true)
    }

    /// The canonical singleton `FALSE` house event.
    pub fn singleton_false() -> Rc<Self> {
        HouseEvent::new("__false__", false)
    }
}

/// A reference to whatever a formula argument or a gate points at.
#[derive(Debug, Clone)]
pub enum EventRef {
    Basic(Rc<BasicEvent>),
    House(Rc<HouseEvent>),
    Gate(Rc<Gate>),
}

impl EventRef {
    pub fn id(&self) -> EventId {
        match self {
            EventRef::Basic(b) => b.id,
            EventRef::House(h) => h.id,
            EventRef::Gate(g) => g.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EventRef::Basic(b) => &b.name,
            EventRef::House(h) => &h.name,
            EventRef::Gate(g) => &g.name,
        }
    }
}

/// An internal node: an id, a single formula, and the two mark bits used by
/// graph walks (visited-this-pass, generic scratch mark).
#[derive(Debug)]
pub struct Gate {
    pub id: EventId,
    pub name: String,
    formula: std::cell::RefCell<Formula>,
    visit: Cell<bool>,
    mark: Cell<bool>,
}

impl Gate {
    pub fn new(name: impl Into<String>, formula: Formula) -> Rc<Self> {
        Rc::new(Gate {
            id: EventId::fresh(),
            name: name.into(),
            formula: std::cell::RefCell::new(formula),
            visit: Cell::new(false),
            mark: Cell::new(false),
        })
    }

    pub fn formula(&self) -> std::cell::Ref<'_, Formula> {
        self.formula.borrow()
    }

    pub fn set_formula(&self, formula: Formula) {
        *self.formula.borrow_mut() = formula;
    }

    pub fn visited(&self) -> bool {
        self.visit.get()
    }
    pub fn set_visited(&self, v: bool) {
        self.visit.set(v)
    }
    pub fn mark(&self) -> bool {
        self.mark.get()
    }
    pub fn set_mark(&self, v: bool) {
        self.mark.set(v)
    }
}
