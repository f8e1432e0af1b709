use std::collections::HashMap;
use std::rc::Rc;

use crate::event::{BasicEvent, EventId, EventRef, Gate, HouseEvent};
use crate::model::ModelError;

/// Boolean operator at a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
    Not,
    Xor,
    Nand,
    Nor,
    Iff,
    Atleast,
    Cardinality,
    Imply,
    Null,
}

impl Connective {
    pub fn min_args(self) -> usize {
        match self {
            Connective::Not => 1,
            Connective::Null => 1,
            Connective::Imply => 2,
            Connective::Iff => 2,
            _ => 1,
        }
    }
}

/// One formula argument: a reference to an event plus its polarity.
#[derive(Debug, Clone)]
pub struct Arg {
    pub event: EventRef,
    pub complement: bool,
}

impl Arg {
    pub fn pos(event: EventRef) -> Self {
        Arg {
            event,
            complement: false,
        }
    }
    pub fn neg(event: EventRef) -> Self {
        Arg {
            event,
            complement: true,
        }
    }
}

/// `connective` applied to an ordered multiset of [`Arg`]s. Never shared:
/// cloning a formula deep-clones its argument list (gates are cloned
/// recursively by the caller, see [`Formula::clone_substituting`]).
#[derive(Debug, Clone)]
pub struct Formula {
    pub connective: Connective,
    pub args: Vec<Arg>,
    pub min_number: Option<u32>,
    pub max_number: Option<u32>,
}

impl Formula {
    pub fn new(connective: Connective, args: Vec<Arg>) -> Result<Self, ModelError> {
        let f = Formula {
            connective,
            args,
            min_number: None,
            max_number: None,
        };
        f.validate()?;
        Ok(f)
    }

    pub fn at_least(min: u32, args: Vec<Arg>) -> Result<Self, ModelError> {
        let max = args.len() as u32;
        let f = Formula {
            connective: Connective::Atleast,
            args,
            min_number: Some(min),
            max_number: Some(max),
        };
        f.validate()?;
        Ok(f)
    }

    pub fn cardinality(min: u32, max: u32, args: Vec<Arg>) -> Result<Self, ModelError> {
        let f = Formula {
            connective: Connective::Cardinality,
            args,
            min_number: Some(min),
            max_number: Some(max),
        };
        f.validate()?;
        Ok(f)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.args.len() < self.connective.min_args() {
            return Err(ModelError::InvalidFormula(format!(
                "{:?} requires at least {} argument(s), got {}",
                self.connective,
                self.connective.min_args(),
                self.args.len()
            )));
        }
        if matches!(
            self.connective,
            Connective::Atleast | Connective::Cardinality
        ) {
            let min = self.min_number.unwrap_or(0);
            let max = self.max_number.unwrap_or(self.args.len() as u32);
            if !(min <= max && max <= self.args.len() as u32) {
                return Err(ModelError::InvalidFormula(format!(
                    "invalid min/max ({min}/{max}) for {} args",
                    self.args.len()
                )));
            }
        }
        Ok(())
    }

    /// Deep-clone this formula, substituting any referenced house event
    /// found in `overrides` with a private singleton holding the forced
    /// state, recursing into referenced gates (which are cloned too, with
    /// a fresh [`EventId`]) and sharing basic events.
    ///
    /// This is the mechanism the event-tree path collector (spec §4.6)
    /// uses to apply per-path `SetHouseEvent` overrides when it collects a
    /// formula for a sequence.
    pub fn clone_substituting(
        &self,
        overrides: &HashMap<EventId, bool>,
        gate_cache: &mut HashMap<EventId, Rc<Gate>>,
    ) -> Formula {
        let args = self
            .args
            .iter()
            .map(|arg| Arg {
                event: clone_event_ref(&arg.event, overrides, gate_cache),
                complement: arg.complement,
            })
            .collect();
        Formula {
            connective: self.connective,
            args,
            min_number: self.min_number,
            max_number: self.max_number,
        }
    }
}

fn clone_event_ref(
    event: &EventRef,
    overrides: &HashMap<EventId, bool>,
    gate_cache: &mut HashMap<EventId, Rc<Gate>>,
) -> EventRef {
    match event {
        EventRef::Basic(b) => EventRef::Basic(Rc::clone(b)),
        EventRef::House(h) => {
            if let Some(&forced) = overrides.get(&h.id) {
                EventRef::House(HouseEvent::new(format!("{}#forced", h.name), forced))
            } else {
                EventRef::House(Rc::clone(h))
            }
        }
        EventRef::Gate(g) => {
            if let Some(cached) = gate_cache.get(&g.id) {
                return EventRef::Gate(Rc::clone(cached));
            }
            let cloned_formula = g.formula().clone_substituting(overrides, gate_cache);
            let cloned = Gate::new(format!("{}#clone", g.name), cloned_formula);
            gate_cache.insert(g.id, Rc::clone(&cloned));
            EventRef::Gate(cloned)
        }
    }
}

/// Convenience constructor used throughout tests and the CCF expander.
pub fn basic_arg(event: &Rc<BasicEvent>, complement: bool) -> Arg {
    Arg {
        event: EventRef::Basic(Rc::clone(event)),
        complement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pra_expr::Constant;
    use std::rc::Rc;

    #[test]
    fn atleast_validates_bounds() {
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        let b = BasicEvent::new("b", Rc::new(Constant(0.1)));
        let ok = Formula::at_least(1, vec![basic_arg(&a, false), basic_arg(&b, false)]);
        assert!(ok.is_ok());
    }

    #[test]
    fn clone_substituting_forces_house_event() {
        let h = HouseEvent::new("h", false);
        let f = Formula::new(Connective::Not, vec![Arg::pos(EventRef::House(Rc::clone(&h)))]).unwrap();
        let mut overrides = HashMap::new();
        overrides.insert(h.id, true);
        let mut cache = HashMap::new();
        let cloned = f.clone_substituting(&overrides, &mut cache);
        match &cloned.args[0].event {
            EventRef::House(nh) => assert!(nh.state()),
            _ => panic!("expected house event"),
        }
        // original untouched
        assert!(!h.state());
    }
}
