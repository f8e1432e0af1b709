use std::collections::HashMap;
use std::rc::Rc;

use pra_expr::MissionTime;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ccf::CcfGroup;
use crate::event::{BasicEvent, EventId, EventRef, Gate, HouseEvent};
use crate::formula::{Arg, Connective, Formula};

/// Errors surfaced during model construction (spec §7 "Model errors").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("dangling reference: {0}")]
    DanglingReference(String),

    #[error("CCF group {group} order {order} is invalid for {size} member(s)")]
    CcfSizeMismatch {
        group: String,
        order: u32,
        size: usize,
    },

    #[error("unknown gate type: {0}")]
    UnknownGateType(String),

    #[error("invalid formula: {0}")]
    InvalidFormula(String),
}

/// The complete event model: every basic event, house event, gate and CCF
/// group the analysis will reference, plus the distinguished mission-time
/// parameter. Immutable after analysis begins, except for `mission_time`.
pub struct Model {
    pub name: String,
    basic_events: FxHashMap<EventId, Rc<BasicEvent>>,
    house_events: FxHashMap<EventId, Rc<HouseEvent>>,
    gates: FxHashMap<EventId, Rc<Gate>>,
    ccf_groups: Vec<Rc<CcfGroup>>,
    pub mission_time: MissionTime,
    pub top_gate: Option<Rc<Gate>>,
    /// Multiplies every computed top-event probability; defaults to 1.
    pub initiating_event_frequency: f64,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Model {
            name: name.into(),
            basic_events: FxHashMap::default(),
            house_events: FxHashMap::default(),
            gates: FxHashMap::default(),
            ccf_groups: Vec::new(),
            mission_time: MissionTime::new(0.0),
            top_gate: None,
            initiating_event_frequency: 1.0,
        }
    }

    pub fn add_basic_event(&mut self, event: Rc<BasicEvent>) -> Result<(), ModelError> {
        if self.basic_events.contains_key(&event.id) {
            return Err(ModelError::DuplicateId(event.name.clone()));
        }
        self.basic_events.insert(event.id, event);
        Ok(())
    }

    pub fn add_house_event(&mut self, event: Rc<HouseEvent>) -> Result<(), ModelError> {
        if self.house_events.contains_key(&event.id) {
            return Err(ModelError::DuplicateId(event.name.clone()));
        }
        self.house_events.insert(event.id, event);
        Ok(())
    }

    pub fn add_gate(&mut self, gate: Rc<Gate>) -> Result<(), ModelError> {
        if self.gates.contains_key(&gate.id) {
            return Err(ModelError::DuplicateId(gate.name.clone()));
        }
        self.gates.insert(gate.id, gate);
        Ok(())
    }

    pub fn add_ccf_group(&mut self, group: Rc<CcfGroup>) {
        self.ccf_groups.push(group);
    }

    pub fn set_top_gate(&mut self, gate: Rc<Gate>) -> Result<(), ModelError> {
        if !self.gates.contains_key(&gate.id) {
            return Err(ModelError::DanglingReference(format!(
                "top gate {} was not registered via add_gate",
                gate.name
            )));
        }
        self.top_gate = Some(gate);
        Ok(())
    }

    pub fn basic_events(&self) -> impl Iterator<Item = &Rc<BasicEvent>> {
        self.basic_events.values()
    }

    pub fn gates(&self) -> impl Iterator<Item = &Rc<Gate>> {
        self.gates.values()
    }

    pub fn house_events(&self) -> impl Iterator<Item = &Rc<HouseEvent>> {
        self.house_events.values()
    }

    pub fn ccf_groups(&self) -> &[Rc<CcfGroup>] {
        &self.ccf_groups
    }

    pub fn basic_event(&self, id: EventId) -> Option<&Rc<BasicEvent>> {
        self.basic_events.get(&id)
    }

    pub fn gate(&self, id: EventId) -> Option<&Rc<Gate>> {
        self.gates.get(&id)
    }

    /// Expand every registered CCF group's synthetic combination gates,
    /// register them, and splice a per-member OR-of-combos substitute gate
    /// into every existing gate that referenced that member directly
    /// (SPEC_FULL §4 "CCF application point").
    pub fn expand_ccf_groups(&mut self) -> Result<(), ModelError> {
        let original_gate_ids: Vec<EventId> = self.gates.keys().copied().collect();

        let groups = self.ccf_groups.clone();
        for group in groups {
            let expanded = group.expand()?;
            tracing::debug!(group = %group.name, gates = expanded.len(), "expanded CCF group");

            let mut member_combo_gates: Vec<Vec<Rc<Gate>>> = vec![Vec::new(); group.members().len()];
            for (combo, gate) in &expanded {
                self.add_gate(Rc::clone(gate))?;
                for &m in combo {
                    member_combo_gates[m].push(Rc::clone(gate));
                }
            }

            let mut substitutes: HashMap<EventId, Rc<Gate>> = HashMap::new();
            for (member, combo_gates) in group.members().iter().zip(member_combo_gates.iter()) {
                if combo_gates.is_empty() {
                    continue;
                }
                let args = combo_gates
                    .iter()
                    .map(|g| Arg::pos(EventRef::Gate(Rc::clone(g))))
                    .collect();
                let substitute = Gate::new(
                    format!("{}#ccf-member-{}", group.name, member.name),
                    Formula::new(Connective::Or, args)?,
                );
                self.add_gate(Rc::clone(&substitute))?;
                substitutes.insert(member.id, substitute);
            }

            for id in &original_gate_ids {
                if let Some(gate) = self.gates.get(id) {
                    substitute_member_refs(gate, &substitutes);
                }
            }
        }
        Ok(())
    }

    /// Validate that every gate argument referencing another gate or basic
    /// event is actually registered in this model, and that the model has
    /// no dangling top gate.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(top) = &self.top_gate {
            let mut seen: HashMap<EventId, ()> = HashMap::new();
            self.validate_gate(top, &mut seen)?;
        }
        Ok(())
    }

    fn validate_gate(
        &self,
        gate: &Rc<Gate>,
        seen: &mut HashMap<EventId, ()>,
    ) -> Result<(), ModelError> {
        if seen.contains_key(&gate.id) {
            return Ok(());
        }
        seen.insert(gate.id, ());
        for arg in gate.formula().args.iter() {
            if let crate::event::EventRef::Gate(g) = &arg.event {
                if !self.gates.contains_key(&g.id) {
                    return Err(ModelError::DanglingReference(format!(
                        "gate {} references unregistered gate {}",
                        gate.name, g.name
                    )));
                }
                self.validate_gate(g, seen)?;
            }
        }
        Ok(())
    }
}

/// Rewrite `gate`'s own argument list in place, replacing any direct
/// reference to a CCF member's basic event with its substitute gate
/// (preserving the argument's polarity). Leaves everything else alone.
fn substitute_member_refs(gate: &Rc<Gate>, substitutes: &HashMap<EventId, Rc<Gate>>) {
    let mut formula = gate.formula().clone();
    let mut changed = false;
    for arg in formula.args.iter_mut() {
        if let EventRef::Basic(b) = &arg.event {
            if let Some(substitute) = substitutes.get(&b.id) {
                arg.event = EventRef::Gate(Rc::clone(substitute));
                changed = true;
            }
        }
    }
    if changed {
        gate.set_formula(formula);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{basic_arg, Connective, Formula};
    use pra_expr::Constant;
    use proptest::prelude::*;

    #[test]
    fn rejects_duplicate_basic_event() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        assert!(model.add_basic_event(a).is_err());
    }

    #[test]
    fn validate_detects_dangling_gate_reference() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        let inner = Gate::new(
            "inner",
            Formula::new(Connective::Null, vec![basic_arg(&a, false)]).unwrap(),
        );
        // `inner` deliberately not registered.
        let top = Gate::new(
            "top",
            Formula::new(
                Connective::And,
                vec![crate::formula::Arg::pos(crate::event::EventRef::Gate(Rc::clone(
                    &inner,
                )))],
            )
            .unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        assert!(model.validate().is_err());
    }

    #[test]
    fn expand_ccf_groups_rewires_the_top_gate_off_the_raw_members() {
        use crate::ccf::{CcfGroup, CcfModel};

        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.01)));
        let b = BasicEvent::new("b", Rc::new(Constant(0.01)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        model.add_basic_event(Rc::clone(&b)).unwrap();

        let top = Gate::new(
            "top",
            Formula::new(Connective::Or, vec![basic_arg(&a, false), basic_arg(&b, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(Rc::clone(&top)).unwrap();

        let mut group = CcfGroup::new("g", CcfModel::BetaFactor);
        group.add_member(Rc::clone(&a)).unwrap();
        group.add_member(Rc::clone(&b)).unwrap();
        group.add_factor(2, Rc::new(Constant(0.05))).unwrap();
        model.add_ccf_group(Rc::new(group));

        model.expand_ccf_groups().unwrap();

        for arg in top.formula().args.iter() {
            match &arg.event {
                crate::event::EventRef::Basic(_) => {
                    panic!("top gate still references a raw CCF member directly")
                }
                crate::event::EventRef::Gate(g) => {
                    assert!(g.name.contains("#ccf-member-"));
                }
                crate::event::EventRef::House(_) => panic!("unexpected house event"),
            }
        }
        assert!(model.validate().is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Expanding a CCF group always rewires every gate that referenced
        /// a covered member directly, whatever the member count or set of
        /// factor orders (spec §4 "CCF application point").
        #[test]
        fn expand_ccf_groups_always_rewires_covered_members(
            member_count in 2usize..=4,
            raw_orders in prop::collection::hash_set(1u32..=4, 1..=3),
        ) {
            use crate::ccf::{CcfGroup, CcfModel};

            let orders: Vec<u32> = raw_orders
                .into_iter()
                .filter(|&o| o as usize <= member_count)
                .collect();
            prop_assume!(!orders.is_empty());

            let mut model = Model::new("m");
            let members: Vec<_> = (0..member_count)
                .map(|i| BasicEvent::new(format!("e{i}"), Rc::new(Constant(0.01))))
                .collect();
            for m in &members {
                model.add_basic_event(Rc::clone(m)).unwrap();
            }
            let args = members.iter().map(|m| basic_arg(m, false)).collect::<Vec<_>>();
            let top = Gate::new("top", Formula::new(Connective::Or, args).unwrap());
            model.add_gate(Rc::clone(&top)).unwrap();
            model.set_top_gate(Rc::clone(&top)).unwrap();

            let mut group = CcfGroup::new("g", CcfModel::BetaFactor);
            for m in &members {
                group.add_member(Rc::clone(m)).unwrap();
            }
            for &order in &orders {
                group.add_factor(order, Rc::new(Constant(0.05))).unwrap();
            }
            model.add_ccf_group(Rc::new(group));

            model.expand_ccf_groups().unwrap();

            for arg in top.formula().args.iter() {
                prop_assert!(!matches!(arg.event, crate::event::EventRef::Basic(_)));
            }
            prop_assert!(model.validate().is_ok());
        }
    }
}
