//! The path walk and per-sequence gate synthesis (spec §4.6).

use std::collections::HashMap;
use std::rc::Rc;

use pra_expr::{ExprRef, Product, Sum};
use rustc_hash::FxHashMap;

use pra_model::{basic_arg, Arg, BasicEvent, Connective, EventId, EventRef, Formula, Gate, HouseEvent};

use crate::error::{EventTreeError, Result};
use crate::model::{Branch, BranchTarget, InitiatingEvent, Instruction, Sequence};

/// Everything one path through the tree has accumulated by the time it
/// reaches a sequence: forced house events, cloned formulas, and recorded
/// probability expressions.
#[derive(Debug, Clone, Default)]
struct PathCollector {
    overrides: HashMap<EventId, bool>,
    gate_cache: HashMap<EventId, Rc<Gate>>,
    formulas: Vec<Formula>,
    expressions: Vec<ExprRef>,
}

/// The final, analysis-ready artefact for one sequence: an OR-of-per-path
/// gate (or, for expression-only trees, a `NULL` gate over a synthesised
/// frequency event), ready to feed PDAG construction (spec §4.1).
#[derive(Debug)]
pub struct CollectedSequence {
    pub sequence: Rc<Sequence>,
    pub gate: Rc<Gate>,
    pub is_expression_only: bool,
}

/// Walk `initiating_event`'s tree, synthesising one [`CollectedSequence`]
/// per distinct [`Sequence`] reached.
pub fn collect_sequences(initiating_event: &InitiatingEvent) -> Result<Vec<CollectedSequence>> {
    let mut sequences: FxHashMap<EventId, (Rc<Sequence>, Vec<PathCollector>)> = FxHashMap::default();
    let mut functional_events: FxHashMap<String, String> = FxHashMap::default();

    walk_branch(
        &initiating_event.event_tree.initial_state,
        PathCollector::default(),
        &mut functional_events,
        &mut sequences,
    )?;

    let mut collected = Vec::with_capacity(sequences.len());
    for (_, (sequence, paths)) in sequences {
        let path_count = paths.len();
        collected.push(synthesize(&sequence, paths)?);
        tracing::debug!(sequence = %sequence.name, paths = path_count, "sequence synthesised");
    }
    Ok(collected)
}

/// Recursively walk one branch, threading the in-progress path state and
/// the open-fork `functional_events` context (spec §4.6: `Link` "continues
/// the walk into another event tree with the current functional-event
/// context").
///
/// A `Link` instruction hands the rest of the walk to the linked tree: the
/// branch's own target (if any) is not also visited, since the linked tree
/// stands in for "the rest of this path" rather than an additional path.
fn walk_branch(
    branch: &Branch,
    mut path: PathCollector,
    functional_events: &mut FxHashMap<String, String>,
    sequences: &mut FxHashMap<EventId, (Rc<Sequence>, Vec<PathCollector>)>,
) -> Result<()> {
    for instruction in &branch.instructions {
        match instruction {
            Instruction::SetHouseEvent(house_event, state) => {
                path.overrides.insert(house_event.id, *state);
            }
            Instruction::CollectFormula(formula) => {
                let cloned = formula.clone_substituting(&path.overrides, &mut path.gate_cache);
                path.formulas.push(cloned);
            }
            Instruction::CollectExpression(expr) => {
                path.expressions.push(Rc::clone(expr));
            }
            Instruction::Link(tree) => {
                return walk_branch(&tree.initial_state, path, functional_events, sequences);
            }
        }
    }

    match &branch.target {
        BranchTarget::Sequence(sequence) => {
            sequences
                .entry(sequence.id)
                .or_insert_with(|| (Rc::clone(sequence), Vec::new()))
                .1
                .push(path);
            Ok(())
        }
        BranchTarget::Fork(fork) => {
            let name = &fork.functional_event.name;
            if functional_events.contains_key(name) {
                return Err(EventTreeError::DuplicateFunctionalEvent(name.clone()));
            }
            for fork_path in &fork.paths {
                functional_events.insert(name.clone(), fork_path.state.clone());
                walk_branch(&fork_path.branch, path.clone(), functional_events, sequences)?;
            }
            functional_events.remove(name);
            Ok(())
        }
    }
}

/// One gate id suffix per helper gate synthesised for `sequence`, so two
/// sequences never collide on a helper gate's name.
fn helper_gate(sequence: &Sequence, formula_id: usize, formula: Formula) -> Rc<Gate> {
    Gate::new(format!("___{}__formula_{}__", sequence.name, formula_id), formula)
}

fn synthesize(sequence: &Rc<Sequence>, paths: Vec<PathCollector>) -> Result<CollectedSequence> {
    let mut formula_id = 0usize;
    let mut gate_formulas: Vec<Formula> = Vec::new();
    let mut arg_expressions: Vec<ExprRef> = Vec::new();

    for mut path in paths {
        match path.formulas.len() {
            0 => {}
            1 => gate_formulas.push(path.formulas.pop().unwrap()),
            _ => {
                let args: Vec<Arg> = path
                    .formulas
                    .drain(..)
                    .map(|f| {
                        let gate = helper_gate(sequence, formula_id, f);
                        formula_id += 1;
                        Arg::pos(EventRef::Gate(gate))
                    })
                    .collect();
                gate_formulas.push(Formula::new(Connective::And, args)?);
            }
        }

        match path.expressions.len() {
            0 => {}
            1 => arg_expressions.push(path.expressions.pop().unwrap()),
            _ => arg_expressions.push(Rc::new(Product(std::mem::take(&mut path.expressions)))),
        }
    }

    let (final_formula, is_expression_only) = if !gate_formulas.is_empty() {
        let formula = if gate_formulas.len() == 1 {
            gate_formulas.pop().unwrap()
        } else {
            let args: Vec<Arg> = gate_formulas
                .into_iter()
                .map(|f| {
                    let gate = helper_gate(sequence, formula_id, f);
                    formula_id += 1;
                    Arg::pos(EventRef::Gate(gate))
                })
                .collect();
            Formula::new(Connective::Or, args)?
        };
        (formula, false)
    } else if !arg_expressions.is_empty() {
        let expr: ExprRef = if arg_expressions.len() == 1 {
            arg_expressions.pop().unwrap()
        } else {
            Rc::new(Sum(arg_expressions))
        };
        let event = BasicEvent::new(format!("{}__frequency", sequence.name), expr);
        (Formula::new(Connective::Null, vec![basic_arg(&event, false)])?, true)
    } else {
        let always_true = HouseEvent::singleton_true();
        (
            Formula::new(Connective::Null, vec![Arg::pos(EventRef::House(always_true))])?,
            false,
        )
    };

    let gate = Gate::new(format!("__{}", sequence.name), final_formula);
    Ok(CollectedSequence {
        sequence: Rc::clone(sequence),
        gate,
        is_expression_only,
    })
}
