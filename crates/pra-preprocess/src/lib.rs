//! Graph rewrites that prepare a [`Pdag`] for the BDD, ZBDD and Monte
//! Carlo back ends: redundant-literal removal, associative-gate
//! coalescing and constant propagation.
//!
//! These are independent, composable passes over an already-built PDAG;
//! none of them change the boolean function the graph computes, only its
//! size and shape. They run in place and are safe to skip entirely (the
//! back ends are correct either way, just slower on an unrewritten graph).

use std::collections::{HashMap, HashSet};

use pra_model::Connective;
use pra_pdag::{Literal, Pdag, FALSE_INDEX, TRUE_INDEX};

/// Which rewrites to run, and in what combination.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub remove_redundant_literals: bool,
    pub coalesce_associative_gates: bool,
    pub propagate_constants: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            remove_redundant_literals: true,
            coalesce_associative_gates: true,
            propagate_constants: true,
        }
    }
}

/// How much each pass changed, for logging/diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub redundant_literals_removed: u32,
    pub gates_coalesced: u32,
    pub gates_constant_folded: u32,
}

/// Run the configured passes once, in a fixed order: duplicate/complement
/// literals first (so coalescing sees the smallest possible arg lists),
/// then gate flattening, then constant propagation (which benefits from
/// both of the above having already run).
pub fn run(pdag: &mut Pdag, options: &Options) -> Stats {
    let mut stats = Stats::default();
    if options.remove_redundant_literals {
        stats.redundant_literals_removed = remove_redundant_literals(pdag);
    }
    if options.coalesce_associative_gates {
        stats.gates_coalesced = coalesce_associative_gates(pdag);
    }
    if options.propagate_constants {
        stats.gates_constant_folded = propagate_constants(pdag);
    }
    tracing::debug!(
        redundant = stats.redundant_literals_removed,
        coalesced = stats.gates_coalesced,
        folded = stats.gates_constant_folded,
        "preprocess pass complete"
    );
    stats
}

/// Drop duplicate arguments from AND/OR gates, and collapse a gate to a
/// constant when it contains both `x` and `¬x` (an AND is then
/// unsatisfiable, an OR a tautology).
fn remove_redundant_literals(pdag: &mut Pdag) -> u32 {
    let mut count = 0;
    for idx in pdag.children_first_order() {
        let Some(g) = pdag.gate_mut(idx) else { continue };
        if !matches!(g.connective, Connective::And | Connective::Or) {
            continue;
        }
        let before = g.args.len();
        let mut seen: HashSet<Literal> = HashSet::new();
        g.args.retain(|&a| seen.insert(a));
        if g.args.len() != before {
            count += 1;
        }
        let contradiction = g.args.iter().any(|a| seen.contains(&-a));
        if contradiction {
            let constant = if g.connective == Connective::And {
                FALSE_INDEX as Literal
            } else {
                TRUE_INDEX as Literal
            };
            g.connective = Connective::Null;
            g.args = vec![constant];
            g.min_number = None;
            g.max_number = None;
            count += 1;
        }
    }
    count
}

/// Inline a child AND/OR gate into its parent when the connectives match
/// and the child has no other parent — flattening `AND(a, AND(b, c))`
/// into `AND(a, b, c)` without risking a blow-up on shared subgraphs.
fn coalesce_associative_gates(pdag: &mut Pdag) -> u32 {
    let parent_counts = pdag.parent_counts();
    let mut merged = 0u32;
    for idx in pdag.children_first_order() {
        let connective = match pdag.gate(idx) {
            Some(g) if matches!(g.connective, Connective::And | Connective::Or) => g.connective,
            _ => continue,
        };
        let args = pdag.gate(idx).unwrap().args.clone();
        let mut new_args = Vec::with_capacity(args.len());
        let mut changed = false;
        for a in args {
            let mut flattened = false;
            if a > 0 {
                let cidx = a as u32;
                if parent_counts.get(&cidx).copied().unwrap_or(0) == 1 {
                    if let Some(child) = pdag.gate(cidx) {
                        if child.connective == connective {
                            new_args.extend_from_slice(&child.args);
                            flattened = true;
                        }
                    }
                }
            }
            if flattened {
                changed = true;
                merged += 1;
            } else {
                new_args.push(a);
            }
        }
        if changed {
            if let Some(g) = pdag.gate_mut(idx) {
                g.args = new_args;
            }
        }
    }
    merged
}

/// Follow `lit` through zero or more single-argument `Null` gates to the
/// literal it ultimately stands for.
fn resolve_literal(pdag: &Pdag, lit: Literal) -> Literal {
    let mut current = lit;
    loop {
        let idx = current.unsigned_abs();
        if idx <= TRUE_INDEX {
            return current;
        }
        match pdag.gate(idx) {
            Some(g) if g.connective == Connective::Null && g.args.len() == 1 => {
                let inner = g.args[0];
                current = if current < 0 { -inner } else { inner };
            }
            _ => return current,
        }
    }
}

/// Fold `TRUE`/`FALSE` arguments out of AND/OR gates: an absorbing
/// constant collapses the whole gate, an identity constant is dropped.
fn propagate_constants(pdag: &mut Pdag) -> u32 {
    let mut count = 0;
    for idx in pdag.children_first_order() {
        let connective = match pdag.gate(idx) {
            Some(g) => g.connective,
            None => continue,
        };
        if !matches!(connective, Connective::And | Connective::Or) {
            continue;
        }
        let args: Vec<Literal> = pdag.gate(idx).unwrap().args.clone();
        let resolved: Vec<Literal> = args.iter().map(|&a| resolve_literal(pdag, a)).collect();
        let absorbing = if connective == Connective::And {
            FALSE_INDEX as Literal
        } else {
            TRUE_INDEX as Literal
        };
        let identity = if connective == Connective::And {
            TRUE_INDEX as Literal
        } else {
            FALSE_INDEX as Literal
        };

        if resolved.iter().any(|&r| r == absorbing) {
            if let Some(g) = pdag.gate_mut(idx) {
                g.connective = Connective::Null;
                g.args = vec![absorbing];
                g.min_number = None;
                g.max_number = None;
            }
            count += 1;
            continue;
        }

        let kept: Vec<Literal> = resolved.iter().copied().filter(|&r| r != identity).collect();
        if kept != args {
            if let Some(g) = pdag.gate_mut(idx) {
                if kept.is_empty() {
                    g.connective = Connective::Null;
                    g.args = vec![identity];
                } else if kept.len() == 1 {
                    g.connective = Connective::Null;
                    g.args = kept;
                } else {
                    g.args = kept;
                }
                g.min_number = None;
                g.max_number = None;
            }
            count += 1;
        }
    }

    let new_root = resolve_literal(pdag, pdag_root(pdag));
    pdag.set_root(new_root);
    count
}

fn pdag_root(pdag: &Pdag) -> Literal {
    pdag.root
}

#[cfg(test)]
mod tests {
    use super::*;
    use pra_expr::Constant;
    use pra_model::{basic_arg, Arg, BasicEvent, EventRef, Formula, Gate, Model};
    use pra_pdag::{build, PdagOptions};
    use std::rc::Rc;

    fn single_gate_model(connective: Connective, a_neg: bool, b_neg: bool) -> Model {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        let b = BasicEvent::new("b", Rc::new(Constant(0.2)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        model.add_basic_event(Rc::clone(&b)).unwrap();
        let top = Gate::new(
            "top",
            Formula::new(
                connective,
                vec![basic_arg(&a, a_neg), basic_arg(&b, b_neg)],
            )
            .unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        model
    }

    #[test]
    fn contradiction_collapses_and_gate_to_false() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        let top = Gate::new(
            "top",
            Formula::new(
                Connective::And,
                vec![
                    Arg::pos(EventRef::Basic(Rc::clone(&a))),
                    Arg::neg(EventRef::Basic(Rc::clone(&a))),
                ],
            )
            .unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        let mut pdag = build(&model, &PdagOptions::default()).unwrap();

        let stats = run(&mut pdag, &Options::default());
        assert!(stats.redundant_literals_removed >= 1);
        let root_idx = pdag.root.unsigned_abs();
        let g = pdag.gate(root_idx).unwrap();
        assert_eq!(g.connective, Connective::Null);
        assert_eq!(g.args, vec![FALSE_INDEX as Literal]);
    }

    #[test]
    fn nested_and_gates_with_single_parent_coalesce() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        let b = BasicEvent::new("b", Rc::new(Constant(0.2)));
        let c = BasicEvent::new("c", Rc::new(Constant(0.3)));
        for e in [&a, &b, &c] {
            model.add_basic_event(Rc::clone(e)).unwrap();
        }
        let inner = Gate::new(
            "inner",
            Formula::new(Connective::And, vec![basic_arg(&b, false), basic_arg(&c, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&inner)).unwrap();
        let top = Gate::new(
            "top",
            Formula::new(
                Connective::And,
                vec![
                    basic_arg(&a, false),
                    Arg::pos(EventRef::Gate(Rc::clone(&inner))),
                ],
            )
            .unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        let mut pdag = build(&model, &PdagOptions::default()).unwrap();
        assert_eq!(pdag.gate_count(), 2);

        let stats = run(&mut pdag, &Options::default());
        assert_eq!(stats.gates_coalesced, 1);
        let root_idx = pdag.root.unsigned_abs();
        assert_eq!(pdag.gate(root_idx).unwrap().args.len(), 3);
    }

    #[test]
    fn constant_is_absorbed_by_or_gate() {
        let model = single_gate_model(Connective::Or, false, false);
        let mut pdag = build(&model, &PdagOptions::default()).unwrap();
        // Force one argument to a literal TRUE the way a house event would.
        let root_idx = pdag.root.unsigned_abs();
        {
            let g = pdag.gate_mut(root_idx).unwrap();
            g.args[0] = TRUE_INDEX as Literal;
        }
        let stats = run(&mut pdag, &Options::default());
        assert!(stats.gates_constant_folded >= 1);
        let root_idx = pdag.root.unsigned_abs();
        let g = pdag.gate(root_idx).unwrap();
        assert_eq!(g.connective, Connective::Null);
        assert_eq!(g.args, vec![TRUE_INDEX as Literal]);
    }
}
