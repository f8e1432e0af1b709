use std::collections::{HashMap, HashSet};

use crate::pdag::{topological_order, vertex_mut, Pdag, Vertex, TRUE_INDEX};

/// Discover modules: a gate is a module iff the set of vertices reachable
/// below it is disjoint from the set reachable outside it, i.e. every
/// vertex in its subtree (other than the gate itself) has all of its
/// parents inside that same subtree (spec §4.1 step 5).
///
/// This computes, bottom-up, the full subtree vertex-index set of every
/// gate and a global parent map, then checks the module condition
/// directly. It is a reference-quality implementation (quadratic in the
/// worst case for deeply shared graphs), not the interval-labelling
/// optimisation `scram` uses.
pub fn discover_modules(pdag: &mut Pdag) {
    let indices: Vec<u32> = pdag
        .vertices()
        .map(|(idx, _)| idx)
        .collect();

    let mut parents: HashMap<u32, HashSet<u32>> = HashMap::new();
    for &idx in &indices {
        if let Some(v) = pdag.vertex(idx) {
            for &child in v.children() {
                let cidx = child.unsigned_abs();
                if cidx > TRUE_INDEX {
                    parents.entry(cidx).or_default().insert(idx);
                }
            }
        }
    }

    // Bottom-up: children's subtree sets must be known before a parent's,
    // which is the reverse of `topological_order` (parents-before-children).
    let children_first: Vec<u32> = topological_order(pdag).into_iter().rev().collect();
    let mut subtree: HashMap<u32, HashSet<u32>> = HashMap::new();
    for &idx in &children_first {
        let mut set = HashSet::new();
        set.insert(idx);
        if let Some(v) = pdag.vertex(idx) {
            for &child in v.children() {
                let cidx = child.unsigned_abs();
                if cidx > TRUE_INDEX {
                    if let Some(child_set) = subtree.get(&cidx) {
                        set.extend(child_set.iter().copied());
                    }
                }
            }
        }
        subtree.insert(idx, set);
    }

    let mut module_flags: HashMap<u32, bool> = HashMap::new();
    for &idx in &indices {
        let is_gate = matches!(pdag.vertex(idx), Some(Vertex::Gate(_)));
        if !is_gate {
            continue;
        }
        let members = &subtree[&idx];
        let is_module = members.iter().all(|&m| {
            if m == idx {
                return true;
            }
            parents
                .get(&m)
                .map(|ps| ps.is_subset(members))
                .unwrap_or(true)
        });
        module_flags.insert(idx, is_module && members.len() > 1);
    }

    for (idx, is_module) in module_flags {
        if let Some(Vertex::Gate(g)) = vertex_mut(pdag, idx) {
            g.module = is_module;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdag::{build, PdagOptions};
    use pra_expr::Constant;
    use pra_model::{basic_arg, BasicEvent, Connective, Formula, Gate, Model};
    use std::rc::Rc;

    #[test]
    fn disjoint_subtree_is_a_module() {
        // top = AND(OR(a,b), OR(c,d)) — each OR is variable-disjoint from
        // the rest of the graph, so both should be flagged as modules.
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        let b = BasicEvent::new("b", Rc::new(Constant(0.1)));
        let c = BasicEvent::new("c", Rc::new(Constant(0.1)));
        let d = BasicEvent::new("d", Rc::new(Constant(0.1)));
        for e in [&a, &b, &c, &d] {
            model.add_basic_event(Rc::clone(e)).unwrap();
        }
        let or1 = Gate::new(
            "or1",
            Formula::new(Connective::Or, vec![basic_arg(&a, false), basic_arg(&b, false)]).unwrap(),
        );
        let or2 = Gate::new(
            "or2",
            Formula::new(Connective::Or, vec![basic_arg(&c, false), basic_arg(&d, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&or1)).unwrap();
        model.add_gate(Rc::clone(&or2)).unwrap();
        let top = Gate::new(
            "top",
            Formula::new(
                Connective::And,
                vec![
                    pra_model::Arg::pos(pra_model::EventRef::Gate(Rc::clone(&or1))),
                    pra_model::Arg::pos(pra_model::EventRef::Gate(Rc::clone(&or2))),
                ],
            )
            .unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();

        let pdag = build(&model, &PdagOptions::default()).unwrap();
        let modules = pdag
            .vertices()
            .filter_map(|(_, v)| match v {
                crate::pdag::Vertex::Gate(g) if g.module => Some(g.index),
                _ => None,
            })
            .count();
        assert_eq!(modules, 2);
    }
}
