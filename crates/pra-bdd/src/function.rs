//! The reduced, ordered BDD core: complement edges, the unique table,
//! `Apply`, and exact probability evaluation. Modelled on the
//! complement-edge binary decision diagram rules used in `oxidd`, but
//! specialised to a single concrete manager rather than a generic
//! diagram-rule trait, since this engine only ever needs AND/OR/XOR over
//! one fixed terminal type.

use std::collections::HashSet;

use rustc_hash::FxHashMap;

use pra_pdag::{Literal, Pdag, FALSE_INDEX, TRUE_INDEX};

use crate::error::{BddError, Result};

/// An edge to a node: `node == 0` denotes a terminal, distinguished from
/// inner nodes by reserving id `0` (inner node ids start at `1`).
/// `complement` is the edge tag; by construction every node's `high`
/// child always carries `complement == false` (the tag is pushed onto
/// `low` instead), so a node's identity plus an edge's own tag fully
/// determine its semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Function {
    pub node: u32,
    pub complement: bool,
}

impl Function {
    pub const ONE: Function = Function {
        node: 0,
        complement: false,
    };
    pub const ZERO: Function = Function {
        node: 0,
        complement: true,
    };

    pub fn is_terminal(self) -> bool {
        self.node == 0
    }

    pub fn not(self) -> Function {
        Function {
            node: self.node,
            complement: !self.complement,
        }
    }

    fn tagged(self, complement: bool) -> Function {
        if complement {
            self.not()
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BddNode {
    var: u32,
    high: Function,
    low: Function,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

/// One ROBDD-with-complement-edges arena plus the mutable variable order
/// sifting rearranges.
pub struct BddManager {
    nodes: Vec<BddNode>,
    unique: FxHashMap<(u32, u32, i64), u32>,
    and_table: FxHashMap<(i64, i64), Function>,
    or_table: FxHashMap<(i64, i64), Function>,
    /// variable (PDAG vertex index) -> current BDD level. Smaller levels
    /// are decided first, mirroring the PDAG's topological `order`.
    order: FxHashMap<u32, u32>,
    /// level -> variable, the inverse of `order`; kept dense so adjacent
    /// levels are adjacent array slots for sifting.
    level_var: Vec<u32>,
    prob_cache: Vec<(u64, f64)>,
    prob_generation: u64,
}

impl BddManager {
    /// Seed a manager's variable order from a PDAG's own topological
    /// order (spec §4.1: "the order is the BDD variable ordering seed").
    pub fn new(pdag: &Pdag) -> Self {
        let mut vars: Vec<(u32, u32)> = pdag
            .vertices()
            .filter_map(|(idx, v)| match v {
                pra_pdag::Vertex::Variable(var) => Some((var.order, idx)),
                _ => None,
            })
            .collect();
        vars.sort_by_key(|&(order, idx)| (order, idx));

        let mut order = FxHashMap::default();
        let mut level_var = Vec::with_capacity(vars.len());
        for (level, &(_, idx)) in vars.iter().enumerate() {
            order.insert(idx, level as u32);
            level_var.push(idx);
        }

        BddManager {
            nodes: Vec::new(),
            unique: FxHashMap::default(),
            and_table: FxHashMap::default(),
            or_table: FxHashMap::default(),
            order,
            level_var,
            prob_cache: Vec::new(),
            prob_generation: 0,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn get(&self, id: u32) -> BddNode {
        self.nodes[(id - 1) as usize]
    }

    fn level(&self, var: u32) -> u32 {
        *self
            .order
            .get(&var)
            .expect("variable referenced by a BDD node must have a seeded order")
    }

    fn var_of(&self, f: Function) -> Option<u32> {
        if f.is_terminal() {
            None
        } else {
            Some(self.get(f.node).var)
        }
    }

    /// `FindOrAddVertex`: canonicalise and intern an `ite(var, high, low)`
    /// node. Collapses to `high` when both children are identical, and
    /// pushes a complemented `high` edge down onto `low` so the stored
    /// node's `high` is always uncomplemented (spec §4.2).
    fn reduce_and_insert(&mut self, var: u32, high: Function, low: Function) -> Function {
        if high == low {
            return high;
        }
        let (canon_high, canon_low, outer_complement) = if high.complement {
            (high.not(), low.not(), true)
        } else {
            (high, low, false)
        };
        let key = (var, canon_high.node, signed_id(canon_low));
        let node_id = if let Some(&id) = self.unique.get(&key) {
            id
        } else {
            let id = self.nodes.len() as u32 + 1;
            self.nodes.push(BddNode {
                var,
                high: canon_high,
                low: canon_low,
            });
            self.prob_cache.push((0, 0.0));
            self.unique.insert(key, id);
            id
        };
        Function {
            node: node_id,
            complement: outer_complement,
        }
    }

    /// A genuine decision node for `var`: `ite(var, ONE, ZERO)`.
    pub fn var_node(&mut self, var: u32) -> Function {
        self.reduce_and_insert(var, Function::ONE, Function::ZERO)
    }

    pub fn apply_and(&mut self, a: Function, b: Function) -> Function {
        self.apply(Op::And, a, b)
    }

    pub fn apply_or(&mut self, a: Function, b: Function) -> Function {
        self.apply(Op::Or, a, b)
    }

    fn apply(&mut self, op: Op, a: Function, b: Function) -> Function {
        if let Some(r) = terminal_case(op, a, b) {
            return r;
        }
        let (sa, sb) = (signed_id(a), signed_id(b));
        let key = if sa <= sb { (sa, sb) } else { (sb, sa) };
        let cached = match op {
            Op::And => self.and_table.get(&key),
            Op::Or => self.or_table.get(&key),
        };
        if let Some(&f) = cached {
            return f;
        }

        let a_var = self.var_of(a).unwrap();
        let b_var = self.var_of(b).unwrap();
        let a_level = self.level(a_var);
        let b_level = self.level(b_var);
        let (top_var, top_level) = if a_level <= b_level {
            (a_var, a_level)
        } else {
            (b_var, b_level)
        };

        let (a_high, a_low) = if a_level == top_level {
            let n = self.get(a.node);
            (n.high.tagged(a.complement), n.low.tagged(a.complement))
        } else {
            (a, a)
        };
        let (b_high, b_low) = if b_level == top_level {
            let n = self.get(b.node);
            (n.high.tagged(b.complement), n.low.tagged(b.complement))
        } else {
            (b, b)
        };

        let high = self.apply(op, a_high, b_high);
        let low = self.apply(op, a_low, b_low);
        let result = self.reduce_and_insert(top_var, high, low);
        match op {
            Op::And => self.and_table.insert(key, result),
            Op::Or => self.or_table.insert(key, result),
        };
        result
    }

    /// `CalculateConsensus(ite) = Apply<AND>(ite.high, ite.low, complement,
    /// ite.edge XOR complement)`: the boolean consensus of a node's two
    /// cofactors, used by the ZBDD/prime-implicant layer.
    pub fn consensus(&mut self, f: Function) -> Function {
        if f.is_terminal() {
            return f;
        }
        let node = self.get(f.node);
        let high = node.high.tagged(f.complement);
        let low = node.low.tagged(f.complement);
        self.apply_and(high, low)
    }

    /// Exact top-event probability, `Pr(Ite) = p(var)*Pr(high) + (1 -
    /// p(var)) * Pr(low)` (spec §4.2), read off `pdag`'s basic events.
    /// Each node caches its own (uncomplemented) value per call, tagged
    /// with a generation counter so repeated calls at a new parameter set
    /// (e.g. a later mission time) don't see stale values without paying
    /// for a full cache wipe.
    pub fn probability(&mut self, root: Function, pdag: &Pdag) -> f64 {
        self.prob_generation += 1;
        self.probability_rec(root, pdag)
    }

    fn probability_rec(&mut self, f: Function, pdag: &Pdag) -> f64 {
        if f.is_terminal() {
            return if f == Function::ONE { 1.0 } else { 0.0 };
        }
        let slot = (f.node - 1) as usize;
        let gen = self.prob_generation;
        if self.prob_cache[slot].0 == gen {
            let canonical = self.prob_cache[slot].1;
            return if f.complement { 1.0 - canonical } else { canonical };
        }
        let node = self.get(f.node);
        let p_var = pdag
            .variable(node.var)
            .map(|v| v.basic_event.p())
            .unwrap_or(0.0);
        let p_high = self.probability_rec(node.high, pdag);
        let p_low = self.probability_rec(node.low, pdag);
        let canonical = p_var * p_high + (1.0 - p_var) * p_low;
        self.prob_cache[slot] = (gen, canonical);
        if f.complement {
            1.0 - canonical
        } else {
            canonical
        }
    }

    /// Verify `TestStructure`'s invariants: every reachable non-terminal
    /// has two children and a strictly-increasing variable order towards
    /// the leaves.
    pub fn check_structure(&self, root: Function) -> Result<()> {
        let mut seen = HashSet::new();
        self.check_structure_rec(root, &mut seen)
    }

    fn check_structure_rec(&self, f: Function, seen: &mut HashSet<u32>) -> Result<()> {
        if f.is_terminal() || !seen.insert(f.node) {
            return Ok(());
        }
        let node = self.get(f.node);
        let my_level = self.level(node.var);
        for child in [node.high, node.low] {
            if !child.is_terminal() {
                let child_level = self.level(self.get(child.node).var);
                if child_level <= my_level {
                    return Err(BddError::Malformed(format!(
                        "node {} (level {}) has a child at level {} (not strictly deeper)",
                        f.node, my_level, child_level
                    )));
                }
            }
        }
        self.check_structure_rec(node.high, seen)?;
        self.check_structure_rec(node.low, seen)
    }

    /// For a non-terminal `f`, its deciding variable and its two cofactors
    /// (with `f`'s own complement tag already folded in). Used by
    /// downstream conversions (ZBDD construction, Monte Carlo tracing)
    /// that need to walk the diagram without reaching into its internals.
    pub fn children(&self, f: Function) -> Option<(u32, Function, Function)> {
        if f.is_terminal() {
            return None;
        }
        let node = self.get(f.node);
        Some((node.var, node.high.tagged(f.complement), node.low.tagged(f.complement)))
    }

    /// The current BDD level (position in the variable order) of `var`,
    /// if it has been seeded into this manager.
    pub fn order_of(&self, var: u32) -> Option<u32> {
        self.order.get(&var).copied()
    }

    /// All seeded variables, in current level order (lowest level first).
    pub fn variable_order(&self) -> &[u32] {
        &self.level_var
    }

    pub(crate) fn level_count(&self) -> usize {
        self.level_var.len()
    }

    pub(crate) fn level_of_var(&self, var: u32) -> u32 {
        self.level(var)
    }

    pub(crate) fn level_vars(&self) -> &[u32] {
        &self.level_var
    }

    pub(crate) fn live_node_count(&self, root: Function) -> usize {
        if root.is_terminal() {
            return 0;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![root.node];
        seen.insert(root.node);
        while let Some(id) = stack.pop() {
            let node = self.get(id);
            for child in [node.high, node.low] {
                if !child.is_terminal() && seen.insert(child.node) {
                    stack.push(child.node);
                }
            }
        }
        seen.len()
    }

    /// Cofactor `f` with respect to `var = value`. If `f` does not depend
    /// on `var` at its top level, it is returned unchanged.
    pub(crate) fn cofactor(&self, f: Function, var: u32, value: bool) -> Function {
        if f.is_terminal() {
            return f;
        }
        let node = self.get(f.node);
        if node.var != var {
            return f;
        }
        let child = if value { node.high } else { node.low };
        child.tagged(f.complement)
    }

    pub(crate) fn reduce_public(&mut self, var: u32, high: Function, low: Function) -> Function {
        self.reduce_and_insert(var, high, low)
    }

    pub(crate) fn nodes_with_var(&self, var: u32) -> Vec<(u32, Function, Function)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.var == var)
            .map(|(i, n)| ((i + 1) as u32, n.high, n.low))
            .collect()
    }

    pub(crate) fn rewrite_children<F: Fn(Function) -> Option<Function>>(&mut self, f: F) {
        for node in self.nodes.iter_mut() {
            if let Some(r) = f(node.high) {
                node.high = r;
            }
            if let Some(r) = f(node.low) {
                node.low = r;
            }
        }
    }

    pub(crate) fn set_level_vars(&mut self, level_var: Vec<u32>, order: FxHashMap<u32, u32>) {
        self.level_var = level_var;
        self.order = order;
    }
}

fn signed_id(f: Function) -> i64 {
    if f.complement {
        -(f.node as i64) - 1
    } else {
        f.node as i64 + 1
    }
}

/// Terminal cases for AND/OR, modelled directly on `oxidd`'s
/// `terminal_and`: equal operands collapse (to themselves, or to the
/// absorbing constant if one is the complement of the other), and a
/// terminal operand is either absorbing or an identity.
fn terminal_case(op: Op, a: Function, b: Function) -> Option<Function> {
    if a.node == b.node {
        return Some(match op {
            Op::And => {
                if a.complement == b.complement {
                    a
                } else {
                    Function::ZERO
                }
            }
            Op::Or => {
                if a.complement == b.complement {
                    a
                } else {
                    Function::ONE
                }
            }
        });
    }
    if a.is_terminal() && b.is_terminal() {
        let av = a == Function::ONE;
        let bv = b == Function::ONE;
        let v = match op {
            Op::And => av && bv,
            Op::Or => av || bv,
        };
        return Some(if v { Function::ONE } else { Function::ZERO });
    }
    if a.is_terminal() {
        let av = a == Function::ONE;
        return Some(match op {
            Op::And => {
                if av {
                    b
                } else {
                    Function::ZERO
                }
            }
            Op::Or => {
                if av {
                    Function::ONE
                } else {
                    b
                }
            }
        });
    }
    if b.is_terminal() {
        let bv = b == Function::ONE;
        return Some(match op {
            Op::And => {
                if bv {
                    a
                } else {
                    Function::ZERO
                }
            }
            Op::Or => {
                if bv {
                    Function::ONE
                } else {
                    a
                }
            }
        });
    }
    None
}

pub(crate) fn literal_function(lit: Literal, compiled: &pra_pdag::IndexMap<Function>) -> Function {
    let idx = lit.unsigned_abs();
    let base = if idx == FALSE_INDEX {
        Function::ZERO
    } else if idx == TRUE_INDEX {
        Function::ONE
    } else {
        *compiled
            .get(idx)
            .expect("PDAG child must be compiled before its parent")
    };
    base.tagged(lit < 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_var_pdag(p: f64) -> Pdag {
        use pra_expr::Constant;
        use pra_model::{BasicEvent, Connective, Formula, Gate, Model};
        use std::rc::Rc;

        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(p)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        let top = Gate::new(
            "top",
            Formula::new(
                Connective::Null,
                vec![pra_model::basic_arg(&a, false)],
            )
            .unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        pra_pdag::build(&model, &pra_pdag::PdagOptions::default()).unwrap()
    }

    #[test]
    fn apply_and_of_a_node_with_itself_is_itself() {
        let pdag = single_var_pdag(0.2);
        let mut mgr = BddManager::new(&pdag);
        let var = pdag.basic_events().iter().next().unwrap().0;
        let x = mgr.var_node(var);
        assert_eq!(mgr.apply_and(x, x), x);
        assert_eq!(mgr.apply_or(x, x), x);
    }

    #[test]
    fn apply_and_of_complementary_operands_is_false() {
        let pdag = single_var_pdag(0.2);
        let mut mgr = BddManager::new(&pdag);
        let var = pdag.basic_events().iter().next().unwrap().0;
        let x = mgr.var_node(var);
        assert_eq!(mgr.apply_and(x, x.not()), Function::ZERO);
        assert_eq!(mgr.apply_or(x, x.not()), Function::ONE);
    }

    #[test]
    fn probability_of_bare_variable_is_its_own_p() {
        let pdag = single_var_pdag(0.37);
        let mut mgr = BddManager::new(&pdag);
        let var = pdag.basic_events().iter().next().unwrap().0;
        let x = mgr.var_node(var);
        let p = mgr.probability(x, &pdag);
        assert!((p - 0.37).abs() < 1e-9);
        let p_not = mgr.probability(x.not(), &pdag);
        assert!((p_not - 0.63).abs() < 1e-9);
    }
}
