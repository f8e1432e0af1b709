use std::collections::HashMap;
use std::rc::Rc;

use pra_model::{BasicEvent, Connective, EventId, EventRef, Gate, Model};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::index_map::IndexMap;

/// The first index available for a variable vertex; `0` and `1` are the
/// constant terminals `FALSE`/`TRUE`.
pub const VARIABLE_START_INDEX: u32 = 2;
pub const FALSE_INDEX: u32 = 0;
pub const TRUE_INDEX: u32 = 1;

/// A signed vertex reference: the absolute value names a vertex, the sign
/// its polarity. `0`/`1` (and their negations, which collapse to `1`/`0`
/// respectively) denote the constant terminals.
pub type Literal = i32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PdagError {
    #[error("model has no top gate")]
    NoTopGate,
    #[error("unsupported expansion: {0}")]
    UnsupportedExpansion(String),
}

pub type Result<T, E = PdagError> = std::result::Result<T, E>;

#[derive(Debug, Clone)]
pub struct PdagVariable {
    pub index: u32,
    pub order: u32,
    pub basic_event: Rc<BasicEvent>,
}

#[derive(Debug, Clone)]
pub struct PdagGate {
    pub index: u32,
    pub order: u32,
    pub connective: Connective,
    pub args: Vec<Literal>,
    pub min_number: Option<u32>,
    pub max_number: Option<u32>,
    pub coherent: bool,
    pub module: bool,
}

#[derive(Debug, Clone)]
pub enum Vertex {
    Variable(PdagVariable),
    Gate(PdagGate),
}

impl Vertex {
    pub fn index(&self) -> u32 {
        match self {
            Vertex::Variable(v) => v.index,
            Vertex::Gate(g) => g.index,
        }
    }
    pub fn order(&self) -> u32 {
        match self {
            Vertex::Variable(v) => v.order,
            Vertex::Gate(g) => g.order,
        }
    }
    fn set_order(&mut self, order: u32) {
        match self {
            Vertex::Variable(v) => v.order = order,
            Vertex::Gate(g) => g.order = order,
        }
    }
    pub fn children(&self) -> &[Literal] {
        match self {
            Vertex::Variable(_) => &[],
            Vertex::Gate(g) => &g.args,
        }
    }
}

/// Normalisation knobs for PDAG construction (spec §4.1 step 2/3).
#[derive(Debug, Clone, Copy)]
pub struct PdagOptions {
    pub keep_null_gates: bool,
    pub expand_atleast_gates: bool,
    pub expand_xor_gates: bool,
}

impl Default for PdagOptions {
    fn default() -> Self {
        PdagOptions {
            keep_null_gates: false,
            expand_atleast_gates: false,
            expand_xor_gates: false,
        }
    }
}

/// The canonical, indexed propositional DAG.
#[derive(Debug, Clone)]
pub struct Pdag {
    pub root: Literal,
    vertices: IndexMap<Vertex>,
    basic_event_index: FxHashMap<EventId, u32>,
    pub initiating_event_frequency: f64,
}

impl Pdag {
    pub fn vertex(&self, index: u32) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    pub fn variable(&self, index: u32) -> Option<&PdagVariable> {
        match self.vertices.get(index) {
            Some(Vertex::Variable(v)) => Some(v),
            _ => None,
        }
    }

    pub fn gate(&self, index: u32) -> Option<&PdagGate> {
        match self.vertices.get(index) {
            Some(Vertex::Gate(g)) => Some(g),
            _ => None,
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = (u32, &Vertex)> {
        self.vertices.iter()
    }

    /// Dense 1-based map from variable index to the originating basic event.
    pub fn basic_events(&self) -> IndexMap<Rc<BasicEvent>> {
        let mut out = IndexMap::new();
        for (idx, v) in self.vertices.iter() {
            if let Vertex::Variable(var) = v {
                out.insert(idx, Rc::clone(&var.basic_event));
            }
        }
        out
    }

    pub fn index_of(&self, event: EventId) -> Option<u32> {
        self.basic_event_index.get(&event).copied()
    }

    /// `true` iff the root is a NULL-gate over one literal, or a constant.
    pub fn is_trivial(&self) -> bool {
        if self.root.unsigned_abs() <= TRUE_INDEX {
            return true;
        }
        match self.vertex(self.root.unsigned_abs()) {
            Some(Vertex::Gate(g)) => g.connective == Connective::Null && g.args.len() == 1,
            _ => false,
        }
    }

    pub fn gate_mut(&mut self, index: u32) -> Option<&mut PdagGate> {
        match self.vertices.get_mut(index) {
            Some(Vertex::Gate(g)) => Some(g),
            _ => None,
        }
    }

    pub fn set_root(&mut self, root: Literal) {
        self.root = root;
    }

    /// Every non-terminal vertex, children before parents — the order a
    /// bottom-up rewrite pass needs to walk in.
    pub fn children_first_order(&self) -> Vec<u32> {
        topological_order(self).into_iter().rev().collect()
    }

    /// Number of distinct gates that reference each vertex as a direct
    /// child (by absolute index). A vertex with more than one parent
    /// cannot be rewritten in place without affecting its other parents.
    pub fn parent_counts(&self) -> HashMap<u32, u32> {
        let mut counts = HashMap::new();
        for (_, v) in self.vertices() {
            for &child in v.children() {
                if let Some(idx) = nonconst_index(child) {
                    *counts.entry(idx).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    pub fn var_count(&self) -> usize {
        self.vertices
            .iter()
            .filter(|(_, v)| matches!(v, Vertex::Variable(_)))
            .count()
    }

    pub fn gate_count(&self) -> usize {
        self.vertices
            .iter()
            .filter(|(_, v)| matches!(v, Vertex::Gate(_)))
            .count()
    }
}

/// Construct a [`Pdag`] from `model`, applying the normalisation rules of
/// spec §4.1.
pub fn build(model: &Model, options: &PdagOptions) -> Result<Pdag> {
    let top = model.top_gate.clone().ok_or(PdagError::NoTopGate)?;

    let mut builder = Builder {
        vertices: IndexMap::new(),
        basic_event_index: FxHashMap::default(),
        gate_memo: FxHashMap::default(),
        next_index: VARIABLE_START_INDEX,
        options: *options,
    };

    let root = builder.lower_gate_ref(&top, false)?;

    let mut pdag = Pdag {
        root,
        vertices: builder.vertices,
        basic_event_index: builder.basic_event_index,
        initiating_event_frequency: model.initiating_event_frequency,
    };

    assign_order(&mut pdag);
    crate::module::discover_modules(&mut pdag);
    compute_coherence(&mut pdag);

    Ok(pdag)
}

struct Builder {
    vertices: IndexMap<Vertex>,
    basic_event_index: FxHashMap<EventId, u32>,
    gate_memo: FxHashMap<EventId, Literal>,
    next_index: u32,
    options: PdagOptions,
}

impl Builder {
    fn fresh_index(&mut self) -> u32 {
        let idx = self.next_index;
        self.next_index += 1;
        idx
    }

    fn lower_event_ref(&mut self, event: &EventRef, complement: bool) -> Result<Literal> {
        match event {
            EventRef::Basic(b) => {
                let idx = match self.basic_event_index.get(&b.id) {
                    Some(&idx) => idx,
                    None => {
                        let new_idx = self.fresh_index();
                        self.basic_event_index.insert(b.id, new_idx);
                        self.vertices.insert(
                            new_idx,
                            Vertex::Variable(PdagVariable {
                                index: new_idx,
                                order: 0,
                                basic_event: Rc::clone(b),
                            }),
                        );
                        new_idx
                    }
                };
                Ok(signed(idx, complement))
            }
            EventRef::House(h) => {
                let truth = h.state() ^ complement;
                Ok(if truth { TRUE_INDEX as i32 } else { FALSE_INDEX as i32 })
            }
            EventRef::Gate(g) => self.lower_gate_ref(g, complement),
        }
    }

    fn lower_gate_ref(&mut self, gate: &Rc<Gate>, complement: bool) -> Result<Literal> {
        if let Some(&memoised) = self.gate_memo.get(&gate.id) {
            return Ok(apply_sign(memoised, complement));
        }
        let formula = gate.formula();

        // NOT and (optionally) NULL gates are always/optionally pure
        // polarity pass-throughs: they never materialise a vertex.
        if formula.connective == Connective::Not {
            let arg = &formula.args[0];
            let lit = self.lower_event_ref(&arg.event, arg.complement)?;
            // The gate itself inverts polarity, on top of whatever the
            // outer reference to this gate asks for.
            let result = apply_sign(lit, !complement);
            // A NOT gate is referenced by id elsewhere only via its own
            // Rc, which always re-enters this function, so nothing to
            // memoise under its own polarity (it has none).
            return Ok(result);
        }
        if formula.connective == Connective::Null && !self.options.keep_null_gates {
            let arg = &formula.args[0];
            let lit = self.lower_event_ref(&arg.event, arg.complement)?;
            return Ok(apply_sign(lit, complement));
        }

        // Reserve the index before recursing so that a cyclic memo lookup
        // (which cannot legally occur in an acyclic model, but would
        // otherwise infinite-loop on a malformed one) fails fast instead
        // of overflowing the stack silently.
        let index = self.fresh_index();
        self.gate_memo.insert(gate.id, index as i32);

        let (connective, args, min_number, max_number) = match formula.connective {
            Connective::Xor if self.options.expand_xor_gates => {
                let args: Vec<Literal> = formula
                    .args
                    .iter()
                    .map(|a| self.lower_event_ref(&a.event, a.complement))
                    .collect::<Result<_>>()?;
                let expanded = self.expand_xor(&args)?;
                (Connective::Or, expanded, None, None)
            }
            Connective::Atleast | Connective::Cardinality if self.options.expand_atleast_gates => {
                let args: Vec<Literal> = formula
                    .args
                    .iter()
                    .map(|a| self.lower_event_ref(&a.event, a.complement))
                    .collect::<Result<_>>()?;
                let min = formula.min_number.unwrap_or(1);
                let max = formula.max_number.unwrap_or(args.len() as u32);
                let expanded = self.expand_cardinality(&args, min, max)?;
                (Connective::Or, expanded, None, None)
            }
            other => {
                let args: Vec<Literal> = formula
                    .args
                    .iter()
                    .map(|a| self.lower_event_ref(&a.event, a.complement))
                    .collect::<Result<_>>()?;
                (other, args, formula.min_number, formula.max_number)
            }
        };

        self.vertices.insert(
            index,
            Vertex::Gate(PdagGate {
                index,
                order: 0,
                connective,
                args,
                min_number,
                max_number,
                coherent: false,
                module: false,
            }),
        );

        Ok(apply_sign(index as i32, complement))
    }

    /// `a XOR b XOR c XOR ... ≡` a left-folded tree of binary
    /// `(a ∧ ¬b) ∨ (¬a ∧ b)` gates (spec §4.1 step 2).
    fn expand_xor(&mut self, args: &[Literal]) -> Result<Vec<Literal>> {
        if args.len() < 2 {
            return Err(PdagError::UnsupportedExpansion(
                "XOR requires at least two arguments".into(),
            ));
        }
        let mut acc = args[0];
        for &next in &args[1..] {
            let and1 = self.new_and(&[acc, -next]);
            let and2 = self.new_and(&[-acc, next]);
            acc = self.new_or(&[and1, and2]);
        }
        Ok(vec![acc])
    }

    /// "at least `min`, at most `max`" expanded as an OR of ANDs over every
    /// `k`-combination for `k` in `[min, max]` (spec §4.1 step 2).
    fn expand_cardinality(&mut self, args: &[Literal], min: u32, max: u32) -> Result<Vec<Literal>> {
        let n = args.len();
        let mut disjuncts = Vec::new();
        for k in min..=max.min(n as u32) {
            for combo in combinations(n, k as usize) {
                let lits: Vec<Literal> = combo.iter().map(|&i| args[i]).collect();
                disjuncts.push(self.new_and(&lits));
            }
        }
        if disjuncts.is_empty() {
            return Ok(vec![FALSE_INDEX as i32]);
        }
        Ok(disjuncts)
    }

    fn new_and(&mut self, args: &[Literal]) -> Literal {
        self.new_gate(Connective::And, args)
    }
    fn new_or(&mut self, args: &[Literal]) -> Literal {
        self.new_gate(Connective::Or, args)
    }

    fn new_gate(&mut self, connective: Connective, args: &[Literal]) -> Literal {
        let index = self.fresh_index();
        self.vertices.insert(
            index,
            Vertex::Gate(PdagGate {
                index,
                order: 0,
                connective,
                args: args.to_vec(),
                min_number: None,
                max_number: None,
                coherent: false,
                module: false,
            }),
        );
        index as i32
    }
}

fn signed(index: u32, complement: bool) -> Literal {
    if complement {
        -(index as i32)
    } else {
        index as i32
    }
}

fn apply_sign(literal: Literal, complement: bool) -> Literal {
    if complement {
        -literal
    } else {
        literal
    }
}

/// All `k`-combinations of `0..n` in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if k > n {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        result.push(current.clone());
        let mut i = k;
        loop {
            if i == 0 {
                return result;
            }
            i -= 1;
            if current[i] != i + n - k {
                break;
            }
        }
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

/// Assign topological order (spec §4.1 step 4): a DFS post-order gives a
/// valid topological order (parents before children on the "points-to"
/// relation); a single forward relaxation pass over that order then gives
/// every vertex the tightest order satisfying `order(parent) <
/// order(child)`.
fn assign_order(pdag: &mut Pdag) {
    let topo = topological_order(pdag);
    let mut order: HashMap<u32, u32> = HashMap::new();
    if let Some(root_idx) = nonconst_index(pdag.root) {
        order.insert(root_idx, 0);
    }
    for &idx in &topo {
        let here = *order.get(&idx).unwrap_or(&0);
        let children: Vec<Literal> = pdag
            .vertex(idx)
            .map(|v| v.children().to_vec())
            .unwrap_or_default();
        for child in children {
            if let Some(child_idx) = nonconst_index(child) {
                let candidate = here + 1;
                let slot = order.entry(child_idx).or_insert(0);
                if candidate > *slot {
                    *slot = candidate;
                }
            }
        }
    }
    for (idx, ord) in order {
        if let Some(v) = vertex_mut(pdag, idx) {
            v.set_order(ord);
        }
    }
}

pub(crate) fn vertex_mut(pdag: &mut Pdag, idx: u32) -> Option<&mut Vertex> {
    pdag.vertices.get_mut(idx)
}

pub(crate) fn nonconst_index(literal: Literal) -> Option<u32> {
    let idx = literal.unsigned_abs();
    if idx <= TRUE_INDEX {
        None
    } else {
        Some(idx)
    }
}

pub(crate) fn topological_order(pdag: &Pdag) -> Vec<u32> {
    let mut visited: HashMap<u32, bool> = HashMap::new();
    let mut postorder = Vec::new();
    if let Some(root_idx) = nonconst_index(pdag.root) {
        dfs_postorder(pdag, root_idx, &mut visited, &mut postorder);
    }
    postorder.reverse();
    postorder
}

fn dfs_postorder(pdag: &Pdag, idx: u32, visited: &mut HashMap<u32, bool>, out: &mut Vec<u32>) {
    if visited.contains_key(&idx) {
        return;
    }
    visited.insert(idx, true);
    if let Some(v) = pdag.vertex(idx) {
        for &child in v.children() {
            if let Some(child_idx) = nonconst_index(child) {
                dfs_postorder(pdag, child_idx, visited, out);
            }
        }
    }
    out.push(idx);
}

/// A gate is coherent iff it uses only a monotone connective, none of its
/// own arguments are negated, and every gate it refers to is itself
/// coherent.
fn compute_coherence(pdag: &mut Pdag) {
    let topo = topological_order(pdag);
    let mut coherent_of: HashMap<u32, bool> = HashMap::new();
    // process leaves-first: topological_order lists parents before
    // children, so walk it in reverse to get children-before-parents.
    for &idx in topo.iter().rev() {
        let is_coherent = match pdag.vertex(idx) {
            Some(Vertex::Variable(_)) => true,
            Some(Vertex::Gate(g)) => {
                let monotone = matches!(
                    g.connective,
                    Connective::And | Connective::Or | Connective::Atleast | Connective::Cardinality
                );
                let no_negation = g.args.iter().all(|&a| a >= 0 || a == FALSE_INDEX as i32);
                let children_ok = g.args.iter().all(|&a| {
                    let cidx = a.unsigned_abs();
                    if cidx <= TRUE_INDEX {
                        true
                    } else {
                        *coherent_of.get(&cidx).unwrap_or(&true)
                    }
                });
                monotone && no_negation && children_ok
            }
            None => true,
        };
        coherent_of.insert(idx, is_coherent);
    }
    for (idx, coherent) in coherent_of {
        if let Some(Vertex::Gate(g)) = vertex_mut(pdag, idx) {
            g.coherent = coherent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pra_model::{basic_arg, Arg, BasicEvent, Formula, Model};
    use pra_expr::Constant;

    fn or_model(pa: f64, pb: f64) -> Model {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(pa)));
        let b = BasicEvent::new("b", Rc::new(Constant(pb)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        model.add_basic_event(Rc::clone(&b)).unwrap();
        let top = Gate::new(
            "top",
            Formula::new(Connective::Or, vec![basic_arg(&a, false), basic_arg(&b, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        model
    }

    #[test]
    fn builds_two_variables_and_one_gate() {
        let model = or_model(0.1, 0.2);
        let pdag = build(&model, &PdagOptions::default()).unwrap();
        assert_eq!(pdag.var_count(), 2);
        assert_eq!(pdag.gate_count(), 1);
        assert!(!pdag.is_trivial());
    }

    #[test]
    fn order_respects_parent_child_strict_increase() {
        let model = or_model(0.1, 0.2);
        let pdag = build(&model, &PdagOptions::default()).unwrap();
        let root_idx = pdag.root.unsigned_abs();
        let root_order = pdag.vertex(root_idx).unwrap().order();
        if let Some(Vertex::Gate(g)) = pdag.vertex(root_idx) {
            for &c in &g.args {
                let cidx = c.unsigned_abs();
                if cidx > TRUE_INDEX {
                    assert!(pdag.vertex(cidx).unwrap().order() > root_order);
                }
            }
        }
    }

    #[test]
    fn coherent_or_of_positive_literals_is_coherent() {
        let model = or_model(0.1, 0.2);
        let pdag = build(&model, &PdagOptions::default()).unwrap();
        let root_idx = pdag.root.unsigned_abs();
        assert!(pdag.gate(root_idx).unwrap().coherent);
    }

    #[test]
    fn not_gate_is_inlined_as_negative_literal() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.3)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        let not_gate = Gate::new(
            "not_a",
            Formula::new(Connective::Not, vec![Arg::pos(EventRef::Basic(Rc::clone(&a)))]).unwrap(),
        );
        model.add_gate(Rc::clone(&not_gate)).unwrap();
        model.set_top_gate(not_gate).unwrap();
        let pdag = build(&model, &PdagOptions::default()).unwrap();
        assert_eq!(pdag.gate_count(), 0);
        assert!(pdag.root < 0);
    }

    #[test]
    fn atleast_expansion_produces_or_of_ands() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        let b = BasicEvent::new("b", Rc::new(Constant(0.1)));
        let c = BasicEvent::new("c", Rc::new(Constant(0.1)));
        for e in [&a, &b, &c] {
            model.add_basic_event(Rc::clone(e)).unwrap();
        }
        let top = Gate::new(
            "top",
            Formula::at_least(
                2,
                vec![basic_arg(&a, false), basic_arg(&b, false), basic_arg(&c, false)],
            )
            .unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        let options = PdagOptions {
            expand_atleast_gates: true,
            ..Default::default()
        };
        let pdag = build(&model, &options).unwrap();
        let root = pdag.gate(pdag.root.unsigned_abs()).unwrap();
        assert_eq!(root.connective, Connective::Or);
        assert_eq!(root.args.len(), 3); // C(3,2)
    }
}
