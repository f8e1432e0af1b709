//! Zero-suppressed BDDs over a PDAG's variable order: the set-of-products
//! dual to [`pra_bdd`]'s BDD, used to enumerate minimal cut sets (for a
//! coherent graph) or prime implicants (for a non-coherent one).
//!
//! Unlike the BDD engine this has no complement edges — a ZBDD has two
//! distinct terminals, `EMPTY` (the empty family, no products) and
//! `BASE` (the family containing just the empty product) — but it does
//! carry *signed* elements: a node's element is a PDAG literal, not a
//! bare variable, so a non-coherent graph's prime implicants can include
//! negative literals without needing a second diagram shape.

use rustc_hash::FxHashMap;

use pra_bdd::{BddManager, Function};
use pra_pdag::Literal;

pub type ZFunction = u32;
pub const EMPTY: ZFunction = 0;
pub const BASE: ZFunction = 1;
const FIRST_NODE_ID: ZFunction = 2;

#[derive(Debug, Clone, Copy)]
struct ZbddNode {
    element: Literal,
    high: ZFunction,
    low: ZFunction,
}

/// A reduced ZBDD arena plus the variable order (copied from the
/// originating [`BddManager`] at conversion time) used to keep element
/// comparisons consistent with the BDD's own nesting.
pub struct ZbddManager {
    nodes: Vec<ZbddNode>,
    unique: FxHashMap<(Literal, ZFunction, ZFunction), ZFunction>,
    union_memo: FxHashMap<(ZFunction, ZFunction), ZFunction>,
    level: FxHashMap<u32, u32>,
}

impl ZbddManager {
    fn new(level: FxHashMap<u32, u32>) -> Self {
        ZbddManager {
            nodes: Vec::new(),
            unique: FxHashMap::default(),
            union_memo: FxHashMap::default(),
            level,
        }
    }

    fn get(&self, id: ZFunction) -> ZbddNode {
        self.nodes[(id - FIRST_NODE_ID) as usize]
    }

    /// Element-ordering key: primarily the underlying variable's BDD
    /// level, with the positive literal of a variable ordered before its
    /// negation so a node's `high`/`low` pair for the same variable
    /// always nest at the same point in the order.
    fn element_key(&self, e: Literal) -> (u32, bool) {
        let lvl = *self.level.get(&e.unsigned_abs()).unwrap_or(&u32::MAX);
        (lvl, e < 0)
    }

    /// `FindOrAddVertex` for the zero-suppression rule: a node whose
    /// `high` branch is the empty family is redundant (no product
    /// reaches the terminal through `element`), and collapses to `low`.
    fn mk(&mut self, element: Literal, high: ZFunction, low: ZFunction) -> ZFunction {
        if high == EMPTY {
            return low;
        }
        let key = (element, high, low);
        if let Some(&id) = self.unique.get(&key) {
            return id;
        }
        let id = self.nodes.len() as u32 + FIRST_NODE_ID;
        self.nodes.push(ZbddNode { element, high, low });
        self.unique.insert(key, id);
        id
    }

    /// Set union of the two product families.
    pub fn union(&mut self, a: ZFunction, b: ZFunction) -> ZFunction {
        if a == EMPTY {
            return b;
        }
        if b == EMPTY {
            return a;
        }
        if a == b {
            return a;
        }
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(&cached) = self.union_memo.get(&key) {
            return cached;
        }
        let result = if a == BASE {
            self.union_with_base(b)
        } else if b == BASE {
            self.union_with_base(a)
        } else {
            let na = self.get(a);
            let nb = self.get(b);
            if na.element == nb.element {
                let high = self.union(na.high, nb.high);
                let low = self.union(na.low, nb.low);
                self.mk(na.element, high, low)
            } else if self.element_key(na.element) < self.element_key(nb.element) {
                let low = self.union(na.low, b);
                self.mk(na.element, na.high, low)
            } else {
                let low = self.union(a, nb.low);
                self.mk(nb.element, nb.high, low)
            }
        };
        self.union_memo.insert(key, result);
        result
    }

    /// `BASE` unions `{∅}` into whichever product family it's combined
    /// with, by inserting the empty set at every leaf of `f`'s low spine.
    fn union_with_base(&mut self, f: ZFunction) -> ZFunction {
        if f == EMPTY || f == BASE {
            return BASE;
        }
        let n = self.get(f);
        let low = self.union_with_base(n.low);
        self.mk(n.element, n.high, low)
    }

    /// Number of products in the family rooted at `f`.
    pub fn count(&self, f: ZFunction) -> u64 {
        match f {
            EMPTY => 0,
            BASE => 1,
            _ => {
                let n = self.get(f);
                self.count(n.high) + self.count(n.low)
            }
        }
    }

    /// Every product in the family rooted at `f`, each as an ascending
    /// (by absolute value) vector of signed literals.
    pub fn products(&self, f: ZFunction) -> Vec<Vec<Literal>> {
        let mut out = Vec::new();
        let mut current = Vec::new();
        self.collect(f, &mut current, &mut out);
        out
    }

    fn collect(&self, f: ZFunction, current: &mut Vec<Literal>, out: &mut Vec<Vec<Literal>>) {
        match f {
            EMPTY => {}
            BASE => {
                let mut product = current.clone();
                product.sort_by_key(|l: &Literal| l.unsigned_abs());
                out.push(product);
            }
            _ => {
                let n = self.get(f);
                current.push(n.element);
                self.collect(n.high, current, out);
                current.pop();
                self.collect(n.low, current, out);
            }
        }
    }
}

/// Convert a compiled BDD function into the ZBDD of its true points: for
/// a coherent (monotone) function every root-to-`ONE` path yields exactly
/// one minimal cut set made of the variables forced true along it
/// (variables the path never tests are simply absent, never a negative
/// literal, since monotonicity means their absence never needed
/// asserting); for a non-coherent function the low branch of each tested
/// variable instead contributes its *negative* literal, preserving the
/// prime-implicant semantics spec §4.3 calls for.
pub fn from_bdd(bdd: &BddManager, root: Function, coherent: bool) -> (ZbddManager, ZFunction) {
    let mut level = FxHashMap::default();
    for (lvl, &var) in bdd.variable_order().iter().enumerate() {
        level.insert(var, lvl as u32);
    }
    let mut manager = ZbddManager::new(level);
    let mut memo: FxHashMap<(u32, bool), ZFunction> = FxHashMap::default();
    let root_z = convert(bdd, &mut manager, &mut memo, root, coherent);
    (manager, root_z)
}

fn convert(
    bdd: &BddManager,
    manager: &mut ZbddManager,
    memo: &mut FxHashMap<(u32, bool), ZFunction>,
    f: Function,
    coherent: bool,
) -> ZFunction {
    if f == Function::ZERO {
        return EMPTY;
    }
    if f == Function::ONE {
        return BASE;
    }
    let key = (f.node, f.complement);
    if let Some(&z) = memo.get(&key) {
        return z;
    }
    let (var, high, low) = bdd.children(f).expect("non-terminal Function must have children");
    let high_z = convert(bdd, manager, memo, high, coherent);
    let low_z = if coherent {
        convert(bdd, manager, memo, low, coherent)
    } else {
        // the variable being false is itself a fact worth recording: add
        // its negative literal to every product reached through `low`.
        let low_inner = convert(bdd, manager, memo, low, coherent);
        let negative = -(var as Literal);
        manager.mk(negative, low_inner, EMPTY)
    };
    let z = if coherent {
        manager.mk(var as Literal, high_z, low_z)
    } else {
        manager.union(manager.mk(var as Literal, high_z, EMPTY), low_z)
    };
    memo.insert(key, z);
    z
}
