//! Dynamic variable reordering ("sifting", spec §4.2): repeatedly walk
//! each variable through every other position via adjacent swaps,
//! settling each at whichever position minimised the live node count.

use rustc_hash::FxHashMap;

use crate::function::{BddManager, Function};

const SIFT_NODE_THRESHOLD: usize = 1000;
const MAX_SIFT_ITERATIONS: u32 = 8;

impl BddManager {
    /// Reorder variables in place to shrink the BDD rooted at `root`,
    /// returning the (possibly relabelled) root. A no-op below the
    /// 1,000-node / single-variable thresholds spec §4.2 specifies.
    pub fn sift(&mut self, root: Function) -> Function {
        if self.level_count() <= 1 {
            return root;
        }
        if self.live_node_count(root) <= SIFT_NODE_THRESHOLD {
            return root;
        }
        self.sift_core(root)
    }

    /// The reordering sweep itself, without `sift`'s below-threshold
    /// early exit.
    fn sift_core(&mut self, root: Function) -> Function {
        let mut current = root;
        for _round in 0..MAX_SIFT_ITERATIONS {
            let mut improved = false;
            let vars_this_round: Vec<u32> = self.level_vars().to_vec();

            for var in vars_this_round {
                let start_level = self.level_of_var(var);
                let mut level = start_level;
                let mut best_level = start_level;
                let mut best_size = self.live_node_count(current);

                // sweep the variable down to the bottom level
                while level + 1 < self.level_count() as u32 {
                    current = self.swap_with_root(level, current);
                    level += 1;
                    let size = self.live_node_count(current);
                    if size < best_size {
                        best_size = size;
                        best_level = level;
                    }
                }
                // sweep it back up through every position to the top
                while level > 0 {
                    current = self.swap_with_root(level - 1, current);
                    level -= 1;
                    let size = self.live_node_count(current);
                    if size < best_size {
                        best_size = size;
                        best_level = level;
                    }
                }
                // settle at whichever position was best (we're at 0 now)
                while level < best_level {
                    current = self.swap_with_root(level, current);
                    level += 1;
                }

                if best_level != start_level {
                    improved = true;
                }
            }

            if !improved {
                break;
            }
        }
        current
    }

    fn swap_with_root(&mut self, level: u32, root: Function) -> Function {
        let substitution = self.swap_adjacent(level);
        match substitution.get(&root.node) {
            Some(&replacement) => {
                if root.complement {
                    replacement.not()
                } else {
                    replacement
                }
            }
            None => root,
        }
    }

    /// Swap the variables at `level` and `level + 1`. Every node that sat
    /// at `level` is rebuilt one level lower using the classic four-
    /// cofactor reconstruction; every other live or dead node's children
    /// are then patched to point at the replacements. Failed/undone
    /// swaps (the caller settling back at a better position) simply
    /// leave the superseded nodes as unreferenced garbage: the unique
    /// table never reclaims them (spec §9's sifting-cleanup open
    /// question, resolved here as lazy/never reclamation rather than
    /// eager GC).
    fn swap_adjacent(&mut self, level: u32) -> FxHashMap<u32, Function> {
        let var_x = self.level_vars()[level as usize];
        let var_y = self.level_vars()[(level + 1) as usize];

        let old_nodes = self.nodes_with_var(var_x);
        let mut substitution: FxHashMap<u32, Function> = FxHashMap::default();
        for (old_id, high, low) in old_nodes {
            let f11 = self.cofactor(high, var_y, true);
            let f10 = self.cofactor(high, var_y, false);
            let f01 = self.cofactor(low, var_y, true);
            let f00 = self.cofactor(low, var_y, false);
            let new_high = self.reduce_public(var_x, f11, f01);
            let new_low = self.reduce_public(var_x, f10, f00);
            let replacement = self.reduce_public(var_y, new_high, new_low);
            substitution.insert(old_id, replacement);
        }

        self.rewrite_children(|child| {
            if child.is_terminal() {
                return None;
            }
            substitution.get(&child.node).map(|&r| {
                if child.complement {
                    r.not()
                } else {
                    r
                }
            })
        });

        let mut level_var = self.level_vars().to_vec();
        level_var.swap(level as usize, (level + 1) as usize);
        let mut order = FxHashMap::default();
        for (lvl, &v) in level_var.iter().enumerate() {
            order.insert(v, lvl as u32);
        }
        self.set_level_vars(level_var, order);

        substitution
    }
}
