//! The layered scheduler (spec §4.7 "Scheduling model"): the PDAG is
//! topologically layered leaves-first, each `(layer, connective)` group
//! becomes one kernel dispatch, and iterations run independently on the
//! worker pool — the single-process stand-in for the original's
//! dependency-ordered device queue (`LayerManager` in the pack's
//! `original_source`).

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use pra_model::Connective;
use pra_pdag::{Literal, Pdag, PdagGate, Vertex, TRUE_INDEX};

use crate::device::{DeviceProfile, SampleShape, SampleShaper};
use crate::error::{MonteCarloError, Result};
use crate::kernel::{
    and_kernel, cardinality_kernel, iff_kernel, imply_kernel, nand_kernel, nor_kernel, not_kernel,
    or_kernel, xor_kernel,
};
use crate::prng::{CounterPrng, Philox4x32};
use crate::tally::Tally;

enum LayerItem {
    Variables(Vec<u32>),
    GateGroup(Connective, Vec<u32>),
}

struct Layer {
    items: Vec<LayerItem>,
}

fn child_index(lit: Literal) -> Option<u32> {
    let idx = lit.unsigned_abs();
    if idx > TRUE_INDEX {
        Some(idx)
    } else {
        None
    }
}

/// Every non-terminal vertex's depth: `0` for a variable, `1 +
/// max(child depth)` for a gate.
fn depths(pdag: &Pdag) -> FxHashMap<u32, u32> {
    let mut depth = FxHashMap::default();
    for idx in pdag.children_first_order() {
        let d = match pdag.vertex(idx) {
            Some(Vertex::Variable(_)) => 0,
            Some(Vertex::Gate(g)) => g
                .args
                .iter()
                .filter_map(|&lit| child_index(lit))
                .map(|c| depth[&c])
                .max()
                .map(|m| m + 1)
                .unwrap_or(0),
            None => 0,
        };
        depth.insert(idx, d);
    }
    depth
}

fn build_layers(pdag: &Pdag) -> Vec<Layer> {
    let depth = depths(pdag);
    let max_depth = depth.values().copied().max().unwrap_or(0);

    let mut layers = Vec::with_capacity(max_depth as usize + 1);
    for level in 0..=max_depth {
        let mut variables = Vec::new();
        let mut gate_groups: FxHashMap<Connective, Vec<u32>> = FxHashMap::default();
        let mut connective_order = Vec::new();

        for (idx, vertex) in pdag.vertices() {
            if depth.get(&idx).copied().unwrap_or(0) != level {
                continue;
            }
            match vertex {
                Vertex::Variable(_) => variables.push(idx),
                Vertex::Gate(g) => {
                    let entry = gate_groups.entry(g.connective).or_insert_with(|| {
                        connective_order.push(g.connective);
                        Vec::new()
                    });
                    entry.push(idx);
                }
            }
        }

        let mut items = Vec::new();
        if !variables.is_empty() {
            items.push(LayerItem::Variables(variables));
        }
        for connective in connective_order {
            items.push(LayerItem::GateGroup(connective, gate_groups.remove(&connective).unwrap()));
        }
        layers.push(Layer { items });
    }
    layers
}

fn partition_inputs<'a>(
    args: &[Literal],
    buffers: &'a FxHashMap<u32, Vec<u64>>,
) -> (Vec<&'a [u64]>, usize) {
    let mut positive = Vec::new();
    let mut negative = Vec::new();
    for &lit in args {
        let idx = lit.unsigned_abs();
        let buf = buffers[&idx].as_slice();
        if lit > 0 {
            positive.push(buf);
        } else {
            negative.push(buf);
        }
    }
    let offset = positive.len();
    positive.extend(negative);
    (positive, offset)
}

fn resolve_literal(lit: Literal, buffers: &FxHashMap<u32, Vec<u64>>) -> Vec<u64> {
    let idx = lit.unsigned_abs();
    let buf = &buffers[&idx];
    if lit > 0 {
        buf.clone()
    } else {
        buf.iter().map(|&w| !w).collect()
    }
}

fn evaluate_gate(gate: &PdagGate, buffers: &FxHashMap<u32, Vec<u64>>, out: &mut [u64]) {
    match gate.connective {
        Connective::And => {
            let (inputs, offset) = partition_inputs(&gate.args, buffers);
            and_kernel(&inputs, offset, out);
        }
        Connective::Or => {
            let (inputs, offset) = partition_inputs(&gate.args, buffers);
            or_kernel(&inputs, offset, out);
        }
        Connective::Nand => {
            let (inputs, offset) = partition_inputs(&gate.args, buffers);
            nand_kernel(&inputs, offset, out);
        }
        Connective::Nor => {
            let (inputs, offset) = partition_inputs(&gate.args, buffers);
            nor_kernel(&inputs, offset, out);
        }
        Connective::Xor => {
            let (inputs, offset) = partition_inputs(&gate.args, buffers);
            xor_kernel(&inputs, offset, out);
        }
        Connective::Iff => {
            let (inputs, offset) = partition_inputs(&gate.args, buffers);
            iff_kernel(&inputs, offset, out);
        }
        Connective::Null => {
            out.copy_from_slice(&resolve_literal(gate.args[0], buffers));
        }
        Connective::Not => {
            unreachable!("the PDAG builder always inlines NOT as a literal sign")
        }
        Connective::Imply => {
            let antecedent = resolve_literal(gate.args[0], buffers);
            let consequent = resolve_literal(gate.args[1], buffers);
            imply_kernel(&antecedent, &consequent, out);
        }
        Connective::Atleast | Connective::Cardinality => {
            let (inputs, offset) = partition_inputs(&gate.args, buffers);
            let min = gate.min_number.unwrap_or(1);
            let max = gate.max_number.unwrap_or(gate.args.len() as u32);
            cardinality_kernel(&inputs, offset, min, max, out);
        }
    }
}

/// `(pdag_index+1, event_index+1, batch·stride+bitpack+1, iteration<<6)`
/// from spec §4.7's basic-event kernel. `pdag_index` is fixed at `0`
/// since this crate only ever samples one PDAG per run.
fn basic_event_counter(event_index: u32, batch: u64, stride: u64, bitpack: u64, iteration: u64) -> [u32; 4] {
    let lane = batch.wrapping_mul(stride).wrapping_add(bitpack).wrapping_add(1);
    [1, event_index.wrapping_add(1), lane as u32, (iteration << 6) as u32]
}

fn probability_threshold(p: f64) -> u64 {
    ((p.clamp(0.0, 1.0) * (1u64 << 32) as f64).floor() as u64).min(1u64 << 32)
}

fn run_iteration<P: CounterPrng>(
    pdag: &Pdag,
    layers: &[Layer],
    targets: &[Literal],
    shape: SampleShape,
    iteration: u64,
) -> FxHashMap<Literal, Tally> {
    let bitpacks = shape.num_bitpacks();
    let stride = shape.bitpacks_per_batch as u64;
    let mut buffers: FxHashMap<u32, Vec<u64>> = FxHashMap::default();

    for layer in layers {
        for item in &layer.items {
            match item {
                LayerItem::Variables(vars) => {
                    for &var_idx in vars {
                        let variable = pdag.variable(var_idx).expect("variable vertex");
                        let threshold = probability_threshold(variable.basic_event.p());
                        let mut buf = vec![0u64; bitpacks];
                        for batch in 0..shape.batch_size as u64 {
                            for bitpack in 0..shape.bitpacks_per_batch as u64 {
                                let counter =
                                    basic_event_counter(var_idx, batch, stride, bitpack, iteration);
                                let slot = (batch * shape.bitpacks_per_batch as u64 + bitpack) as usize;
                                buf[slot] = P::pack_bernoulli_draws(counter, threshold);
                            }
                        }
                        buffers.insert(var_idx, buf);
                    }
                }
                LayerItem::GateGroup(_, gates) => {
                    for &gate_idx in gates {
                        let gate = pdag.gate(gate_idx).expect("gate vertex");
                        let mut buf = vec![0u64; bitpacks];
                        evaluate_gate(gate, &buffers, &mut buf);
                        buffers.insert(gate_idx, buf);
                    }
                }
            }
        }
    }

    targets
        .iter()
        .map(|&lit| {
            let idx = lit.unsigned_abs();
            let mut tally = Tally::default();
            for &bitpack in &buffers[&idx] {
                // A negative target literal tallies the node's complement,
                // the same polarity convention `resolve_literal` applies
                // to gate arguments.
                let bits = if lit < 0 { !bitpack } else { bitpack };
                tally.record_bitpack(bits);
            }
            (lit, tally)
        })
        .collect()
}

/// Run the layered Monte Carlo core (spec §4.7) over `pdag`, tallying
/// every node in `targets`. `requested_num_trials == 0` is a
/// budget-only sizing run (spec's "unlimited" case): a large default
/// trial count is used to size the shape and the run itself.
pub fn simulate(
    pdag: &Pdag,
    targets: &[Literal],
    requested_num_trials: u64,
    profile: &DeviceProfile,
) -> Result<FxHashMap<Literal, Tally>> {
    for &t in targets {
        if pdag.vertex(t.unsigned_abs()).is_none() {
            return Err(MonteCarloError::UnknownTarget(t.unsigned_abs()));
        }
    }

    let layers = build_layers(pdag);
    let num_nodes = pdag.vertices().count().max(1);
    let shaper = SampleShaper::new(requested_num_trials, num_nodes, profile, 0.05);

    tracing::debug!(
        iterations = shaper.total_iterations,
        batch_size = shaper.shape.batch_size,
        bitpacks_per_batch = shaper.shape.bitpacks_per_batch,
        "monte carlo run starting"
    );

    let partials: Vec<FxHashMap<Literal, Tally>> = (0..shaper.total_iterations)
        .into_par_iter()
        .map(|iteration| run_iteration::<Philox4x32>(pdag, &layers, targets, shaper.shape, iteration))
        .collect();

    let mut totals: FxHashMap<Literal, Tally> = targets.iter().map(|&t| (t, Tally::default())).collect();
    for partial in partials {
        for (lit, tally) in partial {
            let entry = totals.get_mut(&lit).expect("target tally pre-seeded");
            entry.num_one_bits += tally.num_one_bits;
            entry.total_bits += tally.total_bits;
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pra_expr::Constant;
    use pra_model::{basic_arg, BasicEvent, Gate, Model};
    use std::rc::Rc;

    #[test]
    fn single_basic_event_tally_matches_its_probability() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.01)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        let top = Gate::new(
            "top",
            pra_model::Formula::new(Connective::Null, vec![basic_arg(&a, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        let pdag = pra_pdag::build(
            &model,
            &pra_pdag::PdagOptions {
                keep_null_gates: true,
                ..pra_pdag::PdagOptions::default()
            },
        )
        .unwrap();

        let root = pdag.root;
        let totals = simulate(&pdag, &[root], 1_000_000, &DeviceProfile::default()).unwrap();
        let stats = totals[&root].stats();
        assert!((stats.mean - 0.01).abs() < 0.01, "mean was {}", stats.mean);
    }

    #[test]
    fn or_gate_tally_is_close_to_the_exact_probability() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        let b = BasicEvent::new("b", Rc::new(Constant(0.2)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        model.add_basic_event(Rc::clone(&b)).unwrap();
        let top = Gate::new(
            "top",
            pra_model::Formula::new(Connective::Or, vec![basic_arg(&a, false), basic_arg(&b, false)])
                .unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        let pdag = pra_pdag::build(&model, &pra_pdag::PdagOptions::default()).unwrap();

        let root = pdag.root;
        let totals = simulate(&pdag, &[root], 2_000_000, &DeviceProfile::default()).unwrap();
        let stats = totals[&root].stats();
        assert!((stats.mean - 0.28).abs() < 0.01, "mean was {}", stats.mean);
    }

    #[test]
    fn negative_target_literal_tallies_the_complement() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.3)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        let top = Gate::new(
            "top",
            pra_model::Formula::new(Connective::Null, vec![basic_arg(&a, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        let pdag = pra_pdag::build(
            &model,
            &pra_pdag::PdagOptions {
                keep_null_gates: true,
                ..pra_pdag::PdagOptions::default()
            },
        )
        .unwrap();

        let root = pdag.root;
        let totals = simulate(&pdag, &[root, -root], 1_000_000, &DeviceProfile::default()).unwrap();
        let positive = totals[&root].stats().mean;
        let negative = totals[&-root].stats().mean;
        assert!((positive - 0.3).abs() < 0.01, "mean was {positive}");
        assert!((negative - 0.7).abs() < 0.01, "mean was {negative}");
    }

    #[test]
    fn unknown_target_is_an_error() {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.5)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        let top = Gate::new(
            "top",
            pra_model::Formula::new(Connective::Null, vec![basic_arg(&a, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        let pdag = pra_pdag::build(&model, &pra_pdag::PdagOptions::default()).unwrap();

        let result = simulate(&pdag, &[9999], 1000, &DeviceProfile::default());
        assert!(result.is_err());
    }
}
