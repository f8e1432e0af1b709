//! Bit-packed gate kernels (spec §4.7). Each operates on slices of `u64`
//! bit-packs, one gate evaluation per slice position, with no branching
//! that depends on bit position beyond the lane loop `ATLEAST-k` needs.

use pra_model::Connective;

/// Evaluate an AND/OR/NAND/NOR/XOR reduction over `inputs`, where entries
/// at or above `negated_inputs_offset` are complemented before folding in
/// (the PDAG's own per-argument literal sign), writing into `out`.
fn reduce(connective: Connective, inputs: &[&[u64]], negated_inputs_offset: usize, out: &mut [u64]) {
    let init = match connective {
        Connective::And | Connective::Nand => u64::MAX,
        _ => 0u64,
    };
    for (i, slot) in out.iter_mut().enumerate() {
        let mut acc = init;
        for (idx, input) in inputs.iter().enumerate() {
            let mut bits = input[i];
            if idx >= negated_inputs_offset {
                bits = !bits;
            }
            acc = match connective {
                Connective::And | Connective::Nand => acc & bits,
                Connective::Or | Connective::Nor => acc | bits,
                Connective::Xor => acc ^ bits,
                _ => unreachable!("reduce() only handles AND/OR/NAND/NOR/XOR"),
            };
        }
        *slot = match connective {
            Connective::Nand | Connective::Nor => !acc,
            _ => acc,
        };
    }
}

/// `AND`: all-ones init, bitwise-AND fold.
pub fn and_kernel(inputs: &[&[u64]], negated_inputs_offset: usize, out: &mut [u64]) {
    reduce(Connective::And, inputs, negated_inputs_offset, out);
}

/// `NAND`: AND reduction, then bitwise complement.
pub fn nand_kernel(inputs: &[&[u64]], negated_inputs_offset: usize, out: &mut [u64]) {
    reduce(Connective::Nand, inputs, negated_inputs_offset, out);
}

/// `OR`: zero init, bitwise-OR fold.
pub fn or_kernel(inputs: &[&[u64]], negated_inputs_offset: usize, out: &mut [u64]) {
    reduce(Connective::Or, inputs, negated_inputs_offset, out);
}

/// `NOR`: OR reduction, then bitwise complement.
pub fn nor_kernel(inputs: &[&[u64]], negated_inputs_offset: usize, out: &mut [u64]) {
    reduce(Connective::Nor, inputs, negated_inputs_offset, out);
}

/// `XOR`: zero init, bitwise-XOR fold (associative, so this generalises
/// cleanly to more than two inputs as bit-parity).
pub fn xor_kernel(inputs: &[&[u64]], negated_inputs_offset: usize, out: &mut [u64]) {
    reduce(Connective::Xor, inputs, negated_inputs_offset, out);
}

/// `NOT`: bitwise complement of the single input.
pub fn not_kernel(input: &[u64], out: &mut [u64]) {
    for (o, &i) in out.iter_mut().zip(input.iter()) {
        *o = !i;
    }
}

/// `IFF`: bitwise complement of the XOR reduction.
pub fn iff_kernel(inputs: &[&[u64]], negated_inputs_offset: usize, out: &mut [u64]) {
    xor_kernel(inputs, negated_inputs_offset, out);
    for slot in out.iter_mut() {
        *slot = !*slot;
    }
}

/// `IMPLY(a, b) = ¬a ∨ b`, with `a`'s own literal sign already folded into
/// whether it sits in the complemented half of `inputs` via
/// `negated_inputs_offset`; the antecedent's *extra* implication negation
/// is applied by the caller passing `a` as the sole complemented input.
pub fn imply_kernel(antecedent: &[u64], consequent: &[u64], out: &mut [u64]) {
    for ((o, &a), &c) in out.iter_mut().zip(antecedent.iter()).zip(consequent.iter()) {
        *o = !a | c;
    }
}

/// `ATLEAST-k` / `CARDINALITY-[min,max]`: one lane per bit of the
/// bit-pack. Each lane sums the indicator `(input[index] ^ negate) has
/// its bit set` over all inputs and writes `1` iff the count is in
/// `[min, max]` (an unbounded `max` is `usize::MAX`).
pub fn cardinality_kernel(
    inputs: &[&[u64]],
    negated_inputs_offset: usize,
    min: u32,
    max: u32,
    out: &mut [u64],
) {
    for (i, slot) in out.iter_mut().enumerate() {
        let mut result = 0u64;
        for lane in 0..64u32 {
            let mut count = 0u32;
            for (idx, input) in inputs.iter().enumerate() {
                let mut bit = (input[i] >> lane) & 1;
                if idx >= negated_inputs_offset {
                    bit ^= 1;
                }
                count += bit as u32;
            }
            if count >= min && count <= max {
                result |= 1u64 << lane;
            }
        }
        *slot = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_kernel_of_two_all_one_inputs_is_all_one() {
        let a = vec![u64::MAX; 2];
        let b = vec![u64::MAX; 2];
        let mut out = vec![0u64; 2];
        and_kernel(&[&a, &b], 2, &mut out);
        assert_eq!(out, vec![u64::MAX, u64::MAX]);
    }

    #[test]
    fn and_kernel_negates_inputs_at_or_above_the_offset() {
        let a = vec![u64::MAX];
        let b = vec![u64::MAX];
        let mut out = vec![0u64];
        // b is complemented (offset=1 means only `a` is used as-is).
        and_kernel(&[&a, &b], 1, &mut out);
        assert_eq!(out, vec![0u64]);
    }

    #[test]
    fn or_kernel_of_all_zero_inputs_is_zero() {
        let a = vec![0u64];
        let b = vec![0u64];
        let mut out = vec![1u64];
        or_kernel(&[&a, &b], 2, &mut out);
        assert_eq!(out, vec![0u64]);
    }

    #[test]
    fn nand_is_the_complement_of_and() {
        let a = vec![0b1010u64];
        let b = vec![0b1100u64];
        let mut and_out = vec![0u64];
        let mut nand_out = vec![0u64];
        and_kernel(&[&a, &b], 2, &mut and_out);
        nand_kernel(&[&a, &b], 2, &mut nand_out);
        assert_eq!(nand_out[0], !and_out[0]);
    }

    #[test]
    fn cardinality_two_of_three_matches_scalar_truth_table() {
        let a = vec![0b001u64];
        let b = vec![0b011u64];
        let c = vec![0b111u64];
        let mut out = vec![0u64];
        cardinality_kernel(&[&a, &b, &c], 3, 2, u32::MAX, &mut out);
        // lane0: a=1,b=1,c=1 -> 3 >= 2 -> set
        // lane1: a=0,b=1,c=1 -> 2 >= 2 -> set
        // lane2: a=0,b=0,c=1 -> 1 < 2 -> unset
        assert_eq!(out[0] & 0b111, 0b011);
    }

    #[test]
    fn imply_kernel_is_false_only_when_antecedent_true_and_consequent_false() {
        let antecedent = vec![0b1u64];
        let consequent = vec![0b0u64];
        let mut out = vec![0u64];
        imply_kernel(&antecedent, &consequent, &mut out);
        assert_eq!(out[0] & 1, 0);
    }
}
