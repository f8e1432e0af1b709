//! Sample-shape selection (spec §4.7's "Sample-shape selection"
//! subsection), grounded on `original_source`'s `mc::queue::sample_shaper`
//! — reimplemented over a synthetic [`DeviceProfile`] standing in for a
//! queried SYCL device, since this crate's "device" is a `rayon` worker
//! pool rather than real accelerator hardware (spec §1 / SPEC_FULL §4
//! supplement).

use crate::prng::BITPACK_WIDTH;

/// GPU vendors whose allocator rewards one large allocation over many
/// small ones get the "greedy" shape-selection branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceVendor {
    Generic,
    NvidiaLike,
}

/// Stand-in for the device properties a real SYCL/CUDA query would
/// return.
#[derive(Debug, Clone, Copy)]
pub struct DeviceProfile {
    pub vendor: DeviceVendor,
    pub max_device_bytes: usize,
    pub max_work_item_y: usize,
    pub max_work_item_z: usize,
    pub cache_line_bytes: usize,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        DeviceProfile {
            vendor: DeviceVendor::Generic,
            max_device_bytes: 256 * 1024 * 1024,
            max_work_item_y: 1024,
            max_work_item_z: 1024,
            cache_line_bytes: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleShape {
    pub batch_size: usize,
    pub bitpacks_per_batch: usize,
}

impl SampleShape {
    pub fn num_bitpacks(&self) -> usize {
        self.batch_size * self.bitpacks_per_batch
    }
}

/// The per-iteration memory budget tracker the shaper consults:
/// `bitpacks_per_batch * batch_size * num_nodes * size_of::<u64>()`
/// against `max_device_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct WorkingSet {
    pub num_nodes: usize,
    pub shape: SampleShape,
}

impl WorkingSet {
    pub fn bytes(&self) -> usize {
        self.shape.num_bitpacks() * self.num_nodes * std::mem::size_of::<u64>()
    }

    pub fn fits(&self, max_device_bytes: usize) -> bool {
        self.bytes() <= max_device_bytes
    }
}

const DEFAULT_SIZING_TRIALS: u64 = 64 * 1024 * 1024;

/// Resolves a requested trial count and device profile into a concrete
/// `(batch_size, bitpacks_per_batch)` and iteration count.
#[derive(Debug, Clone, Copy)]
pub struct SampleShaper {
    pub total_bits_to_sample: u64,
    pub shape: SampleShape,
    pub bits_per_iteration: u64,
    pub total_iterations: u64,
}

impl SampleShaper {
    /// `requested_num_trials == 0` means "budget-only sizing": the shape
    /// is still picked against a large default trial count so the caller
    /// gets a concrete, bounded run rather than an unbounded one.
    pub fn new(
        requested_num_trials: u64,
        num_nodes: usize,
        profile: &DeviceProfile,
        overhead_ratio: f64,
    ) -> Self {
        let sizing_trials = if requested_num_trials == 0 {
            DEFAULT_SIZING_TRIALS
        } else {
            requested_num_trials
        };

        let w = BITPACK_WIDTH as u64;
        let remainder = sizing_trials % w;
        let total_bits_to_sample = if remainder == 0 {
            sizing_trials
        } else if remainder <= w / 2 {
            sizing_trials - remainder
        } else {
            sizing_trials + (w - remainder)
        };

        let max_device_bits = profile.max_device_bytes as u64 * 8;
        let target_bits_per_iteration = max_device_bits / (num_nodes.max(1) as u64);
        let per_iteration_target_bits = total_bits_to_sample.min(target_bits_per_iteration);

        let mut shape = closest_pow2_shape(per_iteration_target_bits / w, profile);
        if shape.bitpacks_per_batch > 0 {
            shape.bitpacks_per_batch *= shape.batch_size;
            shape.batch_size = 1;
        }

        if profile.vendor == DeviceVendor::NvidiaLike && shape.bitpacks_per_batch > 0 {
            let max_device_bitpacks =
                profile.max_device_bytes as f64 / std::mem::size_of::<u64>() as f64;
            let effective_nodes = (num_nodes.max(1) as f64) * (1.0 + overhead_ratio.clamp(0.0, 1e6));
            let bitpacks = (max_device_bitpacks / effective_nodes).floor() as usize;
            let cache_line_bitpacks = (profile.cache_line_bytes / std::mem::size_of::<u64>()).max(1);
            shape.bitpacks_per_batch = bitpacks - (bitpacks % cache_line_bitpacks);
            shape.batch_size = 1;
        }

        let bits_per_iteration = shape.num_bitpacks() as u64 * w;
        let total_iterations = if bits_per_iteration == 0 {
            0
        } else {
            (total_bits_to_sample + bits_per_iteration - 1) / bits_per_iteration
        };

        tracing::debug!(
            batch_size = shape.batch_size,
            bitpacks_per_batch = shape.bitpacks_per_batch,
            total_iterations,
            total_bits_to_sample,
            "sample shape selected"
        );

        SampleShaper {
            total_bits_to_sample,
            shape,
            bits_per_iteration,
            total_iterations,
        }
    }
}

fn highest_pow2_le(v: u64) -> u64 {
    if v == 0 {
        return 0;
    }
    let mut p = 1u64;
    while (p << 1) <= v {
        p <<= 1;
    }
    p
}

/// Enumerate power-of-two `batch_size` candidates up to the device's
/// Y-dimension limit, pairing each with the largest power-of-two
/// `bitpacks_per_batch` (bounded by the Z-dimension limit) that keeps the
/// product within `bitpack_budget`, and keep whichever candidate yields
/// the largest product.
fn closest_pow2_shape(bitpack_budget: u64, profile: &DeviceProfile) -> SampleShape {
    if bitpack_budget == 0 {
        return SampleShape {
            batch_size: 1,
            bitpacks_per_batch: 0,
        };
    }
    let limit_y = highest_pow2_le(profile.max_work_item_y as u64).max(1);
    let limit_z = highest_pow2_le(profile.max_work_item_z as u64).max(1);

    let mut best = SampleShape {
        batch_size: 1,
        bitpacks_per_batch: 1,
    };
    let mut best_product = 1u64;
    let mut batch_size = 1u64;
    while batch_size <= limit_y && batch_size <= bitpack_budget {
        let remaining = bitpack_budget / batch_size;
        let bitpacks_per_batch = highest_pow2_le(remaining.min(limit_z));
        let product = batch_size * bitpacks_per_batch;
        if product > best_product && product <= bitpack_budget {
            best_product = product;
            best = SampleShape {
                batch_size: batch_size as usize,
                bitpacks_per_batch: bitpacks_per_batch as usize,
            };
        }
        batch_size <<= 1;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_trials_round_to_the_nearest_bitpack_width() {
        let shaper = SampleShaper::new(100, 1, &DeviceProfile::default(), 0.0);
        assert_eq!(shaper.total_bits_to_sample % BITPACK_WIDTH as u64, 0);
    }

    #[test]
    fn zero_trials_is_treated_as_a_budget_only_sizing() {
        let shaper = SampleShaper::new(0, 1, &DeviceProfile::default(), 0.0);
        assert!(shaper.total_bits_to_sample > 0);
        assert!(shaper.total_iterations > 0);
    }

    #[test]
    fn more_nodes_shrinks_the_per_iteration_budget() {
        let few = SampleShaper::new(1_000_000, 2, &DeviceProfile::default(), 0.0);
        let many = SampleShaper::new(1_000_000, 2000, &DeviceProfile::default(), 0.0);
        assert!(many.shape.num_bitpacks() <= few.shape.num_bitpacks());
    }

    #[test]
    fn working_set_bytes_matches_shape_and_node_count() {
        let ws = WorkingSet {
            num_nodes: 4,
            shape: SampleShape {
                batch_size: 2,
                bitpacks_per_batch: 8,
            },
        };
        assert_eq!(ws.bytes(), 2 * 8 * 4 * 8);
        assert!(ws.fits(1024));
        assert!(!ws.fits(10));
    }
}
