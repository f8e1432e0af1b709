//! Layered, bit-packed Monte Carlo sampling over a PDAG (spec §4.7).
//!
//! Basic events are drawn with a counter-based PRNG ([`prng::Philox4x32`]
//! by default) so a run is reproducible from `(node, batch, bitpack,
//! iteration)` alone, gates fold their children with the bit-packed
//! kernels in [`kernel`], and results are tallied into Wilson-ish
//! confidence intervals in [`tally`]. [`device::SampleShaper`] picks a
//! concrete batch/bitpack shape for a requested trial count the way the
//! original engine sizes a SYCL work-group, standing in for the real
//! device query with a synthetic [`device::DeviceProfile`].

mod device;
mod error;
mod kernel;
mod prng;
mod schedule;
mod tally;

pub use device::{DeviceProfile, DeviceVendor, SampleShape, SampleShaper, WorkingSet};
pub use error::{MonteCarloError, Result};
pub use prng::{CounterPrng, Philox4x32, Sfc64, WyRand, BITPACK_WIDTH};
pub use schedule::simulate;
pub use tally::{Tally, TallyStats};
