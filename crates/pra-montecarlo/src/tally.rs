//! Running Bernoulli tallies and their derived confidence intervals
//! (spec §4.7's "Tally kernel").

const Z_95: f64 = 1.959_964;
const Z_99: f64 = 2.575_829;

/// Accumulated one-bit counts for a single tallied node.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tally {
    pub num_one_bits: u64,
    pub total_bits: u64,
}

/// The derived statistics computed once collection is complete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TallyStats {
    pub mean: f64,
    pub std_err: f64,
    pub ci_95: (f64, f64),
    pub ci_99: (f64, f64),
}

impl Tally {
    pub fn record_bitpack(&mut self, bits: u64) {
        self.num_one_bits += bits.count_ones() as u64;
        self.total_bits += 64;
    }

    pub fn stats(&self) -> TallyStats {
        if self.total_bits == 0 {
            return TallyStats {
                mean: 0.0,
                std_err: 0.0,
                ci_95: (0.0, 0.0),
                ci_99: (0.0, 0.0),
            };
        }
        let mean = self.num_one_bits as f64 / self.total_bits as f64;
        let std_err = (mean * (1.0 - mean) / self.total_bits as f64).sqrt();
        let clamp = |v: f64| v.clamp(0.0, 1.0);
        TallyStats {
            mean,
            std_err,
            ci_95: (clamp(mean - Z_95 * std_err), clamp(mean + Z_95 * std_err)),
            ci_99: (clamp(mean - Z_99 * std_err), clamp(mean + Z_99 * std_err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tally_reports_zero_stats() {
        let tally = Tally::default();
        let stats = tally.stats();
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.std_err, 0.0);
    }

    #[test]
    fn all_ones_tally_has_mean_one_and_zero_spread() {
        let mut tally = Tally::default();
        for _ in 0..10 {
            tally.record_bitpack(u64::MAX);
        }
        let stats = tally.stats();
        assert_eq!(stats.mean, 1.0);
        assert_eq!(stats.std_err, 0.0);
        assert_eq!(stats.ci_95, (1.0, 1.0));
    }

    #[test]
    fn confidence_intervals_widen_with_fewer_bits() {
        let mut small = Tally::default();
        small.record_bitpack(0b101010);
        let mut large = Tally::default();
        for _ in 0..1000 {
            large.record_bitpack(0b101010);
        }
        let small_width = small.stats().ci_95.1 - small.stats().ci_95.0;
        let large_width = large.stats().ci_95.1 - large.stats().ci_95.0;
        assert!(small_width > large_width);
    }
}
