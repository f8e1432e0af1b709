//! The host-facing option table (spec §6.1), validated up front so every
//! "Input error" (spec §7) aborts synchronously, before [`crate::QuantifyModel`]
//! touches the model.

use pra_quantify::Approximation;

use crate::error::{Error, Result};

/// Qualitative engine selection. `Mocus` is accepted for interface parity
/// with the option table but has no implementation in this engine (no
/// MOCUS back end was built — only the BDD/ZBDD pair); selecting it is an
/// input error, not a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Bdd,
    Zbdd,
    Mocus,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Bdd
    }
}

/// Mirrors [`pra_quantify::Approximation`] with the option table's own
/// names, so `Settings` doesn't leak the quantifier crate's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproximationKind {
    None,
    RareEvent,
    Mcub,
}

impl Default for ApproximationKind {
    fn default() -> Self {
        ApproximationKind::None
    }
}

impl From<ApproximationKind> for Approximation {
    fn from(kind: ApproximationKind) -> Self {
        match kind {
            ApproximationKind::None => Approximation::None,
            ApproximationKind::RareEvent => Approximation::RareEvent,
            ApproximationKind::Mcub => Approximation::MCUB,
        }
    }
}

/// One run's complete option table (spec §6.1).
#[derive(Debug, Clone)]
pub struct Settings {
    pub algorithm: Algorithm,
    pub approximation: ApproximationKind,
    pub prime_implicants: bool,

    pub probability: bool,
    pub importance: bool,
    pub uncertainty: bool,
    pub ccf: bool,
    pub sil: bool,

    pub limit_order: Option<usize>,
    pub cut_off: f64,
    pub mission_time: f64,
    pub time_step: Option<f64>,

    pub num_trials: u64,
    pub num_quantiles: u32,
    pub num_bins: u32,
    pub seed: u64,

    pub adaptive: bool,
    pub bit_pack_cut_sets: bool,
    pub skip_products: bool,

    pub keep_null_gates: bool,
    pub expand_atleast_gates: bool,
    pub expand_xor_gates: bool,
    pub compilation_level: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            algorithm: Algorithm::default(),
            approximation: ApproximationKind::default(),
            prime_implicants: false,
            probability: true,
            importance: false,
            uncertainty: false,
            ccf: false,
            sil: false,
            limit_order: None,
            cut_off: 0.0,
            mission_time: 0.0,
            time_step: None,
            num_trials: 10_000,
            num_quantiles: 20,
            num_bins: 20,
            seed: 1,
            adaptive: false,
            bit_pack_cut_sets: false,
            skip_products: false,
            keep_null_gates: false,
            expand_atleast_gates: false,
            expand_xor_gates: false,
            compilation_level: 4,
        }
    }
}

impl Settings {
    /// All mutually-exclusive-option and numeric-range checks spec §7
    /// files under "Input errors": caught here so the call aborts before
    /// any PDAG construction or compilation begins.
    pub fn validate(&self) -> Result<()> {
        if self.algorithm == Algorithm::Mocus {
            return Err(Error::Input(
                "algorithm=mocus has no back end in this engine".to_string(),
            ));
        }
        if self.prime_implicants {
            if self.algorithm != Algorithm::Bdd {
                return Err(Error::Input(
                    "prime_implicants is only valid with algorithm=bdd".to_string(),
                ));
            }
            if self.approximation != ApproximationKind::None {
                return Err(Error::Input(
                    "prime_implicants forbids approximations".to_string(),
                ));
            }
        }
        if self.sil && self.time_step.is_none() {
            return Err(Error::Input(
                "safety_integrity_levels requires time_step".to_string(),
            ));
        }
        if self.mission_time < 0.0 {
            return Err(Error::Input("mission_time must be non-negative".to_string()));
        }
        if let Some(step) = self.time_step {
            if step <= 0.0 {
                return Err(Error::Input("time_step must be positive".to_string()));
            }
        }
        if let Some(limit) = self.limit_order {
            if limit == 0 {
                return Err(Error::Input("limit_order must be positive".to_string()));
            }
        }
        if self.cut_off < 0.0 || self.cut_off >= 1.0 {
            return Err(Error::Input("cut_off must be in [0, 1)".to_string()));
        }
        if self.compilation_level > 8 {
            return Err(Error::Input("compilation_level must be in [0, 8]".to_string()));
        }
        if self.uncertainty && self.num_trials == 0 {
            return Err(Error::Input(
                "uncertainty requires num_trials > 0".to_string(),
            ));
        }
        if self.adaptive && self.algorithm != Algorithm::Bdd {
            return Err(Error::Input(
                "adaptive mode requires algorithm=bdd (it needs the BDD oracle)".to_string(),
            ));
        }
        Ok(())
    }
}
