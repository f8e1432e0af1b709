use pra_bdd::{BddManager, Function};
use pra_expr::MissionTime;
use pra_pdag::{Literal, Pdag};

use crate::filter::product_probability;

/// Which estimator the probability analyser (and the adaptive filter's
/// stopping scan) dispatches through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approximation {
    /// Exact BDD evaluation (spec §4.2).
    None,
    /// `min(1, Σ Pr(product))`; needs the product list.
    RareEvent,
    /// `1 − Π (1 − Pr(product))`; needs the product list.
    MCUB,
}

/// Clamp to `[0, 1]`, logging when clamping actually changed the value
/// (spec §7's numeric-warning category).
fn clamp(raw: f64) -> f64 {
    let clamped = raw.clamp(0.0, 1.0);
    if clamped != raw {
        tracing::warn!(raw, clamped, "probability clamped to [0, 1]");
    }
    clamped
}

/// Dispatch the probability analyser (spec §4.5). `RareEvent`/`MCUB` need
/// `products`; panics if they're requested without one, since that is a
/// caller programming error, not a runtime condition.
pub fn analyse(
    approximation: Approximation,
    bdd: &mut BddManager,
    root: Function,
    pdag: &Pdag,
    products: Option<&[Vec<Literal>]>,
) -> f64 {
    let raw = match approximation {
        Approximation::None => bdd.probability(root, pdag),
        Approximation::RareEvent => {
            let products = products.expect("RareEvent approximation requires a product list");
            products
                .iter()
                .map(|p| product_probability(pdag, p))
                .sum::<f64>()
                .min(1.0)
        }
        Approximation::MCUB => {
            let products = products.expect("MCUB approximation requires a product list");
            1.0 - products
                .iter()
                .map(|p| 1.0 - product_probability(pdag, p))
                .product::<f64>()
        }
    };
    clamp(raw)
}

/// IEC 61508-style PFD_avg bands, low-demand convention, widest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilBand {
    Sil4,
    Sil3,
    Sil2,
    Sil1,
    OutOfRange,
}

const SIL_BANDS: &[(SilBand, f64, f64)] = &[
    (SilBand::Sil4, 1e-5, 1e-4),
    (SilBand::Sil3, 1e-4, 1e-3),
    (SilBand::Sil2, 1e-3, 1e-2),
    (SilBand::Sil1, 1e-2, 1e-1),
];

fn band_of(value: f64) -> SilBand {
    for &(band, lo, hi) in SIL_BANDS {
        if value >= lo && value < hi {
            return band;
        }
    }
    SilBand::OutOfRange
}

/// The swept `p(t)` curve plus its derived averages and SIL histogram
/// (spec §4.5's time-curve subsection).
#[derive(Debug, Clone)]
pub struct TimeCurve {
    pub times: Vec<f64>,
    pub pfd: Vec<f64>,
    pub pfh: Vec<f64>,
    pub pfd_avg: f64,
    pub pfh_avg: f64,
    /// Fraction of the swept `[0, T]` range during which `p(t)` fell in
    /// each SIL band, in `SIL_BANDS` order plus `OutOfRange` last.
    pub sil_histogram: Vec<(SilBand, f64)>,
}

fn trapezoidal_mean(times: &[f64], values: &[f64]) -> f64 {
    if times.len() < 2 {
        return values.first().copied().unwrap_or(0.0);
    }
    let span = times[times.len() - 1] - times[0];
    if span <= 0.0 {
        return values[0];
    }
    let mut integral = 0.0;
    for w in times.windows(2).zip(values.windows(2)) {
        let (t, v) = w;
        integral += (t[1] - t[0]) * (v[0] + v[1]) / 2.0;
    }
    integral / span
}

/// Sweep mission time from `0` to `mission_time_limit` in steps of
/// `time_step`, re-evaluating every basic event's expression (cheap: the
/// expression graph is memoised only by parameter identity) and
/// recomputing the probability at each point via `analyse`.
pub fn time_curve(
    mission_time: &MissionTime,
    mission_time_limit: f64,
    time_step: f64,
    approximation: Approximation,
    bdd: &mut BddManager,
    root: Function,
    pdag: &Pdag,
    products: Option<&[Vec<Literal>]>,
) -> TimeCurve {
    let original_time = mission_time.get();
    let mut times = Vec::new();
    let mut pfd = Vec::new();

    let mut t = 0.0_f64;
    loop {
        mission_time.set(t);
        times.push(t);
        pfd.push(analyse(approximation, bdd, root, pdag, products));
        if t >= mission_time_limit {
            break;
        }
        t = (t + time_step).min(mission_time_limit);
    }
    mission_time.set(original_time);

    let pfh: Vec<f64> = times
        .iter()
        .zip(pfd.iter())
        .map(|(&t, &p)| if t == 0.0 { 0.0 } else { p / t })
        .collect();

    let pfd_avg = trapezoidal_mean(&times, &pfd);
    let pfh_avg = trapezoidal_mean(&times, &pfh);

    let total_span = times.last().copied().unwrap_or(0.0) - times.first().copied().unwrap_or(0.0);
    let mut bucket_widths = vec![0.0_f64; SIL_BANDS.len() + 1];
    if times.len() >= 2 && total_span > 0.0 {
        for w in times.windows(2).zip(pfd.windows(2)) {
            let (t, v) = w;
            let width = t[1] - t[0];
            let band = band_of(v[0]);
            bucket_widths[band_index(band)] += width;
        }
    }
    let sil_histogram: Vec<(SilBand, f64)> = SIL_BANDS
        .iter()
        .map(|&(band, _, _)| band)
        .chain(std::iter::once(SilBand::OutOfRange))
        .zip(bucket_widths.into_iter())
        .map(|(band, width)| {
            (
                band,
                if total_span > 0.0 {
                    width / total_span
                } else {
                    0.0
                },
            )
        })
        .collect();

    TimeCurve {
        times,
        pfd,
        pfh,
        pfd_avg,
        pfh_avg,
        sil_histogram,
    }
}

fn band_index(band: SilBand) -> usize {
    match band {
        SilBand::Sil4 => 0,
        SilBand::Sil3 => 1,
        SilBand::Sil2 => 2,
        SilBand::Sil1 => 3,
        SilBand::OutOfRange => 4,
    }
}
