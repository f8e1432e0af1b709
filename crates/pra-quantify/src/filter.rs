use pra_pdag::{Literal, Pdag};

use crate::Approximation;

/// Filter knobs for the adaptive quantifier (spec §4.4).
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    /// Drop any product whose literal count exceeds this. `None` disables
    /// the check.
    pub limit_order: Option<usize>,
    /// Static probability cut-off; a product at or below it is dropped.
    pub cut_off: f64,
    /// Enable the adaptive scan (step 3).
    pub adaptive: bool,
    /// Target cumulative probability the adaptive scan stops at.
    pub adaptive_target: Option<f64>,
    /// Estimator the adaptive scan accumulates with.
    pub approximation: Approximation,
    /// Whether a product's probability is computed and used for
    /// cut-off/adaptive decisions at all (`false` only counts/collects).
    pub exact_quantification: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            limit_order: None,
            cut_off: 0.0,
            adaptive: false,
            adaptive_target: None,
            approximation: Approximation::None,
            exact_quantification: true,
        }
    }
}

impl FilterOptions {
    /// No limit, no cut-off, no adaptive scan — one pass just to count and
    /// collect the event set (step 1).
    pub fn is_inactive(&self) -> bool {
        self.limit_order.is_none() && self.cut_off <= 0.0 && !self.adaptive
    }
}

/// Everything the quantifier reports about one product enumeration pass.
#[derive(Debug, Clone, Default)]
pub struct ProductSummary {
    pub product_count: usize,
    pub original_product_count: usize,
    pub pruned_products: usize,
    /// `distribution[k]` = number of retained products of order `k + 1`.
    pub distribution: Vec<usize>,
    /// Sorted, deduplicated indices of basic events appearing positively
    /// in any retained product.
    pub event_indices: Vec<u32>,
    pub cut_off_applied: bool,
    pub applied_cut_off: f64,
}

/// `Pr(product) = (Π p(x) over positive literals) · (Π (1 − p(y)) over
/// negative literals) · initiating_event_frequency`.
pub fn product_probability(pdag: &Pdag, product: &[Literal]) -> f64 {
    let mut p = pdag.initiating_event_frequency;
    for &lit in product {
        let idx = lit.unsigned_abs();
        let Some(var) = pdag.variable(idx) else {
            continue;
        };
        p *= if lit > 0 {
            var.basic_event.p()
        } else {
            1.0 - var.basic_event.p()
        };
    }
    p
}

/// The geometric/log-mean numeric floor guarding the cut-off comparison:
/// `exp((ln p + ln eps) / 2) = sqrt(p * eps)`. Chosen over the harmonic
/// or arithmetic mean because it scales with both operands rather than
/// being dominated by whichever is smaller.
fn numeric_floor(probability: f64, eps: f64) -> f64 {
    if probability <= 0.0 {
        return 0.0;
    }
    (probability * eps).sqrt()
}

/// Run the product filter over every product the ZBDD enumerates.
///
/// `products` is the raw, unfiltered enumeration (e.g.
/// [`pra_zbdd::ZbddManager::products`]); `consumer` is invoked with the
/// retained, possibly-reordered product list only when filtering actually
/// changed the set (spec §4.4 step 3's "only invoked when filtering
/// altered the set").
pub fn filter_products(
    pdag: &Pdag,
    products: Vec<Vec<Literal>>,
    options: &FilterOptions,
    mut consumer: impl FnMut(&[Vec<Literal>]),
) -> ProductSummary {
    let original_product_count = products.len();

    if options.is_inactive() {
        let event_indices = collect_event_indices(&products);
        let distribution = order_distribution(&products);
        return ProductSummary {
            product_count: original_product_count,
            original_product_count,
            pruned_products: 0,
            distribution,
            event_indices,
            cut_off_applied: false,
            applied_cut_off: 0.0,
        };
    }

    let eps = f64::EPSILON;
    let mut scored: Vec<(Vec<Literal>, f64)> = products
        .into_iter()
        .filter(|product| {
            options
                .limit_order
                .map_or(true, |limit| product.len() <= limit)
        })
        .map(|product| {
            let probability = if options.exact_quantification {
                product_probability(pdag, &product)
            } else {
                f64::NAN
            };
            (product, probability)
        })
        .filter(|(_, probability)| {
            if !options.exact_quantification {
                return true;
            }
            let floor = options.cut_off.max(numeric_floor(*probability, eps));
            *probability > floor
        })
        .collect();

    let mut cut_off_applied = false;
    let mut applied_cut_off = options.cut_off;

    if options.adaptive {
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        if let Some(target) = options.adaptive_target {
            let tolerance = target * 1e-6 + f64::EPSILON;
            let mut estimator = 0.0_f64;
            let mut complement_product = 1.0_f64;
            let mut stop_at = scored.len();
            for (i, (_, p)) in scored.iter().enumerate() {
                estimator = match options.approximation {
                    Approximation::RareEvent => estimator + p,
                    _ => {
                        complement_product *= 1.0 - p;
                        1.0 - complement_product
                    }
                };
                if estimator + tolerance >= target {
                    stop_at = i + 1;
                    break;
                }
            }
            if stop_at < scored.len() {
                applied_cut_off = scored[stop_at - 1].1;
                scored.truncate(stop_at);
                cut_off_applied = true;
            }
        }
    }

    let retained: Vec<Vec<Literal>> = scored.into_iter().map(|(product, _)| product).collect();
    let pruned_products = original_product_count - retained.len();
    let product_count = retained.len();
    let distribution = order_distribution(&retained);
    let event_indices = collect_event_indices(&retained);

    let altered = pruned_products > 0 || cut_off_applied;
    if altered {
        consumer(&retained);
    }

    ProductSummary {
        product_count,
        original_product_count,
        pruned_products,
        distribution,
        event_indices,
        cut_off_applied: cut_off_applied || options.cut_off > 0.0,
        applied_cut_off,
    }
}

fn order_distribution(products: &[Vec<Literal>]) -> Vec<usize> {
    let mut distribution = Vec::new();
    for product in products {
        let order = product.len();
        if order == 0 {
            continue;
        }
        if distribution.len() < order {
            distribution.resize(order, 0);
        }
        distribution[order - 1] += 1;
    }
    distribution
}

fn collect_event_indices(products: &[Vec<Literal>]) -> Vec<u32> {
    let mut indices: Vec<u32> = products
        .iter()
        .flatten()
        .filter(|&&lit| lit > 0)
        .map(|&lit| lit.unsigned_abs())
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use pra_expr::Constant;
    use pra_model::{basic_arg, BasicEvent, Connective, Formula, Gate, Model};
    use std::rc::Rc;

    fn two_var_pdag(p_a: f64, p_b: f64, connective: Connective) -> Pdag {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(p_a)));
        let b = BasicEvent::new("b", Rc::new(Constant(p_b)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        model.add_basic_event(Rc::clone(&b)).unwrap();
        let top = Gate::new(
            "top",
            Formula::new(connective, vec![basic_arg(&a, false), basic_arg(&b, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        pra_pdag::build(&model, &pra_pdag::PdagOptions::default()).unwrap()
    }

    #[test]
    fn inactive_filter_just_counts_and_collects_events() {
        let pdag = two_var_pdag(0.1, 0.2, Connective::Or);
        let products = vec![vec![2], vec![3]];
        let summary = filter_products(&pdag, products, &FilterOptions::default(), |_| {
            panic!("consumer must not run when filtering is inactive");
        });
        assert_eq!(summary.product_count, 2);
        assert_eq!(summary.original_product_count, 2);
        assert_eq!(summary.pruned_products, 0);
        assert_eq!(summary.distribution, vec![2]);
        assert_eq!(summary.event_indices, vec![2, 3]);
    }

    #[test]
    fn limit_order_drops_products_above_the_limit() {
        let pdag = two_var_pdag(0.1, 0.1, Connective::And);
        let products = vec![vec![2, 3], vec![2, 3, 4]];
        let options = FilterOptions {
            limit_order: Some(2),
            ..FilterOptions::default()
        };
        let mut seen = false;
        let summary = filter_products(&pdag, products, &options, |_| seen = true);
        assert_eq!(summary.product_count, 1);
        assert_eq!(summary.pruned_products, 1);
        assert!(seen);
    }

    #[test]
    fn cut_off_removes_low_probability_products() {
        let pdag = two_var_pdag(0.001, 0.2, Connective::Or);
        let products = vec![vec![2], vec![3]];
        let options = FilterOptions {
            cut_off: 0.1,
            ..FilterOptions::default()
        };
        let summary = filter_products(&pdag, products, &options, |_| {});
        assert_eq!(summary.product_count, 1);
        assert_eq!(summary.event_indices, vec![3]);
    }
}
