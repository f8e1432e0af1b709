//! `QuantifyModel`/`BuildModelOnly` (spec §6.1): wires the PDAG builder,
//! preprocessor, BDD/ZBDD pair, product filter, probability analyser,
//! Monte Carlo core and report schema into the two host entry points.

use std::collections::HashMap;
use std::time::Instant;

use pra_bdd::BddManager;
use pra_model::Model;
use pra_pdag::{Literal, Pdag, PdagOptions, Vertex};
use pra_quantify::{
    analyse, filter_products, product_probability, time_curve, Approximation, FilterOptions,
    QuantifySettings,
};
use pra_report::{
    CalculationTime, Curve, ImportanceEntry, Information, MeasureEntry, ModelFeatures,
    ProductEntry, ProductLiteral, ProductsEncoding, Report, ResultContent, ResultEntry,
    SilBandFraction, SilHistogram, SumOfProducts,
};

use crate::error::{Error, Result};
use crate::settings::{Algorithm, Settings};
use crate::summary::ModelSummary;

/// Validate the model and report its event counts without running any
/// quantitative analysis.
pub fn build_model_only(model: &Model) -> Result<ModelSummary> {
    model.validate()?;
    Ok(ModelSummary::from_model(model))
}

/// Run the full pipeline: PDAG construction, preprocessing, BDD/ZBDD
/// compilation, product filtering, probability analysis and (as the
/// options table requests) importance, uncertainty and SIL sub-analyses,
/// assembled into a [`Report`].
pub fn quantify_model(settings: &Settings, model: &mut Model) -> Result<Report> {
    let started = Instant::now();
    settings.validate()?;

    if settings.ccf {
        model.expand_ccf_groups()?;
    }
    model.validate()?;
    model.mission_time.set(settings.mission_time);

    let pdag_options = PdagOptions {
        keep_null_gates: settings.keep_null_gates,
        expand_atleast_gates: settings.expand_atleast_gates,
        expand_xor_gates: settings.expand_xor_gates,
    };
    let mut pdag = pra_pdag::build(model, &pdag_options)?;

    let preprocess_options = if settings.compilation_level == 0 {
        pra_preprocess::Options {
            remove_redundant_literals: false,
            coalesce_associative_gates: false,
            propagate_constants: false,
        }
    } else {
        pra_preprocess::Options::default()
    };
    pra_preprocess::run(&mut pdag, &preprocess_options);

    let mut bdd = BddManager::new(&pdag);
    let root = pra_bdd::compile(&mut bdd, &pdag);

    let approximation: Approximation = settings.approximation.into();
    let quantify_settings = QuantifySettings {
        filter: FilterOptions {
            limit_order: settings.limit_order,
            cut_off: settings.cut_off,
            adaptive: settings.adaptive,
            adaptive_target: if settings.adaptive {
                Some(bdd.probability(root, &pdag))
            } else {
                None
            },
            approximation,
            exact_quantification: true,
        },
        approximation,
        time_step: settings.time_step,
    };

    let requires_products = !settings.skip_products
        && (settings.algorithm == Algorithm::Zbdd
            || settings.prime_implicants
            || settings.importance
            || settings.bit_pack_cut_sets
            || quantify_settings.requires_products());

    let mut warnings = Vec::new();
    let mut products: Vec<Vec<Literal>> = Vec::new();

    if requires_products {
        let coherent = !settings.prime_implicants && root_is_coherent(&pdag, pdag.root.unsigned_abs());
        let (zbdd, zroot) = pra_zbdd::from_bdd(&bdd, root, coherent);
        let raw_products = zbdd.products(zroot);
        let fallback = raw_products.clone();
        let mut retained = None;
        let summary = filter_products(&pdag, raw_products, &quantify_settings.filter, |kept| {
            retained = Some(kept.to_vec());
        });

        if summary.original_product_count > 0 && summary.product_count == 0 {
            warnings.push("All products were removed by the cut-off threshold.".to_string());
        }
        products = retained.unwrap_or(fallback);
        if products.is_empty() {
            warnings.push(
                "product set is empty (top event is unsatisfiable or was fully pruned)"
                    .to_string(),
            );
        } else if products.iter().any(|p| p.is_empty()) {
            warnings.push("product set contains the universe (top event is a tautology)".to_string());
        }
    }

    let analyse_products: Option<&[Vec<Literal>]> = if requires_products {
        Some(&products)
    } else {
        None
    };
    let total_probability = analyse(approximation, &mut bdd, root, &pdag, analyse_products);

    let mut results = Vec::new();

    if settings.probability {
        if settings.skip_products || !requires_products {
            results.push(ResultEntry {
                id: "top".to_string(),
                warnings: warnings.clone(),
                content: ResultContent::Measure(MeasureEntry {
                    name: "probability".to_string(),
                    value: total_probability,
                }),
            });
        } else {
            let encoding = if settings.bit_pack_cut_sets {
                ProductsEncoding::BitPacked(to_bit_packed(&pdag, &products))
            } else {
                ProductsEncoding::Plain(products.iter().map(|p| to_product_entry(&pdag, p)).collect())
            };
            results.push(ResultEntry {
                id: "top".to_string(),
                warnings: warnings.clone(),
                content: ResultContent::SumOfProducts(SumOfProducts {
                    total_probability,
                    products: encoding,
                }),
            });
        }
    }

    if settings.importance && requires_products {
        let entries = fussell_vesely(&pdag, &products, total_probability);
        results.push(ResultEntry {
            id: "importance".to_string(),
            warnings: Vec::new(),
            content: ResultContent::Importance(entries),
        });
    }

    if settings.uncertainty {
        let entry = uncertainty_entry(&pdag, settings)?;
        results.push(ResultEntry {
            id: "uncertainty".to_string(),
            warnings: Vec::new(),
            content: ResultContent::Importance(vec![entry]),
        });
    }

    if settings.sil {
        // validated: `sil` requires `time_step` to be set.
        let time_step = settings.time_step.expect("validated by Settings::validate");
        let curve = time_curve(
            &model.mission_time,
            settings.mission_time,
            time_step,
            approximation,
            &mut bdd,
            root,
            &pdag,
            analyse_products,
        );
        results.push(ResultEntry {
            id: "curve".to_string(),
            warnings: Vec::new(),
            content: ResultContent::Curve(Curve {
                times: curve.times.clone(),
                pfd: curve.pfd.clone(),
                pfh: curve.pfh.clone(),
                pfd_avg: curve.pfd_avg,
                pfh_avg: curve.pfh_avg,
            }),
        });
        results.push(ResultEntry {
            id: "sil".to_string(),
            warnings: Vec::new(),
            content: ResultContent::SafetyIntegrityLevels(SilHistogram {
                bands: curve
                    .sil_histogram
                    .iter()
                    .map(|(band, fraction)| SilBandFraction {
                        band: format!("{band:?}"),
                        fraction: *fraction,
                    })
                    .collect(),
            }),
        });
    }

    let mut calculated_quantities = Vec::new();
    if settings.probability {
        calculated_quantities.push("probability".to_string());
    }
    if settings.importance {
        calculated_quantities.push("importance".to_string());
    }
    if settings.uncertainty {
        calculated_quantities.push("uncertainty".to_string());
    }
    if settings.sil {
        calculated_quantities.push("sil".to_string());
    }

    let information = Information {
        software_name: "pra".to_string(),
        software_version: env!("CARGO_PKG_VERSION").to_string(),
        calculated_quantities,
        model_features: ModelFeatures {
            gates: model.gates().count(),
            basic_events: model.basic_events().count(),
            house_events: model.house_events().count(),
            ccf_groups: model.ccf_groups().len(),
        },
        calculation_times: vec![CalculationTime {
            result_id: "top".to_string(),
            seconds: started.elapsed().as_secs_f64(),
        }],
    };

    Ok(Report { information, results })
}

/// A bare variable root is trivially coherent; a gate root defers to the
/// PDAG's own coherence analysis.
fn root_is_coherent(pdag: &Pdag, index: u32) -> bool {
    match pdag.vertex(index) {
        Some(Vertex::Gate(gate)) => gate.coherent,
        _ => true,
    }
}

fn event_name(pdag: &Pdag, index: u32) -> String {
    pdag.variable(index)
        .map(|v| v.basic_event.name.clone())
        .unwrap_or_else(|| format!("g{index}"))
}

fn to_product_entry(pdag: &Pdag, product: &[Literal]) -> ProductEntry {
    let probability = product_probability(pdag, product);
    let literals = product
        .iter()
        .map(|&lit| ProductLiteral {
            event: event_name(pdag, lit.unsigned_abs()),
            complement: lit < 0,
        })
        .collect();
    ProductEntry { literals, probability }
}

/// Remap the PDAG's own (sparse, interleaved-with-gates) variable indices
/// down to a dense `0..basic_event_count` table before handing products to
/// [`pra_report::pack_products`], which only knows about dense positions.
fn to_bit_packed(pdag: &Pdag, products: &[Vec<Literal>]) -> pra_report::BitPackedCutSets {
    let mut basic_events: Vec<(u32, String)> = pdag
        .basic_events()
        .iter()
        .map(|(idx, be)| (idx, be.name.clone()))
        .collect();
    basic_events.sort_by_key(|(idx, _)| *idx);
    let position: HashMap<u32, usize> = basic_events
        .iter()
        .enumerate()
        .map(|(pos, (idx, _))| (*idx, pos))
        .collect();

    let remapped: Vec<Vec<i32>> = products
        .iter()
        .map(|product| {
            product
                .iter()
                .map(|&lit| {
                    let pos = position[&lit.unsigned_abs()] as i32 + 1;
                    if lit < 0 {
                        -pos
                    } else {
                        pos
                    }
                })
                .collect()
        })
        .collect();

    let mut packed = pra_report::pack_products(&remapped, basic_events.len());
    packed.basic_event_table = basic_events.into_iter().map(|(_, name)| name).collect();
    packed
}

/// Fussell-Vesely importance: the fraction of the top event's probability
/// attributable to products containing each basic event, `Σ Pr(product
/// containing e) / Pr(top)`. The spec names "importance" as an optional
/// sub-analysis without prescribing a formula; Fussell-Vesely is the
/// measure computable directly from the retained product list already in
/// hand, with no need to re-evaluate the BDD under a perturbed
/// probability.
fn fussell_vesely(pdag: &Pdag, products: &[Vec<Literal>], total_probability: f64) -> Vec<ImportanceEntry> {
    let mut sums: HashMap<u32, f64> = HashMap::new();
    for product in products {
        let p = product_probability(pdag, product);
        for &lit in product {
            if lit > 0 {
                *sums.entry(lit.unsigned_abs()).or_insert(0.0) += p;
            }
        }
    }
    let mut entries: Vec<ImportanceEntry> = sums
        .into_iter()
        .map(|(idx, sum)| {
            let fv = if total_probability > 0.0 {
                (sum / total_probability).min(1.0)
            } else {
                0.0
            };
            ImportanceEntry {
                event: event_name(pdag, idx),
                measures: vec![MeasureEntry {
                    name: "fussell-vesely".to_string(),
                    value: fv,
                }],
            }
        })
        .collect();
    entries.sort_by(|a, b| a.event.cmp(&b.event));
    entries
}

/// Monte Carlo uncertainty tally over the top event (spec §4.7), reported
/// as the mean, standard error and both confidence intervals.
fn uncertainty_entry(pdag: &Pdag, settings: &Settings) -> Result<ImportanceEntry> {
    let profile = pra_montecarlo::DeviceProfile::default();
    let target = pdag.root;
    let tallies = pra_montecarlo::simulate(pdag, &[target], settings.num_trials, &profile)?;
    let stats = tallies.get(&target).copied().unwrap_or_default().stats();
    Ok(ImportanceEntry {
        event: "top".to_string(),
        measures: vec![
            MeasureEntry { name: "mean".to_string(), value: stats.mean },
            MeasureEntry { name: "std-err".to_string(), value: stats.std_err },
            MeasureEntry { name: "ci-95-low".to_string(), value: stats.ci_95.0 },
            MeasureEntry { name: "ci-95-high".to_string(), value: stats.ci_95.1 },
            MeasureEntry { name: "ci-99-low".to_string(), value: stats.ci_99.0 },
            MeasureEntry { name: "ci-99-high".to_string(), value: stats.ci_99.1 },
        ],
    })
}
