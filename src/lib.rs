//! Probabilistic risk analysis engine: fault trees and event trees over a
//! BDD/ZBDD core (spec §1-§2). This crate is the host-facing facade;
//! [`quantify_model`]/[`build_model_only`] are the two entry points spec
//! §6.1 names `QuantifyModel`/`BuildModelOnly`.

mod error;
mod logging;
mod pipeline;
mod settings;
mod summary;

pub use error::{Error, Result};
pub use logging::init_default;
pub use pipeline::{build_model_only, quantify_model};
pub use settings::{Algorithm, ApproximationKind, Settings};
pub use summary::ModelSummary;

pub use pra_model::Model;
pub use pra_report::Report;

#[cfg(test)]
mod tests {
    use super::*;
    use pra_expr::Constant;
    use pra_model::{basic_arg, BasicEvent, Connective, Formula, Gate};
    use std::rc::Rc;

    fn or_of_two_model() -> Model {
        let mut model = Model::new("m");
        let a = BasicEvent::new("a", Rc::new(Constant(0.1)));
        let b = BasicEvent::new("b", Rc::new(Constant(0.2)));
        model.add_basic_event(Rc::clone(&a)).unwrap();
        model.add_basic_event(Rc::clone(&b)).unwrap();
        let top = Gate::new(
            "top",
            Formula::new(Connective::Or, vec![basic_arg(&a, false), basic_arg(&b, false)]).unwrap(),
        );
        model.add_gate(Rc::clone(&top)).unwrap();
        model.set_top_gate(top).unwrap();
        model
    }

    #[test]
    fn quantify_model_matches_the_exact_two_event_probability() {
        let mut model = or_of_two_model();
        let settings = Settings::default();
        let report = quantify_model(&settings, &mut model).unwrap();
        let ResultContentProbe::SumOfProducts(total) = probe_first(&report) else {
            panic!("expected a sum-of-products result");
        };
        assert!((total - 0.28).abs() < 1e-9);
    }

    #[test]
    fn build_model_only_counts_events_without_quantifying() {
        let model = or_of_two_model();
        let summary = build_model_only(&model).unwrap();
        assert_eq!(summary.basic_events, 2);
        assert_eq!(summary.gates, 1);
    }

    #[test]
    fn prime_implicants_with_an_approximation_is_an_input_error() {
        let settings = Settings {
            prime_implicants: true,
            approximation: ApproximationKind::Mcub,
            ..Settings::default()
        };
        let mut model = or_of_two_model();
        assert!(matches!(quantify_model(&settings, &mut model), Err(Error::Input(_))));
    }

    enum ResultContentProbe {
        SumOfProducts(f64),
        Other,
    }

    fn probe_first(report: &Report) -> ResultContentProbe {
        match &report.results[0].content {
            pra_report::ResultContent::SumOfProducts(sop) => {
                ResultContentProbe::SumOfProducts(sop.total_probability)
            }
            _ => ResultContentProbe::Other,
        }
    }
}
