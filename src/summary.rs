use pra_model::Model;

/// What `BuildModelOnly` reports: the model validated and its event
/// counts, without running any of the quantitative pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelSummary {
    pub gates: usize,
    pub basic_events: usize,
    pub house_events: usize,
    pub ccf_groups: usize,
}

impl ModelSummary {
    pub fn from_model(model: &Model) -> Self {
        ModelSummary {
            gates: model.gates().count(),
            basic_events: model.basic_events().count(),
            house_events: model.house_events().count(),
            ccf_groups: model.ccf_groups().len(),
        }
    }
}
