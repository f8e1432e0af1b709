//! Report DTOs (spec §6.2): plain, serde-serializable structs — no
//! analysis logic lives here, only the shape the report writer renders.

use serde::{Deserialize, Serialize};

use crate::cutsets::BitPackedCutSets;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub information: Information,
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Information {
    pub software_name: String,
    pub software_version: String,
    pub calculated_quantities: Vec<String>,
    pub model_features: ModelFeatures,
    pub calculation_times: Vec<CalculationTime>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelFeatures {
    pub gates: usize,
    pub basic_events: usize,
    pub house_events: usize,
    pub ccf_groups: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalculationTime {
    pub result_id: String,
    pub seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEntry {
    pub id: String,
    pub warnings: Vec<String>,
    pub content: ResultContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ResultContent {
    SumOfProducts(SumOfProducts),
    Curve(Curve),
    SafetyIntegrityLevels(SilHistogram),
    Importance(Vec<ImportanceEntry>),
    Measure(MeasureEntry),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SumOfProducts {
    pub total_probability: f64,
    pub products: ProductsEncoding,
}

/// A product's literals, named and signed (spec §3's `π` as an ordered
/// vector of signed indices, resolved to event names for the report).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductLiteral {
    pub event: String,
    pub complement: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductEntry {
    pub literals: Vec<ProductLiteral>,
    pub probability: f64,
}

/// Either the default plain `<product>` listing or the `bit_pack_cut_sets`
/// encoding (spec §6.1's `bit_pack_cut_sets` option, §6.2's wire format).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ProductsEncoding {
    Plain(Vec<ProductEntry>),
    BitPacked(BitPackedCutSets),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Curve {
    pub times: Vec<f64>,
    pub pfd: Vec<f64>,
    pub pfh: Vec<f64>,
    pub pfd_avg: f64,
    pub pfh_avg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SilHistogram {
    pub bands: Vec<SilBandFraction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SilBandFraction {
    pub band: String,
    pub fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportanceEntry {
    pub event: String,
    pub measures: Vec<MeasureEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasureEntry {
    pub name: String,
    pub value: f64,
}
