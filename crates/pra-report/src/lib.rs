mod cutsets;
mod schema;
mod xml;

pub use cutsets::{pack_products, unpack_products, BitPackedCutSets, Buffer, BATCH_RECORDS};
pub use schema::{
    CalculationTime, Curve, ImportanceEntry, Information, MeasureEntry, ModelFeatures,
    ProductEntry, ProductLiteral, ProductsEncoding, Report, ResultContent, ResultEntry,
    SilBandFraction, SilHistogram, SumOfProducts,
};
pub use xml::to_xml_string;
