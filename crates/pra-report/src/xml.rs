//! A minimal, purpose-built writer for the report schema (spec §6.2).
//! Not a general XML library: it knows the exact element set `Report`
//! can produce and nothing else.

use crate::cutsets::BitPackedCutSets;
use crate::schema::*;

/// Render a complete report document as UTF-8 XML text.
pub fn to_xml_string(report: &Report) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<report>\n");
    write_information(&mut out, &report.information);
    write_results(&mut out, &report.results);
    out.push_str("</report>\n");
    out
}

fn write_information(out: &mut String, info: &Information) {
    out.push_str("  <information>\n");
    tag(out, 4, "software-name", &info.software_name);
    tag(out, 4, "software-version", &info.software_version);
    out.push_str("    <calculated-quantities>\n");
    for quantity in &info.calculated_quantities {
        tag(out, 6, "quantity", quantity);
    }
    out.push_str("    </calculated-quantities>\n");
    write_model_features(out, &info.model_features);
    for ct in &info.calculation_times {
        out.push_str(&format!(
            "    <calculation-time result=\"{}\" seconds=\"{}\"/>\n",
            escape(&ct.result_id),
            ct.seconds
        ));
    }
    out.push_str("  </information>\n");
}

fn write_model_features(out: &mut String, features: &ModelFeatures) {
    out.push_str(&format!(
        "    <model-features gates=\"{}\" basic-events=\"{}\" house-events=\"{}\" ccf-groups=\"{}\"/>\n",
        features.gates, features.basic_events, features.house_events, features.ccf_groups
    ));
}

fn write_results(out: &mut String, results: &[ResultEntry]) {
    out.push_str("  <results>\n");
    for result in results {
        write_result(out, result);
    }
    out.push_str("  </results>\n");
}

fn write_result(out: &mut String, result: &ResultEntry) {
    let indent = 4;
    let pad = " ".repeat(indent);
    match &result.content {
        ResultContent::SumOfProducts(sop) => {
            out.push_str(&format!(
                "{pad}<sum-of-products id=\"{}\" total-probability=\"{}\">\n",
                escape(&result.id),
                sop.total_probability
            ));
            write_warnings(out, indent + 2, &result.warnings);
            write_products(out, indent + 2, &sop.products);
            out.push_str(&format!("{pad}</sum-of-products>\n"));
        }
        ResultContent::Curve(curve) => {
            out.push_str(&format!(
                "{pad}<curve id=\"{}\" pfd-avg=\"{}\" pfh-avg=\"{}\">\n",
                escape(&result.id),
                curve.pfd_avg,
                curve.pfh_avg
            ));
            write_warnings(out, indent + 2, &result.warnings);
            for ((t, pfd), pfh) in curve.times.iter().zip(&curve.pfd).zip(&curve.pfh) {
                out.push_str(&format!(
                    "{}<point time=\"{}\" pfd=\"{}\" pfh=\"{}\"/>\n",
                    " ".repeat(indent + 2),
                    t,
                    pfd,
                    pfh
                ));
            }
            out.push_str(&format!("{pad}</curve>\n"));
        }
        ResultContent::SafetyIntegrityLevels(histogram) => {
            out.push_str(&format!(
                "{pad}<safety-integrity-levels id=\"{}\">\n",
                escape(&result.id)
            ));
            write_warnings(out, indent + 2, &result.warnings);
            for band in &histogram.bands {
                out.push_str(&format!(
                    "{}<band name=\"{}\" fraction=\"{}\"/>\n",
                    " ".repeat(indent + 2),
                    escape(&band.band),
                    band.fraction
                ));
            }
            out.push_str(&format!("{pad}</safety-integrity-levels>\n"));
        }
        ResultContent::Importance(entries) => {
            out.push_str(&format!("{pad}<importance id=\"{}\">\n", escape(&result.id)));
            write_warnings(out, indent + 2, &result.warnings);
            for entry in entries {
                out.push_str(&format!(
                    "{}<event name=\"{}\">\n",
                    " ".repeat(indent + 2),
                    escape(&entry.event)
                ));
                for measure in &entry.measures {
                    write_measure(out, indent + 4, measure);
                }
                out.push_str(&format!("{}</event>\n", " ".repeat(indent + 2)));
            }
            out.push_str(&format!("{pad}</importance>\n"));
        }
        ResultContent::Measure(measure) => {
            out.push_str(&format!("{pad}<measure id=\"{}\">\n", escape(&result.id)));
            write_warnings(out, indent + 2, &result.warnings);
            write_measure(out, indent + 2, measure);
            out.push_str(&format!("{pad}</measure>\n"));
        }
    }
}

fn write_measure(out: &mut String, indent: usize, measure: &MeasureEntry) {
    out.push_str(&format!(
        "{}<measure name=\"{}\" value=\"{}\"/>\n",
        " ".repeat(indent),
        escape(&measure.name),
        measure.value
    ));
}

fn write_warnings(out: &mut String, indent: usize, warnings: &[String]) {
    for warning in warnings {
        tag(out, indent, "warning", warning);
    }
}

fn write_products(out: &mut String, indent: usize, products: &ProductsEncoding) {
    let pad = " ".repeat(indent);
    match products {
        ProductsEncoding::Plain(entries) => {
            for entry in entries {
                out.push_str(&format!("{pad}<product probability=\"{}\">\n", entry.probability));
                for literal in &entry.literals {
                    out.push_str(&format!(
                        "{}<basic-event name=\"{}\" complement=\"{}\"/>\n",
                        " ".repeat(indent + 2),
                        escape(&literal.event),
                        literal.complement
                    ));
                }
                out.push_str(&format!("{pad}</product>\n"));
            }
        }
        ProductsEncoding::BitPacked(bit_packed) => write_bit_packed_cut_sets(out, indent, bit_packed),
    }
}

fn write_bit_packed_cut_sets(out: &mut String, indent: usize, cut_sets: &BitPackedCutSets) {
    let pad = " ".repeat(indent);
    out.push_str(&format!(
        "{pad}<bit-packed-cut-sets encoding=\"{}\" batch-records=\"{}\" bytes-per-vector=\"{}\" order-bytes=\"{}\" endianness=\"{}\" bit-order=\"{}\">\n",
        cut_sets.encoding,
        cut_sets.batch_records,
        cut_sets.bytes_per_vector,
        cut_sets.order_bytes,
        cut_sets.endianness,
        cut_sets.bit_order,
    ));
    out.push_str(&format!("{}<basic-event-table>\n", " ".repeat(indent + 2)));
    for (index, name) in cut_sets.basic_event_table.iter().enumerate() {
        out.push_str(&format!(
            "{}<basic-event index=\"{}\" name=\"{}\"/>\n",
            " ".repeat(indent + 4),
            index,
            escape(name)
        ));
    }
    out.push_str(&format!("{}</basic-event-table>\n", " ".repeat(indent + 2)));
    for buffer in &cut_sets.buffers {
        out.push_str(&format!(
            "{}<buffer record-count=\"{}\">",
            " ".repeat(indent + 2),
            buffer.record_count
        ));
        for chunk in &buffer.base64_chunks {
            out.push_str(chunk);
        }
        out.push_str("</buffer>\n");
    }
    out.push_str(&format!("{pad}</bit-packed-cut-sets>\n"));
}

fn tag(out: &mut String, indent: usize, name: &str, text: &str) {
    out.push_str(&format!(
        "{}<{name}>{}</{name}>\n",
        " ".repeat(indent),
        escape(text)
    ));
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutsets::pack_products;

    fn sample_report() -> Report {
        Report {
            information: Information {
                software_name: "pra".into(),
                software_version: "0.1.0".into(),
                calculated_quantities: vec!["probability".into()],
                model_features: ModelFeatures {
                    gates: 3,
                    basic_events: 5,
                    house_events: 0,
                    ccf_groups: 0,
                },
                calculation_times: vec![CalculationTime {
                    result_id: "top".into(),
                    seconds: 0.01,
                }],
            },
            results: vec![ResultEntry {
                id: "top".into(),
                warnings: vec![],
                content: ResultContent::SumOfProducts(SumOfProducts {
                    total_probability: 0.5,
                    products: ProductsEncoding::Plain(vec![ProductEntry {
                        literals: vec![ProductLiteral {
                            event: "A".into(),
                            complement: false,
                        }],
                        probability: 0.5,
                    }]),
                }),
            }],
        }
    }

    #[test]
    fn writes_the_expected_element_skeleton() {
        let xml = to_xml_string(&sample_report());
        assert!(xml.contains("<report>"));
        assert!(xml.contains("<information>"));
        assert!(xml.contains("<sum-of-products id=\"top\""));
        assert!(xml.contains("<basic-event name=\"A\" complement=\"false\"/>"));
    }

    #[test]
    fn escapes_reserved_characters_in_event_names() {
        let mut report = sample_report();
        if let ResultContent::SumOfProducts(sop) = &mut report.results[0].content {
            if let ProductsEncoding::Plain(entries) = &mut sop.products {
                entries[0].literals[0].event = "A & B<C>".into();
            }
        }
        let xml = to_xml_string(&report);
        assert!(xml.contains("A &amp; B&lt;C&gt;"));
        assert!(!xml.contains("A & B<C>"));
    }

    #[test]
    fn bit_packed_cut_sets_render_with_the_required_attributes() {
        let mut report = sample_report();
        let mut packed = pack_products(&[vec![1, 2]], 2);
        packed.basic_event_table = vec!["A".into(), "B".into()];
        if let ResultContent::SumOfProducts(sop) = &mut report.results[0].content {
            sop.products = ProductsEncoding::BitPacked(packed);
        }
        let xml = to_xml_string(&report);
        assert!(xml.contains("encoding=\"base64\""));
        assert!(xml.contains("order-bytes=\"2\""));
        assert!(xml.contains("bit-order=\"lsb0\""));
        assert!(xml.contains("<basic-event index=\"0\" name=\"A\"/>"));
    }
}
