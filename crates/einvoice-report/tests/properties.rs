//! Property-based tests for the report pipeline
//!
//! Covers the markup gate, category labelling, determinism of the
//! normalizer and format dispatch.

use std::collections::HashMap;

use chrono::NaiveDate;
use einvoice_report::report::{FiredAssertion, RawReport, RawRulesetResult};
use einvoice_report::{
    normalize, render, wellformed, Category, FixedClock, NormalizedReport, RawValidationResult,
    RenderedArtifact, ReportError, Rulesets, ScratchDir,
};
use proptest::prelude::*;

const UBL: &str = "AUNZ_UBL_1_0_10";

// ============================================================
// Strategies
// ============================================================

fn tag_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9]{0,8}"
}

fn text_content() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,:-]{0,16}"
}

/// A chain of nested elements with text in the innermost one
fn nested_markup() -> impl Strategy<Value = String> {
    (prop::collection::vec(tag_name(), 1..8), text_content()).prop_map(|(names, text)| {
        let mut xml = String::new();
        for name in &names {
            xml.push_str(&format!("<{}>", name));
        }
        xml.push_str(&text);
        for name in names.iter().rev() {
            xml.push_str(&format!("</{}>", name));
        }
        xml
    })
}

fn non_ubl_ruleset() -> impl Strategy<Value = String> {
    "AUNZ_[A-Z]{3,8}_1_0_[0-9]{1,2}".prop_filter("must not be the UBL ruleset", |s| s != UBL)
}

fn assertion() -> impl Strategy<Value = FiredAssertion> {
    ("[A-Z]{2,6}-R[0-9]{3}", "[a-zA-Z ]{1,40}", "/Invoice(/[a-zA-Z]{1,8}){0,3}").prop_map(
        |(id, text, location)| FiredAssertion { id, text, location },
    )
}

fn ruleset_result() -> impl Strategy<Value = RawRulesetResult> {
    (any::<bool>(), "[a-z ]{0,20}", prop::collection::vec(assertion(), 0..4)).prop_map(
        |(successful, summary, errors)| RawRulesetResult {
            successful,
            summary,
            fired_assertion_error_codes: errors.iter().map(|e| e.id.clone()).collect(),
            fired_assertion_errors: errors,
        },
    )
}

/// A raw response that has an entry for every id in `ids`
fn raw_for(ids: Vec<String>) -> impl Strategy<Value = (RawValidationResult, Vec<String>)> {
    let count = ids.len();
    (
        any::<bool>(),
        "[a-zA-Z ]{0,20}",
        0u64..500,
        prop::collection::vec(ruleset_result(), count),
    )
        .prop_map(move |(successful, message, total, results)| {
            let reports: HashMap<String, RawRulesetResult> =
                ids.iter().cloned().zip(results).collect();
            (
                RawValidationResult {
                    successful,
                    message,
                    report: RawReport {
                        fired_assertion_errors_count: total,
                        reports,
                    },
                },
                ids.clone(),
            )
        })
}

fn any_report_input() -> impl Strategy<Value = (RawValidationResult, Vec<String>)> {
    prop::collection::vec(
        prop_oneof![Just(UBL.to_string()), non_ubl_ruleset()],
        1..5,
    )
    .prop_flat_map(raw_for)
}

fn clock() -> FixedClock {
    FixedClock(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ============================================================
    // Well-formedness
    // ============================================================

    #[test]
    fn well_formed_markup_passes(xml in nested_markup()) {
        prop_assert!(wellformed::check(&xml).is_ok(), "rejected {}", xml);
    }

    #[test]
    fn unterminated_markup_fails(xml in nested_markup()) {
        let cut = xml.rfind("</").unwrap();
        let broken = &xml[..cut];
        prop_assert!(matches!(
            wellformed::check(broken),
            Err(ReportError::MalformedMarkup(_))
        ));
    }

    #[test]
    fn mismatched_closing_tag_fails(
        names in prop::collection::vec(tag_name(), 2..6),
        wrong in tag_name()
    ) {
        prop_assume!(wrong != names[names.len() - 1]);
        let mut xml = String::new();
        for name in &names {
            xml.push_str(&format!("<{}>", name));
        }
        xml.push_str(&format!("</{}>", wrong));
        for name in names.iter().rev().skip(1) {
            xml.push_str(&format!("</{}>", name));
        }
        prop_assert!(matches!(
            wellformed::check(&xml),
            Err(ReportError::MalformedMarkup(_))
        ));
    }

    // ============================================================
    // Category labels
    // ============================================================

    #[test]
    fn ubl_only_maps_to_syntax_label(
        (raw, ids) in (1usize..4).prop_flat_map(|n| raw_for(vec![UBL.to_string(); n]))
    ) {
        let report = normalize(&raw, &Rulesets::from_list(ids), &clock()).unwrap();
        prop_assert_eq!(report.results.len(), 1);
        prop_assert!(report.results.get(Category::En16931Syntax).is_some());
    }

    #[test]
    fn non_ubl_rulesets_collapse_to_peppol(
        (raw, ids) in prop::collection::vec(non_ubl_ruleset(), 1..5).prop_flat_map(raw_for)
    ) {
        let report = normalize(&raw, &Rulesets::from_list(ids.clone()), &clock()).unwrap();
        prop_assert_eq!(report.results.len(), 1);

        // Last ruleset processed owns the label
        let last = &raw.report.reports[ids.last().unwrap()];
        let peppol = report.results.get(Category::AunzPeppol).unwrap();
        prop_assert_eq!(&peppol.summary, &last.summary);
        prop_assert_eq!(peppol.errors.len(), last.fired_assertion_errors.len());
    }

    #[test]
    fn string_and_list_specs_normalize_identically((raw, ids) in any_report_input()) {
        let from_list = normalize(&raw, &Rulesets::from_list(ids.clone()), &clock()).unwrap();
        let from_string = normalize(&raw, &Rulesets::parse(&ids.join(",")), &clock()).unwrap();
        prop_assert_eq!(from_list, from_string);
    }

    // ============================================================
    // Normalizer determinism
    // ============================================================

    #[test]
    fn normalize_is_idempotent((raw, ids) in any_report_input()) {
        let spec = Rulesets::from_list(ids);
        let first = normalize(&raw, &spec, &clock()).unwrap();
        let second = normalize(&raw, &spec, &clock()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn aggregates_are_copied_verbatim((raw, ids) in any_report_input()) {
        let report = normalize(&raw, &Rulesets::from_list(ids), &clock()).unwrap();
        prop_assert_eq!(report.successful, raw.successful);
        prop_assert_eq!(&report.summary, &raw.message);
        prop_assert_eq!(report.total_error_count, raw.report.fired_assertion_errors_count);
    }

    // ============================================================
    // Rendering
    // ============================================================

    #[test]
    fn json_render_round_trips((raw, ids) in any_report_input()) {
        let report = normalize(&raw, &Rulesets::from_list(ids), &clock()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());

        let artifact = runtime()
            .block_on(render(&report, "json", "invoice.xml", &scratch))
            .unwrap();
        let RenderedArtifact::Inline { body, .. } = artifact else {
            panic!("json renders inline");
        };
        let parsed: NormalizedReport = serde_json::from_str(&body).unwrap();
        prop_assert_eq!(parsed, report);
    }

    #[test]
    fn unknown_format_tokens_rejected(
        token in "[a-zA-Z]{0,6}".prop_filter("must not be a known format", |s| {
            !matches!(s.as_str(), "json" | "html" | "pdf" | "docx")
        })
    ) {
        let raw: RawValidationResult = serde_json::from_value(serde_json::json!({
            "successful": true,
            "message": "ok",
            "report": { "firedAssertionErrorsCount": 0, "reports": {} }
        })).unwrap();
        let report = normalize(&raw, &Rulesets::from_list(Vec::<String>::new()), &clock()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());

        let result = runtime().block_on(render(&report, &token, "invoice.xml", &scratch));
        prop_assert!(matches!(result, Err(ReportError::UnsupportedFormat(_))));
    }
}
