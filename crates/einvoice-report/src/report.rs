//! Normalized validation report
//!
//! The upstream validator answers with a ruleset-keyed structure whose
//! shape follows its own naming. [`normalize`] projects that into the
//! report clients consume: stable key names, results grouped under
//! category labels, and an issue date.

use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ReportError;
use crate::ruleset::{Category, Rulesets};

// ============================================================
// Upstream shape
// ============================================================

/// Response body of the remote schematron validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawValidationResult {
    pub successful: bool,
    pub message: String,
    pub report: RawReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReport {
    pub fired_assertion_errors_count: u64,
    #[serde(default)]
    pub reports: HashMap<String, RawRulesetResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRulesetResult {
    pub successful: bool,
    pub summary: String,
    #[serde(default)]
    pub fired_assertion_error_codes: Vec<String>,
    #[serde(default)]
    pub fired_assertion_errors: Vec<FiredAssertion>,
}

/// A single rule violation as reported upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiredAssertion {
    pub id: String,
    pub text: String,
    pub location: String,
}

// ============================================================
// Clock
// ============================================================

/// Source of the report issue date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// UTC wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to one date, for tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

// ============================================================
// Normalized report
// ============================================================

/// Field order here is the serialized key order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReport {
    #[serde(with = "iso_date")]
    pub issue_date: NaiveDate,
    pub successful: bool,
    pub summary: String,
    pub total_error_count: u64,
    pub results: CategoryResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub successful: bool,
    pub summary: String,
    pub error_codes: Vec<String>,
    pub errors: Vec<ReportedError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub id: String,
    pub breached_rule: String,
    pub location: String,
}

impl From<&FiredAssertion> for ReportedError {
    fn from(assertion: &FiredAssertion) -> Self {
        ReportedError {
            id: assertion.id.clone(),
            breached_rule: assertion.text.clone(),
            location: assertion.location.clone(),
        }
    }
}

/// Per-category results in first-insertion order
///
/// Serializes as a JSON object keyed by category label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryResults(Vec<(Category, CategoryResult)>);

impl CategoryResults {
    /// Insert or replace; a replaced category keeps its original position
    pub fn insert(&mut self, category: Category, result: CategoryResult) {
        match self.0.iter_mut().find(|(c, _)| *c == category) {
            Some(slot) => slot.1 = result,
            None => self.0.push((category, result)),
        }
    }

    pub fn get(&self, category: Category) -> Option<&CategoryResult> {
        self.0.iter().find(|(c, _)| *c == category).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().map(|(c, _)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryResult)> {
        self.0.iter().map(|(c, r)| (*c, r))
    }
}

impl Serialize for CategoryResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, result) in &self.0 {
            map.serialize_entry(category.label(), result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResultsVisitor;

        impl<'de> Visitor<'de> for ResultsVisitor {
            type Value = CategoryResults;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category label to results")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = CategoryResults::default();
                while let Some(label) = access.next_key::<String>()? {
                    let category = Category::from_label(&label).ok_or_else(|| {
                        serde::de::Error::custom(format!("unknown category '{}'", label))
                    })?;
                    results.insert(category, access.next_value()?);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(ResultsVisitor)
    }
}

mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Project a raw validator response into a [`NormalizedReport`]
///
/// Top-level success, message and error count are trusted as given; they
/// are never recomputed from the per-ruleset results.
pub fn normalize<C: Clock + ?Sized>(
    raw: &RawValidationResult,
    rulesets: &Rulesets,
    clock: &C,
) -> Result<NormalizedReport, ReportError> {
    let mut results = CategoryResults::default();

    for ruleset in rulesets.ids() {
        let source = raw
            .report
            .reports
            .get(ruleset)
            .ok_or_else(|| ReportError::UnknownRuleset(ruleset.clone()))?;

        results.insert(
            Category::for_ruleset(ruleset),
            CategoryResult {
                successful: source.successful,
                summary: source.summary.clone(),
                error_codes: source.fired_assertion_error_codes.clone(),
                errors: source
                    .fired_assertion_errors
                    .iter()
                    .map(ReportedError::from)
                    .collect(),
            },
        );
    }

    Ok(NormalizedReport {
        issue_date: clock.today(),
        successful: raw.successful,
        summary: raw.message.clone(),
        total_error_count: raw.report.fired_assertion_errors_count,
        results,
    })
}
