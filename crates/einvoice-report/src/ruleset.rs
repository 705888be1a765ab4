//! Ruleset identifiers and the category labels reports are keyed by

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ruleset checked by the EN16931 syntax binding
pub const UBL_RULESET: &str = "AUNZ_UBL_1_0_10";

/// Rulesets requested when the caller does not name any
pub const DEFAULT_RULESETS: &str = "AUNZ_PEPPOL_1_0_10,AUNZ_UBL_1_0_10";

/// Human-facing label a ruleset's results are reported under
///
/// The mapping is closed: the UBL ruleset is the syntax check and every
/// other ruleset reports as PEPPOL. Two different PEPPOL-family rulesets
/// therefore share one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    En16931Syntax,
    AunzPeppol,
}

impl Category {
    pub fn for_ruleset(ruleset: &str) -> Self {
        match ruleset {
            UBL_RULESET => Category::En16931Syntax,
            _ => Category::AunzPeppol,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::En16931Syntax => "EN16931_Syntax",
            Category::AunzPeppol => "AUNZ_PEPPOL",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "EN16931_Syntax" => Some(Category::En16931Syntax),
            "AUNZ_PEPPOL" => Some(Category::AunzPeppol),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered list of ruleset identifiers requested for one validation
///
/// Order and duplicates are preserved exactly as supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rulesets(Vec<String>);

impl Rulesets {
    /// Parse a comma-separated header value such as `AUNZ_PEPPOL_1_0_10,AUNZ_UBL_1_0_10`
    pub fn parse(rules: &str) -> Self {
        Rulesets(rules.split(',').map(str::to_string).collect())
    }

    pub fn from_list<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rulesets(rules.into_iter().map(Into::into).collect())
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    /// Comma-joined form sent to the validator as the `rules` query parameter
    pub fn to_query(&self) -> String {
        self.0.join(",")
    }
}

impl Default for Rulesets {
    fn default() -> Self {
        Rulesets::parse(DEFAULT_RULESETS)
    }
}

impl std::str::FromStr for Rulesets {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Rulesets::parse(s))
    }
}

impl Serialize for Rulesets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rulesets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Joined(String),
            List(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Joined(rules) => Rulesets::parse(&rules),
            Raw::List(rules) => Rulesets(rules),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_and_list_forms_agree() {
        let joined = Rulesets::parse("AUNZ_PEPPOL_1_0_10,AUNZ_UBL_1_0_10");
        let list = Rulesets::from_list(["AUNZ_PEPPOL_1_0_10", "AUNZ_UBL_1_0_10"]);
        assert_eq!(joined, list);
    }

    #[test]
    fn test_duplicates_preserved() {
        let spec = Rulesets::parse("AUNZ_UBL_1_0_10,AUNZ_UBL_1_0_10");
        assert_eq!(spec.ids().len(), 2);
    }

    #[test]
    fn test_deserialize_both_shapes() {
        let a: Rulesets = serde_json::from_str(r#""A,B""#).unwrap();
        let b: Rulesets = serde_json::from_str(r#"["A","B"]"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_query(), "A,B");
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            Category::for_ruleset("AUNZ_UBL_1_0_10"),
            Category::En16931Syntax
        );
        assert_eq!(
            Category::for_ruleset("AUNZ_PEPPOL_1_0_10"),
            Category::AunzPeppol
        );
        assert_eq!(
            Category::for_ruleset("AUNZ_PEPPOL_SB_1_0_10"),
            Category::AunzPeppol
        );
        assert_eq!(Category::En16931Syntax.label(), "EN16931_Syntax");
    }

    #[test]
    fn test_default_rulesets() {
        assert_eq!(
            Rulesets::default().ids(),
            &["AUNZ_PEPPOL_1_0_10".to_string(), "AUNZ_UBL_1_0_10".to_string()]
        );
    }
}
