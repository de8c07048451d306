//! Risk classification of free-text requests
//!
//! [`RiskClassifier`] is the pluggable policy the `classify` node consults.
//! [`KeywordClassifier`] is the stock policy: a request is `high` risk if it
//! mentions any high-risk keyword, otherwise `medium` if it mentions any
//! medium-risk keyword, otherwise `low`. Keywords match anywhere in the
//! text, case-insensitively, so "resubmit" and "cancellation" count. Forms
//! that drop or change the keyword's last letter ("deleting", "modified")
//! are matched too.
//!
//! Classification is pure and infallible; empty input is `low`.

use crate::error::{GraphError, Result};
use crate::state::RiskLevel;
use regex::Regex;

pub const DEFAULT_HIGH_RISK_KEYWORDS: &[&str] =
    &["delete", "cancel", "submit", "approve", "reject", "remove"];

pub const DEFAULT_MEDIUM_RISK_KEYWORDS: &[&str] = &["create", "update", "modify", "change", "add"];

/// Result of classifying one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Keyword that decided the level, if any
    pub keyword: Option<String>,
}

impl RiskAssessment {
    pub fn low() -> Self {
        Self {
            level: RiskLevel::Low,
            keyword: None,
        }
    }
}

pub trait RiskClassifier: Send + Sync {
    fn classify(&self, message: &str) -> RiskAssessment;
}

#[derive(Debug, Clone)]
struct KeywordPattern {
    keyword: String,
    regex: Regex,
}

impl KeywordPattern {
    fn new(keyword: &str) -> Result<Self> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Err(GraphError::Configuration(
                "risk keywords must not be empty".to_string(),
            ));
        }
        let pattern = format!("(?i){}", inflections(&keyword).join("|"));
        let regex = Regex::new(&pattern).map_err(|e| {
            GraphError::Configuration(format!("invalid risk keyword '{}': {}", keyword, e))
        })?;
        Ok(Self { keyword, regex })
    }
}

/// Regex alternatives: the keyword itself plus inflections that do not
/// contain it verbatim
fn inflections(keyword: &str) -> Vec<String> {
    let mut forms = vec![regex::escape(keyword)];

    if let Some(stem) = keyword.strip_suffix('e') {
        // delete -> deleting, deletion
        forms.push(format!("{}(?:ing|ion)", regex::escape(stem)));
    } else if let Some(stem) = keyword.strip_suffix('y') {
        // modify -> modifies, modified
        forms.push(format!("{}(?:ies|ied)", regex::escape(stem)));
    }

    forms
}

/// Substring keyword policy with two tiers
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    high: Vec<KeywordPattern>,
    medium: Vec<KeywordPattern>,
}

impl KeywordClassifier {
    pub fn new<H, M>(high: H, medium: M) -> Result<Self>
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let high = high
            .into_iter()
            .map(|k| KeywordPattern::new(k.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let medium = medium
            .into_iter()
            .map(|k| KeywordPattern::new(k.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { high, medium })
    }

    /// Classifier with the built-in keyword lists
    pub fn standard() -> Result<Self> {
        Self::new(DEFAULT_HIGH_RISK_KEYWORDS, DEFAULT_MEDIUM_RISK_KEYWORDS)
    }

    pub fn high_risk_keywords(&self) -> Vec<&str> {
        self.high.iter().map(|p| p.keyword.as_str()).collect()
    }

    pub fn medium_risk_keywords(&self) -> Vec<&str> {
        self.medium.iter().map(|p| p.keyword.as_str()).collect()
    }

    fn first_match<'a>(patterns: &'a [KeywordPattern], message: &str) -> Option<&'a str> {
        patterns
            .iter()
            .find(|p| p.regex.is_match(message))
            .map(|p| p.keyword.as_str())
    }
}

impl RiskClassifier for KeywordClassifier {
    fn classify(&self, message: &str) -> RiskAssessment {
        if let Some(keyword) = Self::first_match(&self.high, message) {
            return RiskAssessment {
                level: RiskLevel::High,
                keyword: Some(keyword.to_string()),
            };
        }
        if let Some(keyword) = Self::first_match(&self.medium, message) {
            return RiskAssessment {
                level: RiskLevel::Medium,
                keyword: Some(keyword.to_string()),
            };
        }
        RiskAssessment::low()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::standard().unwrap()
    }

    #[test]
    fn test_low_risk() {
        let c = classifier();
        assert_eq!(c.classify("Show me the customer list").level, RiskLevel::Low);
        assert_eq!(c.classify("").level, RiskLevel::Low);
        assert_eq!(c.classify("   ").keyword, None);
    }

    #[test]
    fn test_high_risk() {
        let result = classifier().classify("Delete all customer data");
        assert_eq!(result.level, RiskLevel::High);
        assert_eq!(result.keyword.as_deref(), Some("delete"));
    }

    #[test]
    fn test_medium_risk() {
        let result = classifier().classify("Please update the shipping address");
        assert_eq!(result.level, RiskLevel::Medium);
        assert_eq!(result.keyword.as_deref(), Some("update"));
    }

    #[test]
    fn test_high_takes_precedence_over_medium() {
        let result = classifier().classify("create and submit the invoice");
        assert_eq!(result.level, RiskLevel::High);
        assert_eq!(result.keyword.as_deref(), Some("submit"));
    }

    #[test]
    fn test_keywords_inside_words() {
        let c = classifier();
        for message in [
            "resubmit invoice 42",
            "Process the cancellation of order 42",
            "undelete records",
            "predelete the archive",
            "undeleted records",
        ] {
            assert_eq!(c.classify(message).level, RiskLevel::High, "{}", message);
        }
        assert_eq!(c.classify("additional users").level, RiskLevel::Medium);
        assert_eq!(c.classify("what is my address").level, RiskLevel::Medium);
    }

    #[test]
    fn test_inflections_and_case() {
        let c = classifier();
        assert_eq!(c.classify("DELETING old rows").level, RiskLevel::High);
        assert_eq!(c.classify("the order was submitted").level, RiskLevel::High);
        assert_eq!(c.classify("Cancelled subscriptions").level, RiskLevel::High);
        assert_eq!(c.classify("approved requests").level, RiskLevel::High);
        assert_eq!(c.classify("who modified this?").level, RiskLevel::Medium);
        assert_eq!(c.classify("adding a note").level, RiskLevel::Medium);
        assert_eq!(c.classify("changes since monday").level, RiskLevel::Medium);
    }

    #[test]
    fn test_custom_keywords() {
        let c = KeywordClassifier::new(["purge"], ["rename"]).unwrap();
        assert_eq!(c.classify("purge the cache").level, RiskLevel::High);
        assert_eq!(c.classify("rename the file").level, RiskLevel::Medium);
        assert_eq!(c.classify("delete the file").level, RiskLevel::Low);
        assert_eq!(c.high_risk_keywords(), vec!["purge"]);
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let err = KeywordClassifier::new([" "], Vec::<&str>::new()).unwrap_err();
        assert!(matches!(err, GraphError::Configuration(_)));
    }

    proptest! {
        #[test]
        fn high_keyword_always_wins(
            prefix in "[a-z ]{0,24}",
            suffix in "[a-z ]{0,24}",
            high in prop::sample::select(DEFAULT_HIGH_RISK_KEYWORDS.to_vec()),
            medium in prop::option::of(prop::sample::select(DEFAULT_MEDIUM_RISK_KEYWORDS.to_vec())),
        ) {
            let message = format!("{} {} {} {}", prefix, medium.unwrap_or(""), high, suffix);
            prop_assert_eq!(classifier().classify(&message).level, RiskLevel::High);
        }

        #[test]
        fn high_keyword_inside_other_letters_wins(
            prefix in "[a-zA-Z]{0,8}",
            suffix in "[a-zA-Z]{0,8}",
            high in prop::sample::select(DEFAULT_HIGH_RISK_KEYWORDS.to_vec()),
            upper in any::<bool>(),
        ) {
            let keyword = if upper { high.to_uppercase() } else { high.to_string() };
            let message = format!("{}{}{}", prefix, keyword, suffix);
            prop_assert_eq!(classifier().classify(&message).level, RiskLevel::High);
        }

        #[test]
        fn classification_is_deterministic(message in ".{0,64}") {
            let c = classifier();
            prop_assert_eq!(c.classify(&message), c.classify(&message));
        }
    }
}
