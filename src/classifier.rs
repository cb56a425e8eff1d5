//! System Classifier
//!
//! Maps a submission to the [`SystemTag`] its quota is charged against.
//! Classification is an ordered table of header rules so new submitters can
//! be recognised by configuration alone.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::rate_limit::SystemTag;

/// Header test applied by one classification rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum RulePredicate {
    /// Header is present with any value
    HeaderPresent { header: String },

    /// Header value contains `pattern`, ignoring ASCII case
    HeaderContains { header: String, pattern: String },
}

impl RulePredicate {
    /// Test the predicate against request headers
    pub fn matches(&self, headers: &HeaderMap) -> bool {
        match self {
            RulePredicate::HeaderPresent { header } => headers.contains_key(header.as_str()),
            RulePredicate::HeaderContains { header, pattern } => {
                let pattern = pattern.to_ascii_lowercase();
                headers
                    .get_all(header.as_str())
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .any(|value| value.to_ascii_lowercase().contains(&pattern))
            }
        }
    }
}

/// One entry of the rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Condition on the request headers
    pub when: RulePredicate,

    /// Tag assigned when the condition holds
    pub system: SystemTag,
}

impl ClassificationRule {
    pub fn header_present(header: &str, system: SystemTag) -> Self {
        Self {
            when: RulePredicate::HeaderPresent {
                header: header.to_ascii_lowercase(),
            },
            system,
        }
    }

    pub fn header_contains(header: &str, pattern: &str, system: SystemTag) -> Self {
        Self {
            when: RulePredicate::HeaderContains {
                header: header.to_ascii_lowercase(),
                pattern: pattern.to_string(),
            },
            system,
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Rules applied in order; the first match wins
    pub rules: Vec<ClassificationRule>,

    /// Tag used when no rule matches
    pub fallback: SystemTag,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                ClassificationRule::header_present("origin", SystemTag::browser()),
                ClassificationRule::header_contains("user-agent", "convex", SystemTag::convex()),
                ClassificationRule::header_contains(
                    "user-agent",
                    "cloudflare-workers",
                    SystemTag::worker(),
                ),
            ],
            fallback: SystemTag::manual(),
        }
    }
}

impl ClassifierConfig {
    /// Validate the rule table
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fallback.as_str().is_empty() {
            anyhow::bail!("Classifier fallback system tag must not be empty");
        }
        for (index, rule) in self.rules.iter().enumerate() {
            let header = match &rule.when {
                RulePredicate::HeaderPresent { header } => header,
                RulePredicate::HeaderContains { header, pattern } => {
                    if pattern.is_empty() {
                        anyhow::bail!("Classifier rule {} has an empty pattern", index);
                    }
                    header
                }
            };
            if axum::http::HeaderName::from_bytes(header.as_bytes()).is_err() {
                anyhow::bail!("Classifier rule {} has invalid header name: {}", index, header);
            }
            if rule.system.as_str().is_empty() {
                anyhow::bail!("Classifier rule {} has an empty system tag", index);
            }
        }
        Ok(())
    }
}

/// Ordered rule-table classifier
#[derive(Debug, Clone, Default)]
pub struct SystemClassifier {
    config: ClassifierConfig,
}

impl SystemClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.config.rules
    }

    /// Determine the system tag for a submission.
    ///
    /// A non-blank `explicit_system` from the request body always wins.
    pub fn classify(&self, explicit_system: Option<&str>, headers: &HeaderMap) -> SystemTag {
        if let Some(explicit) = explicit_system.filter(|s| !s.trim().is_empty()) {
            return SystemTag::new(explicit);
        }

        self.config
            .rules
            .iter()
            .find(|rule| rule.when.matches(headers))
            .map(|rule| rule.system.clone())
            .unwrap_or_else(|| self.config.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_explicit_system_wins() {
        let classifier = SystemClassifier::default();
        let h = headers(&[(header::ORIGIN, "https://app.example.com")]);
        assert_eq!(classifier.classify(Some("Worker"), &h), SystemTag::worker());
    }

    #[test]
    fn test_blank_explicit_system_is_ignored() {
        let classifier = SystemClassifier::default();
        let h = headers(&[(header::ORIGIN, "https://app.example.com")]);
        assert_eq!(classifier.classify(Some("  "), &h), SystemTag::browser());
    }

    #[test]
    fn test_origin_means_browser() {
        let classifier = SystemClassifier::default();
        let h = headers(&[
            (header::ORIGIN, "https://app.example.com"),
            (header::USER_AGENT, "Cloudflare-Workers"),
        ]);
        assert_eq!(classifier.classify(None, &h), SystemTag::browser());
    }

    #[test]
    fn test_user_agent_signatures() {
        let classifier = SystemClassifier::default();

        let h = headers(&[(header::USER_AGENT, "Convex/1.12 (node)")]);
        assert_eq!(classifier.classify(None, &h), SystemTag::convex());

        let h = headers(&[(header::USER_AGENT, "Cloudflare-Workers")]);
        assert_eq!(classifier.classify(None, &h), SystemTag::worker());
    }

    #[test]
    fn test_fallback() {
        let classifier = SystemClassifier::default();
        let h = headers(&[(header::USER_AGENT, "curl/8.4.0")]);
        assert_eq!(classifier.classify(None, &h), SystemTag::manual());
        assert_eq!(classifier.classify(None, &HeaderMap::new()), SystemTag::manual());
    }

    #[test]
    fn test_custom_rule_table_order() {
        let mut config = ClassifierConfig::default();
        config.rules.insert(
            0,
            ClassificationRule::header_present("x-mobile-app", SystemTag::new("mobile")),
        );
        let classifier = SystemClassifier::new(config);

        let mut h = headers(&[(header::ORIGIN, "capacitor://localhost")]);
        h.insert("x-mobile-app", HeaderValue::from_static("ios"));
        assert_eq!(classifier.classify(None, &h), SystemTag::new("mobile"));
    }

    #[test]
    fn test_rules_deserialize_from_toml() {
        let config: ClassifierConfig = toml::from_str(
            r#"
fallback = "unknown"

[[rules]]
system = "batch"
when = { match = "header_contains", header = "user-agent", pattern = "batch-exporter" }
"#,
        )
        .unwrap();

        assert_eq!(config.fallback, SystemTag::unknown());
        assert!(config.validate().is_ok());

        let classifier = SystemClassifier::new(config);
        let h = headers(&[(header::USER_AGENT, "Batch-Exporter/2")]);
        assert_eq!(classifier.classify(None, &h), SystemTag::new("batch"));
    }

    #[test]
    fn test_validate_rejects_bad_header_name() {
        let config = ClassifierConfig {
            rules: vec![ClassificationRule::header_present("bad header", SystemTag::browser())],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
