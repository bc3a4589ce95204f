mod csv_source;
mod error;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use komal_core::CategoryRule;
use serde::Serialize;
use tracing::{info, warn};

pub use csv_source::parse_csv;
pub use error::TaxonomyError;

#[derive(Debug, Clone, Serialize)]
pub struct TaxonomyStats {
    pub rules: usize,
    pub categories: usize,
}

/// Ordered, read-only rule set loaded once at startup. Rule order is the
/// tie-break order of the decision engine.
#[derive(Debug, Clone)]
pub struct TaxonomyStore {
    source: String,
    rules: Vec<CategoryRule>,
    labels: Vec<String>,
}

impl TaxonomyStore {
    /// Loads a `.json` rule array, or the CSV export for any other extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxonomyError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = String::from_utf8_lossy(&bytes);
        let source_name = path.display().to_string();

        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        let store = if is_json {
            Self::from_json_str(&raw, &source_name)?
        } else {
            Self::from_csv_str(&raw, &source_name)?
        };

        info!(
            source = %store.source,
            rules = store.rules.len(),
            categories = store.labels.len(),
            "taxonomy loaded"
        );
        Ok(store)
    }

    pub fn from_csv_str(raw: &str, source_name: &str) -> Result<Self, TaxonomyError> {
        Self::from_rules(parse_csv(raw, source_name)?, source_name)
    }

    pub fn from_json_str(raw: &str, source_name: &str) -> Result<Self, TaxonomyError> {
        let rules: Vec<CategoryRule> =
            serde_json::from_str(raw).map_err(|source| TaxonomyError::Json {
                source_name: source_name.to_string(),
                source,
            })?;

        let rules = rules
            .into_iter()
            .map(CategoryRule::normalized)
            .filter(|rule| {
                let usable = !rule.category.is_empty() && !rule.subcategory.is_empty();
                if !usable {
                    warn!(source = %source_name, category = %rule.category, "skipping rule without category or subcategory");
                }
                usable
            })
            .collect();

        Self::from_rules(rules, source_name)
    }

    pub fn from_rules(rules: Vec<CategoryRule>, source_name: &str) -> Result<Self, TaxonomyError> {
        if rules.is_empty() {
            return Err(TaxonomyError::Empty(source_name.to_string()));
        }

        let mut seen = HashSet::new();
        let labels = rules
            .iter()
            .filter(|rule| seen.insert(rule.category.clone()))
            .map(|rule| rule.category.clone())
            .collect();

        Ok(Self {
            source: source_name.to_string(),
            rules,
            labels,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Distinct category labels in declaration order.
    pub fn category_labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn stats(&self) -> TaxonomyStats {
        TaxonomyStats {
            rules: self.rules.len(),
            categories: self.labels.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use komal_core::{AgeAction, AgeBand};

    #[test]
    fn labels_are_distinct_and_ordered() {
        let raw = "Category,Subcategory,Tokenized_category_keywords_total\n\
                   Violence,Threats,kill\n\
                   Explicit,Nudity,nude\n\
                   Violence,Gore,blood\n";
        let store = TaxonomyStore::from_csv_str(raw, "inline").unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.category_labels(), ["Violence", "Explicit"]);
        assert_eq!(store.stats().categories, 2);
    }

    #[test]
    fn json_rules_are_normalized() {
        let raw = r#"[
            {"category": "Violence", "subcategory": "Threats",
             "category_keywords": [" Kill ", "kill", "BLOOD"],
             "age_actions": {"16+": "Gate"}},
            {"category": "Orphan", "subcategory": "  "}
        ]"#;
        let store = TaxonomyStore::from_json_str(raw, "inline").unwrap();

        assert_eq!(store.len(), 1);
        let rule = &store.rules()[0];
        assert_eq!(rule.category_keywords, vec!["kill", "blood"]);
        assert_eq!(rule.age_actions.get(AgeBand::Over16), AgeAction::Gate);
        assert_eq!(rule.age_actions.get(AgeBand::Under10), AgeAction::Block);
    }

    #[test]
    fn empty_taxonomy_is_rejected() {
        let raw = "Category,Subcategory\nViolence,\n";
        assert!(matches!(
            TaxonomyStore::from_csv_str(raw, "inline"),
            Err(TaxonomyError::Empty(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = TaxonomyStore::from_path("does/not/exist.csv");
        assert!(matches!(result, Err(TaxonomyError::Io { .. })));
    }
}
