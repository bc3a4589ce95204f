use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::context::SafeDomain;
use crate::error::ModerationError;

/// Tunable constants of the moderation pipeline. Built once at startup and
/// shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationPolicy {
    pub keyword_weight: f64,
    pub semantic_weight: f64,
    pub flag_threshold: f64,
    pub review_threshold: f64,
    pub age_block_min_confidence: f64,
    pub safe_context_penalty: f64,
    pub phrase_weight: u32,
    pub fuzzy_weight: u32,
    pub match_weight_scale: f64,
    pub fuzzy_threshold: f64,
    pub context_window: usize,
    pub snippet_window: usize,
    pub neutral_identity_terms: BTreeSet<String>,
    pub compatible_subcategory_terms: Vec<String>,
    pub safe_context_lexicon: BTreeMap<SafeDomain, Vec<String>>,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            keyword_weight: 0.30,
            semantic_weight: 0.70,
            flag_threshold: 0.9,
            review_threshold: 0.7,
            age_block_min_confidence: 0.4,
            safe_context_penalty: 0.1,
            phrase_weight: 3,
            fuzzy_weight: 1,
            match_weight_scale: 0.35,
            fuzzy_threshold: 0.85,
            context_window: 150,
            snippet_window: 50,
            neutral_identity_terms: ["woman", "man", "girl", "boy", "child", "person"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            compatible_subcategory_terms: ["education", "medical", "health", "recovery", "news", "study"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            safe_context_lexicon: default_safe_lexicon(),
        }
    }
}

impl ModerationPolicy {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed reading moderation policy at {}", path.as_ref().display())
        })?;
        let policy: Self = serde_json::from_str(&raw).context("invalid moderation policy json")?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ModerationError> {
        let unit_values = [
            ("keyword_weight", self.keyword_weight),
            ("semantic_weight", self.semantic_weight),
            ("flag_threshold", self.flag_threshold),
            ("review_threshold", self.review_threshold),
            ("age_block_min_confidence", self.age_block_min_confidence),
            ("safe_context_penalty", self.safe_context_penalty),
            ("match_weight_scale", self.match_weight_scale),
            ("fuzzy_threshold", self.fuzzy_threshold),
        ];
        for (name, value) in unit_values {
            if !(0.0..=1.0).contains(&value) {
                return Err(ModerationError::InvalidPolicy(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.review_threshold > self.flag_threshold {
            return Err(ModerationError::InvalidPolicy(
                "review_threshold must not exceed flag_threshold".to_string(),
            ));
        }

        Ok(())
    }

    /// Subcategories named after a benign domain keep their score when the
    /// keyword shows up in a safe context.
    pub fn is_compatible_subcategory(&self, subcategory: &str) -> bool {
        let lower = subcategory.to_lowercase();
        self.compatible_subcategory_terms
            .iter()
            .any(|term| lower.contains(term.as_str()))
    }
}

fn default_safe_lexicon() -> BTreeMap<SafeDomain, Vec<String>> {
    let entries: [(SafeDomain, &[&str]); 4] = [
        (
            SafeDomain::Education,
            &[
                "education", "learn", "study", "university", "college", "professor", "biology",
                "science", "research", "academic", "textbook", "lesson", "course", "history",
                "health class", "awareness", "prevention",
            ],
        ),
        (
            SafeDomain::Medical,
            &[
                "medical", "doctor", "hospital", "treatment", "symptom", "diagnosis", "health",
                "anatomy", "clinical", "patient", "recovery", "therapy", "wellness", "medicine",
                "condition",
            ],
        ),
        (
            SafeDomain::News,
            &[
                "news", "report", "article", "breaking", "journalist", "media", "coverage",
                "politics", "debate", "discussion", "opinion",
            ],
        ),
        (
            SafeDomain::GeneralSafe,
            &[
                "consent", "safe", "responsibility", "information", "guide", "help", "support",
                "hotline", "resource",
            ],
        ),
    ];

    entries
        .into_iter()
        .map(|(domain, terms)| (domain, terms.iter().map(|term| term.to_string()).collect()))
        .collect()
}
