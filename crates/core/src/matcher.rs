use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ModerationPolicy;
use crate::models::MatchResult;
use crate::similarity::sequence_ratio;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid tokenizer regex"));

/// Drops punctuation, lowercases and splits on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    NON_WORD
        .replace_all(text, "")
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Scores how strongly a keyword set is present in a text.
///
/// A keyword found verbatim (case-insensitive) anywhere in the text counts as
/// a phrase match. Single-token keywords that are not found verbatim may still
/// count as a weaker fuzzy match against one of the text's tokens, which keeps
/// small misspellings from slipping through.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    neutral_terms: HashSet<String>,
    phrase_weight: u32,
    fuzzy_weight: u32,
    weight_scale: f64,
    fuzzy_threshold: f64,
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new(&ModerationPolicy::default())
    }
}

impl KeywordMatcher {
    pub fn new(policy: &ModerationPolicy) -> Self {
        Self {
            neutral_terms: policy
                .neutral_identity_terms
                .iter()
                .map(|term| term.to_lowercase())
                .collect(),
            phrase_weight: policy.phrase_weight,
            fuzzy_weight: policy.fuzzy_weight,
            weight_scale: policy.match_weight_scale,
            fuzzy_threshold: policy.fuzzy_threshold,
        }
    }

    pub fn is_neutral(&self, keyword: &str) -> bool {
        self.neutral_terms.contains(&keyword.to_lowercase())
    }

    pub fn score<S: AsRef<str>>(&self, text: &str, keywords: &[S]) -> MatchResult {
        if keywords.is_empty() {
            return MatchResult::empty();
        }

        let text_lower = text.to_lowercase();
        let tokens = tokenize(text);

        let mut matched = BTreeSet::new();
        let mut total_weight = 0_u32;

        for keyword in keywords {
            let keyword = keyword.as_ref().to_lowercase();
            if keyword.is_empty() || self.neutral_terms.contains(&keyword) {
                continue;
            }

            if text_lower.contains(keyword.as_str()) {
                total_weight = total_weight.saturating_add(self.phrase_weight);
                matched.insert(keyword);
                continue;
            }

            if keyword.chars().any(char::is_whitespace) {
                continue;
            }

            if tokens
                .iter()
                .any(|token| sequence_ratio(&keyword, token) > self.fuzzy_threshold)
            {
                total_weight = total_weight.saturating_add(self.fuzzy_weight);
                matched.insert(keyword);
            }
        }

        if matched.is_empty() {
            return MatchResult::empty();
        }

        MatchResult {
            confidence: (total_weight as f64 * self.weight_scale).min(1.0),
            matched_keywords: matched,
        }
    }
}
