use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModerationError;

pub const DEFAULT_AGE_GROUP: &str = "13-16";
pub const DEFAULT_CONTENT_ID: &str = "api-request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBand {
    #[serde(rename = "<10")]
    Under10,
    #[serde(rename = "10-13")]
    From10To13,
    #[serde(rename = "13-16")]
    From13To16,
    #[serde(rename = "16+")]
    Over16,
}

impl AgeBand {
    pub const ALL: [AgeBand; 4] = [
        AgeBand::Under10,
        AgeBand::From10To13,
        AgeBand::From13To16,
        AgeBand::Over16,
    ];

    /// Exact request label. No trimming and no aliases: anything else is
    /// an unknown band.
    pub fn from_request_label(value: &str) -> Option<Self> {
        match value {
            "<10" => Some(Self::Under10),
            "10-13" => Some(Self::From10To13),
            "13-16" => Some(Self::From13To16),
            "16+" => Some(Self::Over16),
            _ => None,
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Self::Under10 => "<10",
            Self::From10To13 => "10-13",
            Self::From13To16 => "13-16",
            Self::Over16 => "16+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeAction {
    Block,
    Gate,
    Allow,
}

impl AgeAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "block" => Some(Self::Block),
            "gate" => Some(Self::Gate),
            "allow" => Some(Self::Allow),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Block => "Block",
            Self::Gate => "Gate",
            Self::Allow => "Allow",
        }
    }
}

/// Per-band actions of one taxonomy rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeActionTable {
    #[serde(rename = "<10", default = "default_under_10")]
    pub under_10: AgeAction,
    #[serde(rename = "10-13", default = "default_gate")]
    pub from_10_to_13: AgeAction,
    #[serde(rename = "13-16", default = "default_gate")]
    pub from_13_to_16: AgeAction,
    #[serde(rename = "16+", alias = "16-18", default = "default_over_16")]
    pub over_16: AgeAction,
}

fn default_under_10() -> AgeAction {
    AgeAction::Block
}

fn default_gate() -> AgeAction {
    AgeAction::Gate
}

fn default_over_16() -> AgeAction {
    AgeAction::Allow
}

impl Default for AgeActionTable {
    fn default() -> Self {
        Self {
            under_10: default_under_10(),
            from_10_to_13: default_gate(),
            from_13_to_16: default_gate(),
            over_16: default_over_16(),
        }
    }
}

impl AgeActionTable {
    pub fn new(under_10: AgeAction, from_10_to_13: AgeAction, from_13_to_16: AgeAction, over_16: AgeAction) -> Self {
        Self {
            under_10,
            from_10_to_13,
            from_13_to_16,
            over_16,
        }
    }

    pub fn default_for(band: AgeBand) -> AgeAction {
        Self::default().get(band)
    }

    pub fn get(&self, band: AgeBand) -> AgeAction {
        match band {
            AgeBand::Under10 => self.under_10,
            AgeBand::From10To13 => self.from_10_to_13,
            AgeBand::From13To16 => self.from_13_to_16,
            AgeBand::Over16 => self.over_16,
        }
    }

    pub fn set(&mut self, band: AgeBand, action: AgeAction) {
        match band {
            AgeBand::Under10 => self.under_10 = action,
            AgeBand::From10To13 => self.from_10_to_13 = action,
            AgeBand::From13To16 => self.from_13_to_16 = action,
            AgeBand::Over16 => self.over_16 = action,
        }
    }

    /// Action for a raw age group label. Unrecognized labels resolve to `Gate`.
    pub fn resolve(&self, age_group: &str) -> AgeAction {
        AgeBand::from_request_label(age_group)
            .map(|band| self.get(band))
            .unwrap_or(AgeAction::Gate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub subcategory: String,
    #[serde(default)]
    pub category_keywords: Vec<String>,
    #[serde(default)]
    pub subcategory_keywords: Vec<String>,
    #[serde(default)]
    pub age_actions: AgeActionTable,
}

impl CategoryRule {
    pub fn new<C, S>(
        category: impl Into<String>,
        subcategory: impl Into<String>,
        category_keywords: C,
        subcategory_keywords: S,
        age_actions: AgeActionTable,
    ) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            category: category.into().trim().to_string(),
            subcategory: subcategory.into().trim().to_string(),
            category_keywords: normalize_keywords(category_keywords),
            subcategory_keywords: normalize_keywords(subcategory_keywords),
            age_actions,
        }
    }

    /// Re-applies keyword normalization, used after deserializing raw rules.
    pub fn normalized(self) -> Self {
        Self {
            category: self.category.trim().to_string(),
            subcategory: self.subcategory.trim().to_string(),
            category_keywords: normalize_keywords(self.category_keywords),
            subcategory_keywords: normalize_keywords(self.subcategory_keywords),
            age_actions: self.age_actions,
        }
    }
}

/// Trims and lowercases keywords, dropping empties and later duplicates.
pub fn normalize_keywords<I>(keywords: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|keyword| keyword.as_ref().trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .filter(|keyword| seen.insert(keyword.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub confidence: f64,
    pub matched_keywords: BTreeSet<String>,
}

impl MatchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_match(&self) -> bool {
        self.confidence > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAnalysis {
    pub primary_category: Option<String>,
    pub subcategory: Option<String>,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    pub age_restriction: Option<AgeAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticResult {
    pub label: String,
    pub confidence: f64,
    pub similarity: f64,
}

impl SemanticResult {
    pub const FALLBACK_LABEL: &'static str = "General";

    pub fn new(label: impl Into<String>, confidence: f64, similarity: f64) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            similarity: similarity.clamp(0.0, 1.0),
        }
    }

    /// Low-confidence result used whenever no strong semantic signal exists.
    pub fn fallback() -> Self {
        Self::new(Self::FALLBACK_LABEL, 0.2, 0.15)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Pass,
    ReviewQueue,
    Flag,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::ReviewQueue => "REVIEW_QUEUE",
            Self::Flag => "FLAG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalDecision {
    pub weighted_score: f64,
    pub decision: Decision,
    pub action_required: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationResult {
    pub content_id: String,
    pub category_analysis: CategoryAnalysis,
    pub semantic_analysis: SemanticResult,
    pub final_decision: FinalDecision,
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default = "default_content_id", alias = "content_id")]
    pub content_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_age_group", alias = "age_group")]
    pub age_group: String,
}

fn default_content_id() -> String {
    DEFAULT_CONTENT_ID.to_string()
}

fn default_age_group() -> String {
    DEFAULT_AGE_GROUP.to_string()
}

impl AnalysisRequest {
    pub fn new(content_id: impl Into<String>, text: impl Into<String>, age_group: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            text: text.into(),
            age_group: age_group.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModerationError> {
        if self.text.is_empty() {
            return Err(ModerationError::EmptyText);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_age_actions_use_slot_defaults() {
        let table: AgeActionTable = serde_json::from_str(r#"{"13-16": "Allow"}"#).unwrap();
        assert_eq!(table.get(AgeBand::Under10), AgeAction::Block);
        assert_eq!(table.get(AgeBand::From10To13), AgeAction::Gate);
        assert_eq!(table.get(AgeBand::From13To16), AgeAction::Allow);
        assert_eq!(table.get(AgeBand::Over16), AgeAction::Allow);
    }

    #[test]
    fn unknown_age_group_resolves_to_gate() {
        let table = AgeActionTable::new(AgeAction::Block, AgeAction::Block, AgeAction::Block, AgeAction::Block);
        assert_eq!(table.resolve("adult"), AgeAction::Gate);
        assert_eq!(table.resolve("16+"), AgeAction::Block);
        assert_eq!(table.resolve("16-18"), AgeAction::Gate);
        assert_eq!(table.resolve(" 13-16 "), AgeAction::Gate);
    }

    #[test]
    fn json_tables_accept_the_sixteen_to_eighteen_column_name() {
        let table: AgeActionTable = serde_json::from_str(r#"{"16-18": "Block"}"#).unwrap();
        assert_eq!(table.get(AgeBand::Over16), AgeAction::Block);
    }

    #[test]
    fn keywords_are_normalized_and_deduplicated() {
        let keywords = normalize_keywords([" Kill ", "blood", "", "KILL", "self harm"]);
        assert_eq!(keywords, vec!["kill", "blood", "self harm"]);
    }

    #[test]
    fn request_accepts_snake_case_and_defaults() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"text": "hello", "age_group": "<10"}"#).unwrap();
        assert_eq!(request.age_group, "<10");
        assert_eq!(request.content_id, DEFAULT_CONTENT_ID);

        let request: AnalysisRequest = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert_eq!(request.age_group, DEFAULT_AGE_GROUP);
    }

    #[test]
    fn empty_text_is_rejected() {
        let request = AnalysisRequest::new("id", "", "13-16");
        assert!(matches!(request.validate(), Err(ModerationError::EmptyText)));
    }

    #[test]
    fn whitespace_text_is_still_analyzed() {
        let request = AnalysisRequest::new("id", "   ", "13-16");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn decision_serializes_in_screaming_case() {
        let value = serde_json::to_value(Decision::ReviewQueue).unwrap();
        assert_eq!(value, serde_json::json!("REVIEW_QUEUE"));
    }
}
