use crate::config::ModerationPolicy;
use crate::models::{AgeAction, CategoryAnalysis, Decision, FinalDecision, SemanticResult};

const ACTION_AGE_BLOCK: &str = "Blocked by Age Rule";
const ACTION_FLAG: &str = "Block/Review Required";
const ACTION_REVIEW: &str = "Manual verification needed";
const ACTION_PASS: &str = "Allow with monitoring";

/// Fuses keyword and semantic confidence and maps the result onto a decision.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policy: ModerationPolicy,
}

impl PolicyEngine {
    pub fn new(policy: ModerationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ModerationPolicy {
        &self.policy
    }

    pub fn fuse(&self, keyword_confidence: f64, semantic_confidence: f64) -> f64 {
        keyword_confidence * self.policy.keyword_weight
            + semantic_confidence * self.policy.semantic_weight
    }

    pub fn age_block_applies(&self, analysis: &CategoryAnalysis) -> bool {
        analysis.age_restriction == Some(AgeAction::Block)
            && analysis.confidence > self.policy.age_block_min_confidence
    }

    pub fn decide(
        &self,
        analysis: &CategoryAnalysis,
        semantic: &SemanticResult,
        age_group: &str,
    ) -> FinalDecision {
        if self.age_block_applies(analysis) {
            return FinalDecision {
                weighted_score: 1.0,
                decision: Decision::Flag,
                action_required: ACTION_AGE_BLOCK.to_string(),
                reasoning: format!("Content blocked for age group {age_group}."),
            };
        }

        self.score_decision(self.fuse(analysis.confidence, semantic.confidence))
    }

    /// Threshold ladder applied to an already fused score.
    pub fn score_decision(&self, score: f64) -> FinalDecision {
        let (decision, action, reasoning) = if score >= self.policy.flag_threshold {
            (
                Decision::Flag,
                ACTION_FLAG,
                "High confidence of inappropriate content.",
            )
        } else if score >= self.policy.review_threshold {
            (
                Decision::ReviewQueue,
                ACTION_REVIEW,
                "Moderate confidence, requires review.",
            )
        } else {
            (Decision::Pass, ACTION_PASS, "Content appears safe.")
        };

        FinalDecision {
            weighted_score: round_score(score),
            decision,
            action_required: action.to_string(),
            reasoning: reasoning.to_string(),
        }
    }
}

pub fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}
