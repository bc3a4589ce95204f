mod sweep;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use komal_core::{
    AgeBand, AnalysisRequest, CategoryAnalysis, ContextValidator, Decision, KeywordMatcher,
    ModerationError, ModerationPolicy, ModerationResult, PolicyEngine, ResultMetadata,
    SemanticResult,
};
use komal_ml::SemanticStack;
use komal_observability::AppMetrics;
use komal_taxonomy::TaxonomyStore;
use thiserror::Error;
use tracing::{info, instrument, warn};

pub use sweep::CategorySweep;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidInput(#[from] ModerationError),
}

/// Runs one request through the keyword sweep, the semantic classifier and
/// the decision policy. Shared read-only across concurrent requests.
#[derive(Clone)]
pub struct ModerationEngine {
    taxonomy: Arc<TaxonomyStore>,
    matcher: KeywordMatcher,
    validator: ContextValidator,
    policy_engine: PolicyEngine,
    semantic: SemanticStack,
    metrics: Arc<AppMetrics>,
}

impl ModerationEngine {
    pub fn new(
        taxonomy: Arc<TaxonomyStore>,
        policy: ModerationPolicy,
        semantic: SemanticStack,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            taxonomy,
            matcher: KeywordMatcher::new(&policy),
            validator: ContextValidator::new(&policy),
            policy_engine: PolicyEngine::new(policy),
            semantic,
            metrics,
        }
    }

    pub fn taxonomy(&self) -> &TaxonomyStore {
        &self.taxonomy
    }

    pub fn policy(&self) -> &ModerationPolicy {
        self.policy_engine.policy()
    }

    pub fn validator(&self) -> &ContextValidator {
        &self.validator
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn semantic_model(&self) -> &'static str {
        self.semantic.model_name()
    }

    #[instrument(skip(self, request), fields(content_id = %request.content_id, age_group = %request.age_group))]
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<ModerationResult, EngineError> {
        let started = Instant::now();
        request.validate()?;
        self.metrics.inc_request();

        if AgeBand::from_request_label(&request.age_group).is_none() {
            warn!(age_group = %request.age_group, "unknown age group, rules resolve to Gate");
        }

        let category_analysis = self.analyze_categories(&request.text, &request.age_group);
        let semantic_analysis = self.semantic_lookup(&request.text).await;
        let final_decision =
            self.policy_engine
                .decide(&category_analysis, &semantic_analysis, &request.age_group);

        if self.policy_engine.age_block_applies(&category_analysis) {
            self.metrics.inc_age_override();
        }
        match final_decision.decision {
            Decision::Flag => self.metrics.inc_flagged(),
            Decision::ReviewQueue => self.metrics.inc_review(),
            Decision::Pass => self.metrics.inc_passed(),
        }

        let elapsed = started.elapsed();
        self.metrics.observe_latency(elapsed);

        info!(
            decision = final_decision.decision.as_str(),
            weighted_score = final_decision.weighted_score,
            category = category_analysis.primary_category.as_deref().unwrap_or("-"),
            semantic_label = %semantic_analysis.label,
            elapsed_ms = elapsed.as_millis() as u64,
            "content analyzed"
        );

        Ok(ModerationResult {
            content_id: request.content_id,
            category_analysis,
            semantic_analysis,
            final_decision,
            metadata: ResultMetadata {
                processing_time_ms: elapsed.as_millis() as u64,
                timestamp: Utc::now(),
            },
        })
    }

    /// Keyword and context pass only; no semantic call and no metrics.
    pub fn analyze_categories(&self, text: &str, age_group: &str) -> CategoryAnalysis {
        CategorySweep {
            matcher: &self.matcher,
            validator: &self.validator,
            policy: self.policy_engine.policy(),
        }
        .run(self.taxonomy.rules(), text, age_group)
    }

    async fn semantic_lookup(&self, text: &str) -> SemanticResult {
        let call = self
            .semantic
            .classifier
            .classify(text, self.taxonomy.category_labels());

        match tokio::time::timeout(self.semantic.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => {
                warn!(error = %error, model = self.semantic.model_name(), "semantic classifier failed, using fallback");
                self.metrics.inc_semantic_fallback();
                SemanticResult::fallback()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.semantic.timeout.as_millis() as u64,
                    model = self.semantic.model_name(),
                    "semantic classifier timed out, using fallback"
                );
                self.metrics.inc_semantic_fallback();
                SemanticResult::fallback()
            }
        }
    }
}
