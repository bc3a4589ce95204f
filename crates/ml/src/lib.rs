mod centroid;
mod embedding;
mod heuristic;
mod http;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use komal_core::SemanticResult;
use komal_taxonomy::TaxonomyStore;
use thiserror::Error;
use tracing::warn;

pub use centroid::CentroidSemanticClassifier;
pub use embedding::HashEmbeddingModel;
pub use heuristic::HeuristicSemanticClassifier;
pub use http::HttpSemanticClassifier;

pub const DEFAULT_SEMANTIC_TIMEOUT: Duration = Duration::from_millis(1_500);

pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Vec<f32>;
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("semantic service request failed")]
    Http(#[from] reqwest::Error),
    #[error("semantic service returned status {0}")]
    Status(u16),
    #[error("semantic service returned an invalid payload: {0}")]
    InvalidResponse(String),
    #[error("taxonomy produced zero semantic centroids")]
    NoCentroids,
}

/// External semantic scoring capability. Implementations return their best
/// guess among `labels`; callers own the timeout and the fallback.
#[async_trait]
pub trait SemanticClassifier: Send + Sync {
    fn model_name(&self) -> &'static str;

    async fn classify(&self, text: &str, labels: &[String]) -> Result<SemanticResult, ClassifierError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticMode {
    Heuristic,
    Centroid,
    Http,
}

impl SemanticMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "heuristic" | "mock" => Some(Self::Heuristic),
            "centroid" | "embedding" => Some(Self::Centroid),
            "http" | "remote" => Some(Self::Http),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct SemanticStack {
    pub classifier: Arc<dyn SemanticClassifier>,
    pub timeout: Duration,
}

impl SemanticStack {
    pub fn new(classifier: Arc<dyn SemanticClassifier>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }

    /// Reads `KOMAL_SEMANTIC_MODE`, `KOMAL_SEMANTIC_URL` and
    /// `KOMAL_SEMANTIC_TIMEOUT_MS`. Misconfiguration degrades to the heuristic.
    pub fn from_env(taxonomy: &TaxonomyStore) -> Self {
        let mode = env::var("KOMAL_SEMANTIC_MODE")
            .ok()
            .and_then(|value| SemanticMode::parse(&value))
            .unwrap_or(SemanticMode::Heuristic);
        let url = env::var("KOMAL_SEMANTIC_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let timeout = env::var("KOMAL_SEMANTIC_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SEMANTIC_TIMEOUT);

        Self::load(mode, url.as_deref(), timeout, taxonomy)
    }

    pub fn load(mode: SemanticMode, url: Option<&str>, timeout: Duration, taxonomy: &TaxonomyStore) -> Self {
        let classifier: Arc<dyn SemanticClassifier> = match mode {
            SemanticMode::Heuristic => Arc::new(HeuristicSemanticClassifier::default()),
            SemanticMode::Centroid => {
                let embedder = Arc::new(HashEmbeddingModel::new(192));
                CentroidSemanticClassifier::from_taxonomy(taxonomy, embedder)
                    .map(|clf| Arc::new(clf) as Arc<dyn SemanticClassifier>)
                    .unwrap_or_else(|error| {
                        warn!(error = %error, "centroid classifier unavailable, using heuristic");
                        Arc::new(HeuristicSemanticClassifier::default())
                    })
            }
            SemanticMode::Http => match url {
                Some(url) => HttpSemanticClassifier::new(url, timeout)
                    .map(|clf| Arc::new(clf) as Arc<dyn SemanticClassifier>)
                    .unwrap_or_else(|error| {
                        warn!(error = %error, "http classifier unavailable, using heuristic");
                        Arc::new(HeuristicSemanticClassifier::default())
                    }),
                None => {
                    warn!("KOMAL_SEMANTIC_URL is not set, using heuristic classifier");
                    Arc::new(HeuristicSemanticClassifier::default())
                }
            },
        };

        Self { classifier, timeout }
    }

    pub fn model_name(&self) -> &'static str {
        self.classifier.model_name()
    }
}
