use std::time::Duration;

use async_trait::async_trait;
use komal_core::SemanticResult;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{ClassifierError, SemanticClassifier};

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    categories: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
    confidence: f64,
    #[serde(default)]
    similarity: f64,
}

/// Client for a remote embedding / vector-search classifier.
#[derive(Debug, Clone)]
pub struct HttpSemanticClassifier {
    client: Client,
    endpoint: String,
}

impl HttpSemanticClassifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(6)))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SemanticClassifier for HttpSemanticClassifier {
    fn model_name(&self) -> &'static str {
        "http-semantic"
    }

    async fn classify(&self, text: &str, labels: &[String]) -> Result<SemanticResult, ClassifierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest {
                text,
                categories: labels,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let payload: ClassifyResponse = response.json().await?;
        if payload.label.trim().is_empty() {
            return Err(ClassifierError::InvalidResponse("empty label".to_string()));
        }
        if !payload.confidence.is_finite() || !payload.similarity.is_finite() {
            return Err(ClassifierError::InvalidResponse(
                "non-finite confidence or similarity".to_string(),
            ));
        }

        Ok(SemanticResult::new(
            payload.label,
            payload.confidence,
            payload.similarity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let classifier =
            HttpSemanticClassifier::new("http://127.0.0.1:9/classify", Duration::from_millis(300))
                .unwrap();
        let result = classifier.classify("some text", &[]).await;
        assert!(matches!(result, Err(ClassifierError::Http(_))));
    }
}
