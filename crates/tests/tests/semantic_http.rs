use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use komal_core::{AnalysisRequest, Decision, ModerationPolicy, SemanticResult};
use komal_engine::ModerationEngine;
use komal_ml::{ClassifierError, HttpSemanticClassifier, SemanticClassifier, SemanticStack};
use komal_observability::AppMetrics;
use komal_taxonomy::TaxonomyStore;
use serde_json::{json, Value};

fn taxonomy() -> TaxonomyStore {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../taxonomy/moderation_taxonomy.csv");
    TaxonomyStore::from_path(path).expect("fixture taxonomy should load")
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/classify")
}

/// Answers with the first category it was offered.
async fn spawn_echo_classifier() -> String {
    let app = Router::new().route(
        "/classify",
        post(|Json(body): Json<Value>| async move {
            Json(json!({
                "label": body["categories"][0].as_str().unwrap_or("none"),
                "confidence": 1.7,
                "similarity": 0.8
            }))
        }),
    );
    spawn(app).await
}

async fn spawn_failing_classifier() -> String {
    let app = Router::new().route("/classify", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    spawn(app).await
}

#[tokio::test]
async fn remote_classifier_receives_taxonomy_labels() {
    let url = spawn_echo_classifier().await;
    let taxonomy = taxonomy();
    let classifier = HttpSemanticClassifier::new(url, Duration::from_secs(2)).unwrap();

    let result = classifier
        .classify("anything", taxonomy.category_labels())
        .await
        .unwrap();

    assert_eq!(result.label, "Violence & Disturbing Content");
    assert_eq!(result.confidence, 1.0);
    assert_eq!(result.similarity, 0.8);
}

#[tokio::test]
async fn remote_status_errors_surface() {
    let url = spawn_failing_classifier().await;
    let classifier = HttpSemanticClassifier::new(url, Duration::from_secs(2)).unwrap();

    let result = classifier.classify("anything", &[]).await;
    assert!(matches!(result, Err(ClassifierError::Status(503))));
}

#[tokio::test]
async fn engine_uses_remote_scores() {
    let url = spawn_echo_classifier().await;
    let timeout = Duration::from_secs(2);
    let classifier = HttpSemanticClassifier::new(url, timeout).unwrap();
    let engine = ModerationEngine::new(
        Arc::new(taxonomy()),
        ModerationPolicy::default(),
        SemanticStack::new(Arc::new(classifier), timeout),
        AppMetrics::shared(),
    );

    let result = engine
        .analyze(AnalysisRequest::new("remote-1", "grab a beer", "16+"))
        .await
        .unwrap();

    assert_eq!(result.category_analysis.subcategory.as_deref(), Some("Alcohol & Drugs"));
    assert_eq!(result.final_decision.weighted_score, 1.0);
    assert_eq!(result.final_decision.decision, Decision::Flag);
}

#[tokio::test]
async fn engine_falls_back_when_remote_fails() {
    let url = spawn_failing_classifier().await;
    let timeout = Duration::from_secs(2);
    let classifier = HttpSemanticClassifier::new(url, timeout).unwrap();
    let metrics = AppMetrics::shared();
    let engine = ModerationEngine::new(
        Arc::new(taxonomy()),
        ModerationPolicy::default(),
        SemanticStack::new(Arc::new(classifier), timeout),
        metrics.clone(),
    );

    let result = engine
        .analyze(AnalysisRequest::new("remote-2", "grab a beer", "16+"))
        .await
        .unwrap();

    assert_eq!(result.semantic_analysis, SemanticResult::fallback());
    assert_eq!(result.final_decision.weighted_score, 0.44);
    assert_eq!(metrics.snapshot().semantic_fallback_total, 1);
}
