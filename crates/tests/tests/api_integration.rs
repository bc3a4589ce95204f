use std::path::PathBuf;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use komal_api::build_app;
use serde_json::{json, Value};
use tower::ServiceExt;

fn taxonomy_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../taxonomy/moderation_taxonomy.csv")
}

fn app() -> Router {
    build_app(taxonomy_path()).expect("app should build")
}

fn analyze_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_reports_taxonomy_and_model() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["status"], "healthy");
    assert_eq!(parsed["service"], "komal-moderation");
    assert_eq!(parsed["taxonomy"]["rules"], 10);
    assert_eq!(parsed["taxonomy"]["categories"], 6);
    assert_eq!(parsed["semanticModel"], "heuristic-semantic-v1");
    assert!(parsed["timestampUtc"].is_string());
}

#[tokio::test]
async fn root_serves_health_too() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn violent_text_is_flagged() {
    let response = app()
        .oneshot(analyze_request(
            "/analyze",
            json!({
                "contentId": "post-1",
                "text": "He wants to kill someone",
                "ageGroup": "13-16"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let parsed = json_body(response).await;
    assert_eq!(parsed["contentId"], "post-1");
    assert_eq!(parsed["categoryAnalysis"]["primaryCategory"], "Violence & Disturbing Content");
    assert_eq!(parsed["categoryAnalysis"]["subcategory"], "Threats & Harm");
    assert_eq!(parsed["categoryAnalysis"]["confidence"], 1.0);
    assert_eq!(parsed["categoryAnalysis"]["matchedKeywords"], json!(["kill"]));
    assert_eq!(parsed["categoryAnalysis"]["ageRestriction"], "Gate");
    assert_eq!(parsed["semanticAnalysis"]["label"], "Violence & Disturbing Content");
    assert_eq!(parsed["finalDecision"]["weightedScore"], 0.965);
    assert_eq!(parsed["finalDecision"]["decision"], "FLAG");
    assert_eq!(parsed["finalDecision"]["actionRequired"], "Block/Review Required");
    assert!(parsed["metadata"]["processingTimeMs"].is_u64());
    assert!(parsed["metadata"]["timestamp"].is_string());
}

#[tokio::test]
async fn young_audiences_hit_the_age_block() {
    let response = app()
        .oneshot(analyze_request(
            "/v1/analyze",
            json!({ "text": "He wants to kill someone", "ageGroup": "<10" }),
        ))
        .await
        .unwrap();

    let parsed = json_body(response).await;
    assert_eq!(parsed["finalDecision"]["weightedScore"], 1.0);
    assert_eq!(parsed["finalDecision"]["actionRequired"], "Blocked by Age Rule");
    assert_eq!(parsed["finalDecision"]["reasoning"], "Content blocked for age group <10.");
}

#[tokio::test]
async fn sex_education_keeps_full_confidence() {
    let response = app()
        .oneshot(analyze_request(
            "/analyze",
            json!({ "text": "Sex education helps teens make safe choices" }),
        ))
        .await
        .unwrap();

    let parsed = json_body(response).await;
    assert_eq!(parsed["categoryAnalysis"]["subcategory"], "Sex Education");
    assert_eq!(parsed["categoryAnalysis"]["confidence"], 1.0);
    assert_eq!(parsed["categoryAnalysis"]["ageRestriction"], "Allow");
}

#[tokio::test]
async fn neutral_identity_terms_pass() {
    let response = app()
        .oneshot(analyze_request(
            "/analyze",
            json!({ "text": "A woman walked into the room" }),
        ))
        .await
        .unwrap();

    let parsed = json_body(response).await;
    assert_eq!(parsed["contentId"], "api-request");
    assert_eq!(parsed["categoryAnalysis"]["primaryCategory"], Value::Null);
    assert_eq!(parsed["categoryAnalysis"]["confidence"], 0.0);
    assert_eq!(parsed["categoryAnalysis"]["matchedKeywords"], json!([]));
    assert_eq!(parsed["semanticAnalysis"]["label"], "General");
    assert_eq!(parsed["finalDecision"]["weightedScore"], 0.14);
    assert_eq!(parsed["finalDecision"]["decision"], "PASS");
    assert_eq!(parsed["finalDecision"]["actionRequired"], "Allow with monitoring");
}

#[tokio::test]
async fn snake_case_fields_are_accepted() {
    let response = app()
        .oneshot(analyze_request(
            "/analyze",
            json!({ "content_id": "legacy-7", "text": "kill", "age_group": "16+" }),
        ))
        .await
        .unwrap();

    let parsed = json_body(response).await;
    assert_eq!(parsed["contentId"], "legacy-7");
    assert_eq!(parsed["categoryAnalysis"]["ageRestriction"], "Allow");
}

#[tokio::test]
async fn empty_text_is_a_bad_request() {
    let response = app()
        .oneshot(analyze_request("/analyze", json!({ "text": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let parsed = json_body(response).await;
    assert_eq!(parsed["error"], "invalid_request");
    assert_eq!(parsed["message"], "text content is required");
}

#[tokio::test]
async fn missing_text_is_a_bad_request() {
    let response = app()
        .oneshot(analyze_request("/analyze", json!({ "contentId": "no-text" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sixteen_to_eighteen_is_not_a_request_band() {
    let response = app()
        .oneshot(analyze_request(
            "/analyze",
            json!({ "text": "He wants to kill someone", "ageGroup": "16-18" }),
        ))
        .await
        .unwrap();

    let parsed = json_body(response).await;
    assert_eq!(parsed["categoryAnalysis"]["ageRestriction"], "Gate");
}

#[tokio::test]
async fn malformed_json_is_rejected_as_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from("{\"text\": "))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn health_counts_analyzed_requests() {
    let app = app();

    for text in ["kill", "A woman walked into the room"] {
        let response = app
            .clone()
            .oneshot(analyze_request("/analyze", json!({ "text": text })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let metrics = json_body(response).await["metrics"].clone();

    assert_eq!(metrics["requestsTotal"], 2);
    assert_eq!(metrics["flaggedTotal"], 1);
    assert_eq!(metrics["passedTotal"], 1);
    assert_eq!(metrics["semanticFallbackTotal"], 0);
}
