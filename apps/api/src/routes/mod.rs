pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

/// Résumé PDFs plus a full scrape of postings.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Assessment API
        .route("/api/v1/assessments", post(handlers::handle_assess))
        .route("/api/v1/assessments/upload", post(handlers::handle_upload))
        .route("/api/v1/assessments/cancel", post(handlers::handle_cancel))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::pipeline::test_support::{ScriptedService, WordEstimator};
    use crate::pipeline::PipelineConfig;

    fn state_with(service: ScriptedService) -> AppState {
        let pipeline = PipelineConfig {
            inter_batch_delay: Duration::ZERO,
            ..Default::default()
        };
        AppState::new(Arc::new(service), Arc::new(WordEstimator), pipeline)
    }

    fn state() -> AppState {
        state_with(ScriptedService::echo())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn postings(n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| {
                    json!({
                        "title": "Backend Engineer",
                        "company": "Acme",
                        "location": "Remote",
                        "description": "Rust, Tokio, Postgres",
                        "job_url": format!("https://jobs.example.com/{i}")
                    })
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let response = build_router(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "jobfit");
    }

    #[tokio::test]
    async fn test_assess_returns_report() {
        let response = build_router(state())
            .oneshot(post_json(
                "/api/v1/assessments",
                json!({ "records": postings(3), "resume_text": "Rust engineer, 6 years" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["outcome"], "complete");
        assert_eq!(body["assessments"].as_array().unwrap().len(), 3);
        assert_eq!(body["counts"]["offered"], 3);
        assert_eq!(body["counts"]["resolved"], 3);
        assert_eq!(body["analytics"]["top_companies"][0]["value"], "Acme");
    }

    #[tokio::test]
    async fn test_empty_records_complete_without_results() {
        let response = build_router(state())
            .oneshot(post_json(
                "/api/v1/assessments",
                json!({ "records": [], "resume_text": "Rust engineer" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["outcome"], "complete");
        assert!(body["assessments"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_results_is_not_an_error() {
        let service = ScriptedService::new(vec![
            Ok("nope".into()),
            Ok("nope".into()),
            Ok("nope".into()),
        ]);
        let mut state = state_with(service);
        state.pipeline.retry.base_delay = Duration::ZERO;

        let response = build_router(state)
            .oneshot(post_json(
                "/api/v1/assessments",
                json!({ "records": postings(2), "resume_text": "Rust engineer" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["outcome"], "no_results");
        assert_eq!(body["counts"]["lost_by_batch_failure"], 2);
    }

    #[tokio::test]
    async fn test_record_without_url_is_rejected() {
        let mut records = postings(2);
        records.as_array_mut().unwrap().push(json!({ "title": "Mystery role" }));

        let response = build_router(state())
            .oneshot(post_json(
                "/api/v1/assessments",
                json!({ "records": records, "resume_text": "Rust engineer" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].as_str().unwrap().contains("Record 2"));
    }

    #[tokio::test]
    async fn test_blank_resume_is_unprocessable() {
        let response = build_router(state())
            .oneshot(post_json(
                "/api/v1/assessments",
                json!({ "records": postings(1), "resume_text": "   " }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_while_one_is_active() {
        let state = state();
        let _active = state.run_gate.clone().try_lock_owned().unwrap();

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/v1/assessments",
                json!({ "records": postings(1), "resume_text": "Rust engineer" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cancel_is_accepted() {
        let state = state();
        let response = build_router(state.clone())
            .oneshot(
                Request::post("/api/v1/assessments/cancel")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(state.control.is_cancelled());
    }

    fn multipart(parts: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, content) in parts {
            body.push_str("--BOUNDARY\r\n");
            body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str("--BOUNDARY--\r\n");

        Request::post("/api/v1/assessments/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_with_unreadable_pdf_is_unprocessable() {
        let records = postings(1).to_string();
        let response = build_router(state())
            .oneshot(multipart(&[("resume", "this is not a pdf"), ("records", &records)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_upload_without_resume_is_rejected() {
        let records = postings(1).to_string();
        let response = build_router(state())
            .oneshot(multipart(&[("records", &records)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
