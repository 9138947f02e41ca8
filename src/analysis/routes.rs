//! REST endpoints for submitting and polling analysis jobs.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::debug;

use super::model::{AnalysisKind, JobId};
use super::worker::Analyzer;

/// Build the analysis router.
pub fn analysis_routes(analyzer: Analyzer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/code/review", post(submit_review))
        .route("/api/code/bugs", post(submit_bugs))
        .route("/api/code/comments", post(submit_comments))
        .route("/api/code/jobs/{id}", get(poll_job))
        .layer(CorsLayer::permissive())
        .with_state(analyzer)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(analyzer): State<Analyzer>) -> impl IntoResponse {
    let register = analyzer.register();
    Json(serde_json::json!({
        "status": "ok",
        "service": "codexpert-analysis",
        "jobs": register.len().await,
        "pending": register.pending_count().await,
    }))
}

// ── Submit ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    code: Option<String>,
}

type SubmitBody = Result<Json<SubmitRequest>, JsonRejection>;

async fn submit_review(State(analyzer): State<Analyzer>, body: SubmitBody) -> impl IntoResponse {
    submit(&analyzer, AnalysisKind::Review, body).await
}

async fn submit_bugs(State(analyzer): State<Analyzer>, body: SubmitBody) -> impl IntoResponse {
    submit(&analyzer, AnalysisKind::Bugs, body).await
}

async fn submit_comments(State(analyzer): State<Analyzer>, body: SubmitBody) -> impl IntoResponse {
    submit(&analyzer, AnalysisKind::Comments, body).await
}

async fn submit(
    analyzer: &Analyzer,
    kind: AnalysisKind,
    body: SubmitBody,
) -> (StatusCode, Json<serde_json::Value>) {
    let code = match body {
        Ok(Json(SubmitRequest { code: Some(code) })) if !code.trim().is_empty() => code,
        Ok(_) => return bad_request("Code is required"),
        Err(rejection) => {
            debug!(kind = %kind, error = %rejection.body_text(), "Rejected submit body");
            return bad_request("Invalid request body");
        }
    };

    let job_id = analyzer.submit(kind, code).await;
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"jobId": job_id})),
    )
}

fn bad_request(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
}

// ── Poll ────────────────────────────────────────────────────────────────

async fn poll_job(State(analyzer): State<Analyzer>, Path(id): Path<String>) -> impl IntoResponse {
    // Lookup only ever fails with "not found".
    match analyzer.register().get_job(&JobId::from(id)).await {
        Ok(job) => (StatusCode::OK, Json(serde_json::json!(job))),
        Err(e) => {
            debug!(error = %e, "Poll for unknown job");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Job not found"})),
            )
        }
    }
}
