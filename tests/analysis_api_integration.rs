//! Integration tests for the analysis submit/poll API.
//!
//! Each test spins up an Axum server on a random port and exercises the real
//! REST contract with reqwest against a stub LLM provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::timeout;

use codexpert_analysis::analysis::{Analyzer, JobRegister, analysis_routes};
use codexpert_analysis::config::AnalysisConfig;
use codexpert_analysis::error::LlmError;
use codexpert_analysis::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const REVIEW: &str = r#"{"qualityScore":80,"improvementPoints":[{"line":3,"point":"avoid global var"}],"improvedCode":"let x=1;"}"#;

/// Stub provider steered by markers in the submitted code:
/// `WAIT` holds the reply until released, `FAIL` simulates a network error,
/// `GARBAGE` replies with prose instead of JSON.
struct StubLlm {
    release: Notify,
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }
    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.conversation_text();
        if prompt.contains("WAIT") {
            self.release.notified().await;
        }
        if prompt.contains("FAIL") {
            return Err(LlmError::RequestFailed {
                provider: "stub".into(),
                reason: "connection refused (os error 111)".into(),
            });
        }
        let content = if prompt.contains("GARBAGE") {
            "I'm not able to review this code.".to_string()
        } else {
            format!("```json\n{REVIEW}\n```")
        };
        Ok(CompletionResponse {
            content,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

/// Start an Axum server on a random port, return (base url, stub).
async fn start_server() -> (String, Arc<StubLlm>) {
    let stub = Arc::new(StubLlm {
        release: Notify::new(),
    });
    let config = AnalysisConfig::default();
    let register = JobRegister::new(config.retention);
    let llm: Arc<dyn LlmProvider> = stub.clone();
    let app = analysis_routes(Analyzer::new(llm, register, config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}"), stub)
}

async fn submit(base: &str, path: &str, code: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&serde_json::json!({ "code": code }))
        .send()
        .await
        .unwrap()
}

async fn poll(base: &str, job_id: &str) -> (reqwest::StatusCode, Value) {
    let resp = reqwest::get(format!("{base}/api/code/jobs/{job_id}"))
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

/// Poll until the job leaves `pending`.
async fn poll_until_terminal(base: &str, job_id: &str) -> Value {
    loop {
        let (status, json) = poll(base, job_id).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        if json["status"] != "pending" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn job_id_of(resp: reqwest::Response) -> String {
    assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
    let json: Value = resp.json().await.unwrap();
    json["jobId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn review_job_goes_pending_then_complete() {
    timeout(TEST_TIMEOUT, async {
        let (base, stub) = start_server().await;

        let job_id = job_id_of(submit(&base, "/api/code/review", "WAIT var x = 1;").await).await;

        let (status, json) = poll(&base, &job_id).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(json["status"], "pending");
        assert!(json["result"].is_null());

        stub.release.notify_one();

        let json = poll_until_terminal(&base, &job_id).await;
        assert_eq!(json["status"], "complete");
        assert_eq!(json["kind"], "review");
        assert_eq!(json["result"]["qualityScore"], 80);
        assert_eq!(json["result"]["improvementPoints"].as_array().unwrap().len(), 1);
        assert_eq!(json["result"]["improvedCode"], "let x=1;");

        // Terminal state is stable across polls.
        let (_, again) = poll(&base, &job_id).await;
        assert_eq!(again, json);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn provider_failure_surfaces_generic_error() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_server().await;

        let job_id = job_id_of(submit(&base, "/api/code/review", "FAIL").await).await;
        let json = poll_until_terminal(&base, &job_id).await;

        assert_eq!(json["status"], "error");
        let message = json["result"]["message"].as_str().unwrap();
        assert!(!message.is_empty());
        assert!(!message.contains("connection refused"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unparseable_reply_surfaces_error() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_server().await;

        let job_id = job_id_of(submit(&base, "/api/code/bugs", "GARBAGE").await).await;
        let json = poll_until_terminal(&base, &job_id).await;

        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "bugs");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_server().await;

        let (status, json) = poll(&base, "00000000000000000000000000000000").await;
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Job not found");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_code_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_server().await;

        let resp = submit(&base, "/api/code/comments", "").await;
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn comments_job_returns_code_text() {
    timeout(TEST_TIMEOUT, async {
        let (base, _stub) = start_server().await;

        let job_id = job_id_of(submit(&base, "/api/code/comments", "let x = 1;").await).await;
        let json = poll_until_terminal(&base, &job_id).await;

        // The stub always answers with the fenced review JSON; the comments
        // flow keeps whatever is inside the fence as the commented code.
        assert_eq!(json["status"], "complete");
        assert_eq!(json["result"]["commentedCode"], REVIEW);
    })
    .await
    .expect("test timed out");
}
