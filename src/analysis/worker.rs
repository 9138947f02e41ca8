//! Analysis worker: runs one provider call per job and resolves the job exactly once.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::decode;
use super::model::{AnalysisKind, AnalysisResult, JobId, JobState};
use super::prompts;
use super::register::JobRegister;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, LlmError};
use crate::llm::costs;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};

/// What pollers see when a job fails. Technical detail stays in the logs.
pub const GENERIC_FAILURE_MESSAGE: &str = "Code analysis failed. Please try again later.";

/// Submits analysis jobs and owns the worker logic. Cheap to clone.
#[derive(Clone)]
pub struct Analyzer {
    llm: Arc<dyn LlmProvider>,
    register: Arc<JobRegister>,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(llm: Arc<dyn LlmProvider>, register: Arc<JobRegister>, config: AnalysisConfig) -> Self {
        Self {
            llm,
            register,
            config,
        }
    }

    pub fn register(&self) -> &Arc<JobRegister> {
        &self.register
    }

    /// Create a job and start its worker without waiting for it.
    pub async fn submit(&self, kind: AnalysisKind, code: String) -> JobId {
        let id = self.register.create_job(kind).await;

        let worker = self.clone();
        let job_id = id.clone();
        let handle = tokio::spawn(async move {
            worker.run_job(job_id, kind, code).await;
        });
        self.register.attach_worker(&id, handle.abort_handle()).await;

        info!(job_id = %id, kind = %kind, model = %self.llm.model_name(), "Analysis job submitted");
        id
    }

    async fn run_job(&self, id: JobId, kind: AnalysisKind, code: String) {
        let state = match self.analyze(kind, &code).await {
            Ok(result) => JobState::Complete(result),
            Err(e) => {
                error!(job_id = %id, kind = %kind, error = %e, "Code analysis failed");
                JobState::Error {
                    message: GENERIC_FAILURE_MESSAGE.to_string(),
                }
            }
        };

        if let Err(e) = self.register.record_result(&id, state).await {
            // Evicted while running, or already resolved.
            warn!(job_id = %id, error = %e, "Could not record analysis result");
        }
    }

    /// Call the provider and decode its reply for `kind`.
    pub async fn analyze(
        &self,
        kind: AnalysisKind,
        code: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::system_prompt(kind)),
            ChatMessage::user(prompts::user_prompt(code)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let timeout = self.config.provider_timeout;
        let response = tokio::time::timeout(timeout, self.llm.complete(request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout,
            })??;

        let cost = costs::estimate(
            self.llm.cost_per_token(),
            response.input_tokens,
            response.output_tokens,
        );
        info!(
            kind = %kind,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %cost,
            "Provider replied"
        );
        if response.finish_reason == FinishReason::Length {
            warn!(kind = %kind, "Provider reply hit the token limit and may be truncated");
        }

        Ok(decode::decode(kind, &response.content)?)
    }
}
