//! Bridges rig-core completion models to `LlmProvider`.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionError, CompletionModel};
use rig::http_client;
use rust_decimal::Decimal;
use serde_json::Value;

use super::costs;
use super::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::error::LlmError;

/// Wraps any rig `CompletionModel`. Each call is a single completion request
/// so the analysis kind can carry its own preamble.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        costs::model_cost(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = self
            .model
            .completion_request(request.conversation_text())
            .temperature_opt(request.temperature.map(f64::from))
            .max_tokens_opt(request.max_tokens.map(u64::from));
        if let Some(system) = request.system_prompt() {
            builder = builder.preamble(system);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_completion_error(self.provider, e))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text()),
                _ => None,
            })
            .collect();
        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "reply carried no text".to_string(),
            });
        }

        let raw = serde_json::to_value(&response.raw_response).unwrap_or(Value::Null);
        let response_id = raw
            .get("id")
            .or_else(|| raw.get("responseId"))
            .and_then(Value::as_str)
            .map(String::from);

        Ok(CompletionResponse {
            content,
            input_tokens: saturate(response.usage.input_tokens),
            output_tokens: saturate(response.usage.output_tokens),
            finish_reason: finish_reason_from_raw(&raw),
            response_id,
        })
    }
}

fn saturate(tokens: u64) -> u32 {
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

/// rig's generic response has no stop reason, so read it off the
/// provider's raw payload (Anthropic, OpenAI Responses, Gemini).
fn finish_reason_from_raw(raw: &Value) -> FinishReason {
    if let Some(reason) = raw.get("stop_reason").and_then(Value::as_str) {
        return match reason {
            "end_turn" | "stop_sequence" | "tool_use" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            "refusal" => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        };
    }

    if let Some(reason) = raw.pointer("/incomplete_details/reason").and_then(Value::as_str) {
        return match reason {
            "max_output_tokens" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        };
    }
    if let Some(status) = raw.get("status").and_then(Value::as_str) {
        return match status {
            "completed" => FinishReason::Stop,
            _ => FinishReason::Unknown,
        };
    }

    match raw.pointer("/candidates/0/finishReason").and_then(Value::as_str) {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Unknown,
    }
}

fn map_completion_error(provider: &str, err: CompletionError) -> LlmError {
    let status = match &err {
        CompletionError::HttpError(http_client::Error::InvalidStatusCode(status))
        | CompletionError::HttpError(http_client::Error::InvalidStatusCodeWithMessage(status, _)) => {
            Some(status.as_u16())
        }
        _ => None,
    };

    match (status, err) {
        (Some(429), _) => LlmError::RateLimited {
            provider: provider.to_string(),
        },
        (Some(401 | 403), _) => LlmError::AuthFailed {
            provider: provider.to_string(),
        },
        (_, CompletionError::JsonError(e)) => LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: e.to_string(),
        },
        (_, CompletionError::ResponseError(reason)) => LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason,
        },
        (_, e) => LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: e.to_string(),
        },
    }
}
