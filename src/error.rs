//! Error types for the CodeXpert analysis service.

use std::time::Duration;

use crate::analysis::model::JobId;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors. Every variant is a provider-call failure from the
/// worker's point of view.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },
}

/// Provider reply could not be interpreted as the expected structured shape.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Provider reply was empty")]
    Empty,

    #[error("Provider reply is not valid JSON for this analysis: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Job register errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} not found")]
    NotFound { id: JobId },

    #[error("Job {id} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: JobId,
        state: String,
        target: String,
    },
}

/// Failure of a single analysis worker run. Never shown to pollers verbatim.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Provider call failed: {0}")]
    Provider(#[from] LlmError),

    #[error("Response parse failed: {0}")]
    Parse(#[from] DecodeError),
}
