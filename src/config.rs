//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Job register and worker configuration.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Upper bound on a single provider call.
    pub provider_timeout: Duration,
    /// Job entries older than this are evicted; later polls see "not found".
    pub retention: Duration,
    /// How often the retention sweep runs.
    pub sweep_interval: Duration,
    /// Sampling temperature for analysis prompts.
    pub temperature: f32,
    /// Max tokens for the provider reply. Improved code can be long.
    pub max_tokens: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(120),
            retention: Duration::from_secs(60 * 60), // 1 hour
            sweep_interval: Duration::from_secs(60),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

impl AnalysisConfig {
    /// Read overrides from `CODEXPERT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timeout_secs = parse_var::<u64>(&lookup, "CODEXPERT_PROVIDER_TIMEOUT_SECS")
            .unwrap_or(defaults.provider_timeout.as_secs());
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CODEXPERT_PROVIDER_TIMEOUT_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }

        let retention_min = parse_var::<u64>(&lookup, "CODEXPERT_JOB_RETENTION_MIN")
            .unwrap_or(defaults.retention.as_secs() / 60);
        if retention_min == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CODEXPERT_JOB_RETENTION_MIN".into(),
                message: "must be greater than zero".into(),
            });
        }
        let retention_secs = retention_min
            .checked_mul(60)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "CODEXPERT_JOB_RETENTION_MIN".into(),
                message: format!("{retention_min} minutes is out of range"),
            })?;

        let sweep_secs = parse_var::<u64>(&lookup, "CODEXPERT_SWEEP_INTERVAL_SECS")
            .filter(|s| *s > 0)
            .unwrap_or(defaults.sweep_interval.as_secs());

        Ok(Self {
            provider_timeout: Duration::from_secs(timeout_secs),
            retention: Duration::from_secs(retention_secs),
            sweep_interval: Duration::from_secs(sweep_secs),
            temperature: parse_var(&lookup, "CODEXPERT_TEMPERATURE").unwrap_or(defaults.temperature),
            max_tokens: parse_var(&lookup, "CODEXPERT_MAX_TOKENS").unwrap_or(defaults.max_tokens),
        })
    }
}

/// Process-level settings for the server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory for rolling log files. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match lookup("CODEXPERT_LLM_BACKEND") {
            Some(raw) => raw.parse::<LlmBackend>().map_err(|message| ConfigError::InvalidValue {
                key: "CODEXPERT_LLM_BACKEND".into(),
                message,
            })?,
            None => LlmBackend::Gemini,
        };

        let key_var = backend.api_key_env();
        let api_key = lookup("CODEXPERT_API_KEY")
            .or_else(|| lookup(key_var))
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(format!("CODEXPERT_API_KEY or {key_var}")))?;

        let model = lookup("CODEXPERT_MODEL").unwrap_or_else(|| backend.default_model().to_string());

        Ok(Self {
            port: parse_var(&lookup, "CODEXPERT_PORT").unwrap_or(5000),
            log_dir: lookup("CODEXPERT_LOG_DIR").map(PathBuf::from),
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            analysis: AnalysisConfig::from_lookup(&lookup)?,
        })
    }
}

/// Parse a variable, treating unparseable values as unset.
fn parse_var<T: std::str::FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
