//! Application Configuration Module
//!
//! Loads the practice runtime's settings from environment variables (and a
//! `.env` file when present) into a single struct that the binary passes to
//! the gateway client, the report store and the phase engine.

use ai_gateway::consts;
use roleplay_core::judging::JudgingMode;
use roleplay_core::session::{QaTiming, SessionConfig};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

// --- Application Constants ---

/// Where finished reports are appended when no backend is configured.
pub const DEFAULT_REPORTS_FILE: &str = "reports.jsonl";
/// Root directory of the event catalog and its reference material.
pub const DEFAULT_EVENTS_DIR: &str = "data/roleplay";
pub const DEFAULT_PLANNING_SECS: u64 = 20 * 60;
pub const DEFAULT_PRESENTATION_SECS: u64 = 7 * 60;
pub const DEFAULT_QA_SECONDS: u64 = 60;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_url: String,
    pub chat_model: String,
    pub auth_token: Option<String>,
    /// When set, reports are posted to this backend instead of the local file.
    pub reports_url: Option<String>,
    pub reports_file: PathBuf,
    pub events_dir: PathBuf,
    pub judging_mode: JudgingMode,
    pub qa_timing: QaTiming,
    pub planning: Duration,
    pub presentation: Duration,
    pub qa_answer: Duration,
    pub trim_silence: bool,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GATEWAY_URL`: Base URL of the chat-completion proxy. Defaults to "http://localhost:3000".
    // *   `CHAT_MODEL`: (Optional) Model requested from the proxy.
    // *   `AUTH_TOKEN`: (Optional) Bearer token of the signed in user.
    // *   `REPORTS_URL`: (Optional) Backend that stores practice reports.
    // *   `REPORTS_FILE`, `EVENTS_DIR`: (Optional) Local paths.
    // *   `JUDGING_MODE`: "panel" or "parallel". `QA_TIMING`: "before" or "after".
    // *   `PLANNING_SECS`, `PRESENTATION_SECS`, `QA_SECONDS`: (Optional) Phase lengths.
    // *   `TRIM_SILENCE`: (Optional) Trim leading and trailing silence from recordings.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let judging_mode = match var("JUDGING_MODE").as_deref().map(str::to_lowercase) {
            None => JudgingMode::Panel,
            Some(mode) => match mode.as_str() {
                "panel" => JudgingMode::Panel,
                "parallel" => JudgingMode::Parallel,
                _ => return Err(invalid("JUDGING_MODE", &mode)),
            },
        };

        let qa_timing = match var("QA_TIMING").as_deref().map(str::to_lowercase) {
            None => QaTiming::Before,
            Some(timing) => match timing.as_str() {
                "before" => QaTiming::Before,
                "after" => QaTiming::After,
                _ => return Err(invalid("QA_TIMING", &timing)),
            },
        };

        let seconds = |key: &str, default: u64| -> Result<Duration, ConfigError> {
            match var(key) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => match raw.parse::<u64>() {
                    Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
                    _ => Err(invalid(key, &raw)),
                },
            }
        };

        let trim_silence = match var("TRIM_SILENCE").as_deref().map(str::to_lowercase) {
            None => true,
            Some(flag) => match flag.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid("TRIM_SILENCE", &flag)),
            },
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gateway_url: var("GATEWAY_URL").unwrap_or_else(|| consts::BASE_URL.to_string()),
            chat_model: var("CHAT_MODEL").unwrap_or_else(|| consts::DEFAULT_MODEL.to_string()),
            auth_token: var(consts::AUTH_TOKEN),
            reports_url: var("REPORTS_URL"),
            reports_file: PathBuf::from(
                var("REPORTS_FILE").unwrap_or_else(|| DEFAULT_REPORTS_FILE.to_string()),
            ),
            events_dir: PathBuf::from(
                var("EVENTS_DIR").unwrap_or_else(|| DEFAULT_EVENTS_DIR.to_string()),
            ),
            judging_mode,
            qa_timing,
            planning: seconds("PLANNING_SECS", DEFAULT_PLANNING_SECS)?,
            presentation: seconds("PRESENTATION_SECS", DEFAULT_PRESENTATION_SECS)?,
            qa_answer: seconds("QA_SECONDS", DEFAULT_QA_SECONDS)?,
            trim_silence,
            log_level,
        })
    }

    /// The phase engine's settings, starting from its defaults.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            planning: self.planning,
            presentation: self.presentation,
            qa_answer: self.qa_answer,
            qa_timing: self.qa_timing,
            judging_mode: self.judging_mode,
            events_root: self.events_dir.clone(),
            ..SessionConfig::default()
        }
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), value.to_string())
}
