use crate::phase::{Phase, Trigger};
use std::path::PathBuf;

/// Failures of a single `AiGateway::call_ai` call, after the gateway's own retries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AiError {
    #[error("sign in required: {0}")]
    AuthRequired(String),
    #[error("rate limited by the AI service")]
    RateLimited,
    #[error("AI service unavailable: {details}")]
    Upstream { status: Option<u16>, details: String },
    #[error("malformed AI response: {0}")]
    Malformed(String),
}

impl AiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AiError::Upstream { status, .. } => *status,
            AiError::RateLimited => Some(429),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AiError::AuthRequired(_) => "auth_required",
            AiError::RateLimited => "rate_limited",
            AiError::Upstream { .. } => "upstream_error",
            AiError::Malformed(_) => "malformed_response",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone unavailable: {0}")]
    Unavailable(String),
    #[error("a capture is already running")]
    Busy,
    #[error("failed to encode audio: {0}")]
    Encoding(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid event catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no training examples found for event {0}")]
    NoExamples(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report store rejected the report: {0}")]
    Store(String),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {trigger:?} while in {from:?}")]
pub struct TransitionError {
    pub from: Phase,
    pub trigger: Trigger,
}

/// Categorized session failures, as surfaced to the user by the phase engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("sign in required: {0}")]
    AuthRequired(String),
    #[error("AI service unavailable: {0}")]
    UpstreamService(String),
    #[error("rate limited by the AI service")]
    RateLimited,
    #[error("malformed AI response: {0}")]
    MalformedResponse(String),
    #[error("microphone unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("no training examples found for event {0}")]
    NoExamplesFound(String),
    #[error("event catalog error: {0}")]
    Catalog(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("{0}")]
    InvalidInput(String),
}

impl SessionError {
    /// The text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::AuthRequired(_) => {
                "Sign in is required to use AI roleplay features. Please sign in from the Account page."
                    .to_string()
            }
            SessionError::UpstreamService(_) => {
                "The AI service is currently unavailable. Please try again in a moment.".to_string()
            }
            SessionError::RateLimited => {
                "The AI service is receiving too many requests. Please try again in a moment."
                    .to_string()
            }
            SessionError::MalformedResponse(_) => {
                "The AI service returned an unexpected response. Please try again.".to_string()
            }
            SessionError::CaptureUnavailable(_) => {
                "Microphone unavailable. The session will continue without audio.".to_string()
            }
            SessionError::NoExamplesFound(_) => {
                "No training examples found for this event.".to_string()
            }
            other => format!("Something went wrong: {other}"),
        }
    }
}

impl From<AiError> for SessionError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::AuthRequired(message) => SessionError::AuthRequired(message),
            AiError::RateLimited => SessionError::RateLimited,
            AiError::Upstream { details, .. } => SessionError::UpstreamService(details),
            AiError::Malformed(details) => SessionError::MalformedResponse(details),
        }
    }
}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        SessionError::CaptureUnavailable(err.to_string())
    }
}

impl From<CatalogError> for SessionError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NoExamples(event) => SessionError::NoExamplesFound(event),
            other => SessionError::Catalog(other.to_string()),
        }
    }
}
