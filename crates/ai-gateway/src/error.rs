/// Failures of a single proxied chat-completion call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("rate limited by the AI service")]
    RateLimited,
    #[error("sign in required (HTTP {status}): {message}")]
    AuthRequired { status: u16, message: String },
    #[error("AI service unavailable: {details}")]
    Upstream { status: Option<u16>, details: String },
    #[error("malformed AI response: {0}")]
    Malformed(String),
}

impl GatewayError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        Self::Upstream {
            status: err.status().map(|s| s.as_u16()),
            details: err.to_string(),
        }
    }
}

/// Pulls a human readable reason out of an error body returned by the proxy.
/// The proxy answers with `{ error, status, details }`; other backends use `message`.
pub(crate) fn error_details(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["details", "message", "error"] {
            match value.get(key) {
                Some(serde_json::Value::String(text)) if !text.is_empty() => {
                    return text.clone();
                }
                Some(other @ serde_json::Value::Object(_)) => return other.to_string(),
                _ => {}
            }
        }
    }
    body.chars().take(200).collect()
}
