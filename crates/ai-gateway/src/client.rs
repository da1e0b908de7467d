use crate::error::{GatewayError, error_details};
use reqwest::StatusCode;
use roleplay_types::{ChatMessage, ChatRequest, ChatResponse, ResponseFormat};
use secrecy::ExposeSecret;
use std::sync::{Arc, Mutex};

mod config;
pub mod consts;
mod stats;

pub use config::{Config, ConfigBuilder, RetryPolicy};
pub use stats::Stats;

/// What the caller expects the model to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Text,
    JsonObject,
    JsonArray,
}

impl Expect {
    fn temperature(self) -> f32 {
        match self {
            Expect::Text => consts::TEXT_TEMPERATURE,
            Expect::JsonObject | Expect::JsonArray => consts::JSON_TEMPERATURE,
        }
    }
}

// The proxy only understands `json_object`; arrays are requested through the prompt.
fn response_format(expect: Expect) -> Option<ResponseFormat> {
    match expect {
        Expect::JsonObject => Some(ResponseFormat::JsonObject),
        Expect::Text | Expect::JsonArray => None,
    }
}

/// HTTP client for the chat-completion proxy, with retry and usage accounting.
pub struct Client {
    http: reqwest::Client,
    config: Config,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> Stats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    pub fn build_request(&self, messages: Vec<ChatMessage>, expect: Expect) -> ChatRequest {
        let request =
            ChatRequest::new(self.config.model(), messages).with_temperature(expect.temperature());
        match response_format(expect) {
            Some(format) => request.with_response_format(format),
            None => request,
        }
    }

    /// Sends the messages to the proxy and returns the first choice's text.
    ///
    /// Rate limits, upstream failures and malformed bodies are retried with
    /// backoff; auth failures are returned immediately. `token` overrides the
    /// configured token for this call.
    pub async fn call_ai(
        &self,
        messages: Vec<ChatMessage>,
        expect: Expect,
        token: Option<&str>,
    ) -> Result<String, GatewayError> {
        let request = self.build_request(messages, expect);
        let token = token
            .map(str::to_string)
            .or_else(|| self.config.auth_token().map(|t| t.expose_secret().to_string()));
        let max_retries = self.config.retry().max_retries;

        let mut attempt = 0;
        loop {
            match self.send_once(&request, token.as_deref()).await {
                Ok(text) => return Ok(text),
                Err(err @ GatewayError::AuthRequired { .. }) => return Err(err),
                Err(err) if attempt < max_retries => {
                    let delay = self.config.retry().delay(attempt, &mut rand::rng());
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "AI call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(attempts = attempt + 1, error = %err, "AI call failed after retries");
                    return Err(err);
                }
            }
        }
    }

    async fn send_once(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> Result<String, GatewayError> {
        let url = format!("{}{}", self.config.base_url(), consts::CHAT_PATH);
        let mut builder = self.http.post(&url).json(request);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(GatewayError::transport)?;
        let status = response.status();
        let body = response.text().await.map_err(GatewayError::transport)?;

        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(GatewayError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(GatewayError::AuthRequired {
                    status: status.as_u16(),
                    message: error_details(&body),
                });
            }
            s if !s.is_success() => {
                return Err(GatewayError::Upstream {
                    status: Some(s.as_u16()),
                    details: error_details(&body),
                });
            }
            _ => {}
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
        if let Some(usage) = &parsed.usage {
            if let Ok(mut stats) = self.stats.lock() {
                stats.update_usage(
                    usage.total_tokens,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                );
            }
        }

        parsed
            .first_content()
            .filter(|content| !content.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Malformed("response contained no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone)]
    struct ProxyState {
        hits: Arc<AtomicUsize>,
        script: Arc<Vec<(u16, Value)>>,
        seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn scripted(
        State(state): State<ProxyState>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        let n = state.hits.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        state.seen.lock().unwrap().push((auth, body));
        let (status, reply) = state
            .script
            .get(n)
            .or(state.script.last())
            .cloned()
            .unwrap();
        (axum::http::StatusCode::from_u16(status).unwrap(), Json(reply))
    }

    async fn spawn_proxy(script: Vec<(u16, Value)>) -> (String, ProxyState) {
        let state = ProxyState {
            hits: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(script),
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route(consts::CHAT_PATH, post(scripted))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    fn fast_client(base_url: &str, max_retries: u32) -> Client {
        Client::new(
            Config::builder()
                .with_base_url(base_url)
                .with_model("test-model")
                .with_auth_token(None)
                .with_retry(RetryPolicy {
                    max_retries,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(4),
                    max_jitter: Duration::ZERO,
                })
                .build(),
        )
    }

    fn ok_body(text: &str) -> Value {
        json!({
            "choices": [{ "message": { "content": text } }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        })
    }

    #[tokio::test]
    async fn rate_limits_are_retried_until_success() {
        let (url, state) = spawn_proxy(vec![
            (429, json!({ "error": "slow down" })),
            (429, json!({ "error": "slow down" })),
            (200, ok_body("hello")),
        ])
        .await;
        let client = fast_client(&url, 6);

        let text = client
            .call_ai(vec![ChatMessage::user("hi")], Expect::Text, None)
            .await
            .unwrap();

        assert_eq!(text, "hello");
        assert_eq!(state.hits.load(Ordering::SeqCst), 3);
        let stats = client.stats();
        assert_eq!(stats.calls(), 1);
        assert_eq!(stats.total_tokens(), 15);
        assert_eq!((stats.input_tokens(), stats.output_tokens()), (10, 5));
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let (url, state) = spawn_proxy(vec![(401, json!({ "error": "Unauthorized" }))]).await;
        let client = fast_client(&url, 6);

        let err = client
            .call_ai(vec![ChatMessage::user("hi")], Expect::Text, None)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::AuthRequired { status: 401, .. }));
        assert_eq!(state.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upstream_errors_surface_after_retries_are_exhausted() {
        let (url, state) = spawn_proxy(vec![(
            502,
            json!({ "error": "AI Provider Error", "status": 502, "details": "provider down" }),
        )])
        .await;
        let client = fast_client(&url, 2);

        let err = client
            .call_ai(vec![ChatMessage::user("hi")], Expect::Text, None)
            .await
            .unwrap_err();

        match err {
            GatewayError::Upstream { status, details } => {
                assert_eq!(status, Some(502));
                assert_eq!(details, "provider down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(state.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let (url, _state) = spawn_proxy(vec![(200, json!({ "choices": [] }))]).await;
        let client = fast_client(&url, 0);

        let err = client
            .call_ai(vec![ChatMessage::user("hi")], Expect::Text, None)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Malformed(_)));
    }

    #[tokio::test]
    async fn json_object_requests_set_format_temperature_and_bearer() {
        let (url, state) = spawn_proxy(vec![(200, ok_body("{}"))]).await;
        let client = fast_client(&url, 0);

        client
            .call_ai(vec![ChatMessage::user("hi")], Expect::JsonObject, Some("tok-1"))
            .await
            .unwrap();

        let seen = state.seen.lock().unwrap();
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer tok-1"));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!((body["temperature"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn array_requests_have_no_format_and_no_token() {
        let (url, state) = spawn_proxy(vec![(200, ok_body("[]"))]).await;
        let client = fast_client(&url, 0);

        client
            .call_ai(vec![ChatMessage::user("hi")], Expect::JsonArray, None)
            .await
            .unwrap();

        let seen = state.seen.lock().unwrap();
        let (auth, body) = &seen[0];
        assert!(auth.is_none());
        assert!(body.get("response_format").is_none());
    }
}
