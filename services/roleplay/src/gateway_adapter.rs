use ai_gateway::types::ChatMessage;
use ai_gateway::{Expect, GatewayError};
use async_trait::async_trait;
use roleplay_core::error::AiError;
use roleplay_core::gateway::{AiGateway, ExpectJson};
use roleplay_core::report::AuthTokenProvider;
use std::sync::Arc;

/// An adapter that implements the core `AiGateway` trait for `ai_gateway::Client`.
///
/// The bearer token is looked up on every call so a sign in or sign out takes
/// effect without rebuilding the client.
pub struct GatewayAdapter {
    client: ai_gateway::Client,
    tokens: Arc<dyn AuthTokenProvider>,
}

impl GatewayAdapter {
    pub fn new(client: ai_gateway::Client, tokens: Arc<dyn AuthTokenProvider>) -> Self {
        Self { client, tokens }
    }

    pub fn client(&self) -> &ai_gateway::Client {
        &self.client
    }
}

#[async_trait]
impl AiGateway for GatewayAdapter {
    async fn call_ai(
        &self,
        messages: Vec<ChatMessage>,
        expect: ExpectJson,
    ) -> Result<String, AiError> {
        let token = self.tokens.auth_token().await;
        self.client
            .call_ai(messages, expect_for(expect), token.as_deref())
            .await
            .map_err(ai_error)
    }
}

pub fn expect_for(expect: ExpectJson) -> Expect {
    match expect {
        ExpectJson::No => Expect::Text,
        ExpectJson::Object => Expect::JsonObject,
        ExpectJson::Array => Expect::JsonArray,
    }
}

pub fn ai_error(err: GatewayError) -> AiError {
    match err {
        GatewayError::RateLimited => AiError::RateLimited,
        GatewayError::AuthRequired { message, .. } => AiError::AuthRequired(message),
        GatewayError::Upstream { status, details } => AiError::Upstream { status, details },
        GatewayError::Malformed(details) => AiError::Malformed(details),
    }
}

/// A token fixed at startup, e.g. from `AUTH_TOKEN`. `None` runs signed out.
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }
}

#[async_trait]
impl AuthTokenProvider for StaticToken {
    async fn auth_token(&self) -> Option<String> {
        self.0.clone()
    }
}
