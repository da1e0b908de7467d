use crate::error::AiError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use roleplay_types::ChatMessage;

/// The shape of answer a caller expects from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectJson {
    No,
    Object,
    Array,
}

/// A chat-completion backend reached through the application's proxy.
///
/// Implementations own retry and backoff; an `Err` here is terminal for the call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn call_ai(
        &self,
        messages: Vec<ChatMessage>,
        expect: ExpectJson,
    ) -> Result<String, AiError>;
}
