use crate::content::parts::ContentPart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Message content is either a plain string or a list of multimodal parts.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    role: MessageRole,
    content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self { role, content }
    }

    pub fn system(text: &str) -> Self {
        Self::new(MessageRole::System, MessageContent::Text(text.to_string()))
    }

    pub fn user(text: &str) -> Self {
        Self::new(MessageRole::User, MessageContent::Text(text.to_string()))
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::new(MessageRole::User, MessageContent::Parts(parts))
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// All text in the message joined with newlines. Audio parts are skipped.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Number of inline audio parts attached to the message.
    pub fn audio_part_count(&self) -> usize {
        match &self.content {
            MessageContent::Text(_) => 0,
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|part| matches!(part, ContentPart::InputAudio(_)))
                .count(),
        }
    }
}
