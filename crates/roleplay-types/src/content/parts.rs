use crate::audio::Base64EncodedAudioBytes;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text(TextPart),
    #[serde(rename = "input_audio")]
    InputAudio(InputAudioPart),
}

impl ContentPart {
    pub fn text(text: &str) -> Self {
        Self::Text(TextPart {
            text: text.to_string(),
        })
    }

    pub fn input_audio(data: Base64EncodedAudioBytes, format: &str) -> Self {
        Self::InputAudio(InputAudioPart {
            input_audio: InputAudio {
                data,
                format: format.to_string(),
            },
        })
    }

    /// The text carried by this part, if it is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(part) => Some(&part.text),
            Self::InputAudio(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextPart {
    text: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InputAudioPart {
    input_audio: InputAudio,
}

impl InputAudioPart {
    pub fn input_audio(&self) -> &InputAudio {
        &self.input_audio
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InputAudio {
    data: Base64EncodedAudioBytes,
    format: String,
}

impl InputAudio {
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}
