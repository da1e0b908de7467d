use crate::waveform;
use base64::Engine;
use roleplay_types::ContentPart;
use std::sync::Arc;
use std::time::Duration;

/// Container format of a recorded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Webm,
    Ogg,
}

impl AudioFormat {
    pub fn tag(self) -> &'static str {
        match self {
            AudioFormat::Wav => roleplay_types::audio::FORMAT_WAV,
            AudioFormat::Mp3 => roleplay_types::audio::FORMAT_MP3,
            AudioFormat::Webm => roleplay_types::audio::FORMAT_WEBM,
            AudioFormat::Ogg => roleplay_types::audio::FORMAT_OGG,
        }
    }
}

/// Decoded mono samples kept alongside an artifact for lossless access.
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl Pcm {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// The final product of one capture: encoded bytes plus a format tag.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    bytes: Arc<[u8]>,
    format: AudioFormat,
    pcm: Option<Pcm>,
}

impl AudioArtifact {
    pub fn new(bytes: Vec<u8>, format: AudioFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
            pcm: None,
        }
    }

    /// Encodes the samples as 16-bit WAV and keeps them for later trimming or chunking.
    pub fn from_pcm(pcm: Pcm) -> Result<Self, hound::Error> {
        let bytes = waveform::encode_wav(pcm.samples(), pcm.sample_rate())?;
        Ok(Self {
            bytes: bytes.into(),
            format: AudioFormat::Wav,
            pcm: Some(pcm),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn pcm(&self) -> Option<&Pcm> {
        self.pcm.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// The artifact as an inline audio part of a chat message.
    pub fn to_content_part(&self) -> ContentPart {
        ContentPart::input_audio(self.to_base64(), self.format.tag())
    }
}
