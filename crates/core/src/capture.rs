use crate::audio::AudioArtifact;
use crate::error::CaptureError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Which recording of the session a capture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingTarget {
    Presentation,
    Answers,
}

/// The microphone, as seen by the phase engine.
///
/// Only one capture may run at a time. `stop` releases the device
/// unconditionally and is idempotent: a second call returns the artifact of
/// the first without processing it again.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AudioCapture: Send {
    async fn start(&mut self, target: RecordingTarget) -> Result<(), CaptureError>;

    async fn stop(&mut self) -> Result<Option<AudioArtifact>, CaptureError>;
}

/// Capture backend for runs without a microphone: sessions continue with empty audio.
#[derive(Debug, Default)]
pub struct NoCapture;

#[async_trait]
impl AudioCapture for NoCapture {
    async fn start(&mut self, target: RecordingTarget) -> Result<(), CaptureError> {
        tracing::debug!(?target, "audio capture disabled");
        Ok(())
    }

    async fn stop(&mut self) -> Result<Option<AudioArtifact>, CaptureError> {
        Ok(None)
    }
}
