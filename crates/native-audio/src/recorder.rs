use crate::audio::{CAPTURE_SAMPLE_RATE, resample_to};
use async_trait::async_trait;
use roleplay_core::audio::{AudioArtifact, Pcm};
use roleplay_core::capture::{AudioCapture, RecordingTarget};
use roleplay_core::error::CaptureError;
use roleplay_core::waveform;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A device that delivers mono sample frames while it is open.
pub trait SampleSource: Send {
    /// Starts sending frames on `tx` and returns their sample rate.
    fn open(&mut self, tx: UnboundedSender<Vec<f32>>) -> anyhow::Result<u32>;

    /// Stops the stream and releases the device.
    fn close(&mut self);
}

enum State {
    Idle,
    Recording {
        target: RecordingTarget,
        frames: UnboundedReceiver<Vec<f32>>,
        sample_rate: u32,
    },
    Stopped(Option<AudioArtifact>),
}

/// Records from a `SampleSource` into 16 kHz mono WAV artifacts.
///
/// Device calls run on the blocking pool; `source` is `None` while one is in flight.
pub struct Recorder<S> {
    source: Option<S>,
    state: State,
    trim_silence: bool,
}

impl<S: SampleSource + 'static> Recorder<S> {
    pub fn new(source: S, trim_silence: bool) -> Self {
        Self {
            source: Some(source),
            state: State::Idle,
            trim_silence,
        }
    }

    async fn with_source<T, F>(&mut self, f: F) -> Result<T, CaptureError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut source = self
            .source
            .take()
            .ok_or_else(|| CaptureError::Unavailable("microphone was lost".to_string()))?;
        let (source, out) = tokio::task::spawn_blocking(move || {
            let out = f(&mut source);
            (source, out)
        })
        .await
        .map_err(|e| CaptureError::Unavailable(format!("microphone task failed: {e}")))?;
        self.source = Some(source);
        Ok(out)
    }

    fn encode(&self, samples: Vec<f32>, sample_rate: u32) -> Result<Option<AudioArtifact>, CaptureError> {
        if samples.is_empty() {
            return Ok(None);
        }
        let resampled = resample_to(&samples, sample_rate, CAPTURE_SAMPLE_RATE)
            .map_err(|e| CaptureError::Encoding(format!("{e:#}")))?;
        let samples = if self.trim_silence {
            waveform::trim_silence(&resampled, CAPTURE_SAMPLE_RATE).to_vec()
        } else {
            resampled
        };
        AudioArtifact::from_pcm(Pcm::new(samples, CAPTURE_SAMPLE_RATE))
            .map(Some)
            .map_err(|e| CaptureError::Encoding(e.to_string()))
    }
}

#[async_trait]
impl<S: SampleSource + 'static> AudioCapture for Recorder<S> {
    async fn start(&mut self, target: RecordingTarget) -> Result<(), CaptureError> {
        if matches!(self.state, State::Recording { .. }) {
            return Err(CaptureError::Busy);
        }
        let (tx, frames) = mpsc::unbounded_channel();
        let sample_rate = self
            .with_source(move |source| source.open(tx))
            .await?
            .map_err(|e| CaptureError::Unavailable(format!("{e:#}")))?;
        tracing::info!(?target, sample_rate, "recording started");
        self.state = State::Recording {
            target,
            frames,
            sample_rate,
        };
        Ok(())
    }

    async fn stop(&mut self) -> Result<Option<AudioArtifact>, CaptureError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => Ok(None),
            State::Stopped(artifact) => {
                self.state = State::Stopped(artifact.clone());
                Ok(artifact)
            }
            State::Recording {
                target,
                mut frames,
                sample_rate,
            } => {
                if let Err(e) = self.with_source(|source| source.close()).await {
                    tracing::warn!(?target, error = %e, "failed to release microphone");
                }
                frames.close();
                let mut samples = Vec::new();
                while let Ok(frame) = frames.try_recv() {
                    samples.extend(frame);
                }

                let result = self.encode(samples, sample_rate);
                self.state = State::Stopped(result.as_ref().ok().cloned().flatten());
                match &result {
                    Ok(Some(artifact)) => tracing::info!(
                        ?target,
                        seconds = artifact.pcm().map(|p| p.duration().as_secs_f32()).unwrap_or_default(),
                        bytes = artifact.bytes().len(),
                        "recording stopped"
                    ),
                    Ok(None) => tracing::info!(?target, "recording stopped with no audio"),
                    Err(e) => tracing::warn!(?target, error = %e, "failed to encode recording"),
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    struct FakeSource {
        frames: Vec<Vec<f32>>,
        sample_rate: u32,
        fail: bool,
        closes: Arc<AtomicUsize>,
        /// When set, `open` blocks until a signal arrives.
        ready: Option<std_mpsc::Receiver<()>>,
    }

    impl FakeSource {
        fn new(frames: Vec<Vec<f32>>, sample_rate: u32) -> (Self, Arc<AtomicUsize>) {
            let closes = Arc::new(AtomicUsize::new(0));
            let source = Self {
                frames,
                sample_rate,
                fail: false,
                closes: closes.clone(),
                ready: None,
            };
            (source, closes)
        }
    }

    impl SampleSource for FakeSource {
        fn open(&mut self, tx: UnboundedSender<Vec<f32>>) -> anyhow::Result<u32> {
            if self.fail {
                anyhow::bail!("permission denied");
            }
            if let Some(ready) = &self.ready {
                ready
                    .recv_timeout(Duration::from_secs(5))
                    .map_err(|_| anyhow::anyhow!("device never became ready"))?;
            }
            for frame in &self.frames {
                tx.send(frame.clone())?;
            }
            Ok(self.sample_rate)
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_releases_once() {
        let (source, closes) = FakeSource::new(vec![vec![0.2; 800], vec![0.2; 800]], 16_000);
        let mut recorder = Recorder::new(source, false);

        recorder.start(RecordingTarget::Presentation).await.unwrap();
        let first = recorder.stop().await.unwrap();
        let second = recorder.stop().await.unwrap();

        assert_eq!(first, second);
        let pcm = first.unwrap().pcm().cloned().unwrap();
        assert_eq!(pcm.samples().len(), 1600);
        assert_eq!(pcm.sample_rate(), CAPTURE_SAMPLE_RATE);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_device_open_leaves_the_runtime_free() {
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (mut source, closes) = FakeSource::new(vec![vec![0.1; 10]], 16_000);
        source.ready = Some(ready_rx);
        let mut recorder = Recorder::new(source, false);

        // Only runs if `start` yields to the runtime while the device opens.
        tokio::spawn(async move {
            let _ = ready_tx.send(());
        });

        recorder.start(RecordingTarget::Presentation).await.unwrap();
        assert!(recorder.stop().await.unwrap().is_some());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_start_while_recording_is_busy() {
        let (source, _) = FakeSource::new(vec![vec![0.1; 10]], 16_000);
        let mut recorder = Recorder::new(source, false);

        recorder.start(RecordingTarget::Presentation).await.unwrap();
        assert_eq!(
            recorder.start(RecordingTarget::Answers).await,
            Err(CaptureError::Busy)
        );

        recorder.stop().await.unwrap();
        assert!(recorder.start(RecordingTarget::Answers).await.is_ok());
    }

    #[tokio::test]
    async fn device_failure_is_reported_as_unavailable() {
        let (mut source, _) = FakeSource::new(Vec::new(), 16_000);
        source.fail = true;
        let mut recorder = Recorder::new(source, true);

        let err = recorder.start(RecordingTarget::Presentation).await.unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable(msg) if msg.contains("permission denied")));
        assert_eq!(recorder.stop().await, Ok(None));
    }

    #[tokio::test]
    async fn captured_audio_is_resampled_to_capture_rate() {
        let (source, _) = FakeSource::new(vec![vec![0.3; 4800]], 48_000);
        let mut recorder = Recorder::new(source, false);

        recorder.start(RecordingTarget::Answers).await.unwrap();
        let artifact = recorder.stop().await.unwrap().unwrap();
        let pcm = artifact.pcm().unwrap();
        assert_eq!(pcm.sample_rate(), CAPTURE_SAMPLE_RATE);
        assert_eq!(pcm.samples().len(), 1600);
        assert_eq!(&artifact.bytes()[..4], b"RIFF");
    }

    #[tokio::test]
    async fn silent_recording_keeps_full_buffer_when_trim_is_too_aggressive() {
        let (source, _) = FakeSource::new(vec![vec![0.0; 16_000]], 16_000);
        let mut recorder = Recorder::new(source, true);

        recorder.start(RecordingTarget::Presentation).await.unwrap();
        let artifact = recorder.stop().await.unwrap().unwrap();
        assert_eq!(artifact.pcm().unwrap().samples().len(), 16_000);
    }
}
