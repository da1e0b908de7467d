use crate::audio::{AudioArtifact, AudioFormat, Pcm};
use crate::error::AiError;
use crate::gateway::{AiGateway, ExpectJson};
use crate::waveform;
use futures::stream::{self, StreamExt};
use roleplay_types::{ChatMessage, ContentPart};
use std::time::Duration;

/// Maximum number of words compared when looking for a chunk boundary overlap.
pub const MAX_OVERLAP_WORDS: usize = 20;

const TRANSCRIBE_PROMPT: &str = "You are a transcription engine. Transcribe the spoken words in the attached audio verbatim. \
Output only the transcript text, with no commentary, labels or timestamps. \
If the audio contains no speech, output exactly: [no speech]";
const NO_SPEECH: &str = "[no speech]";

/// Joins two adjacent chunk transcripts, dropping the words they share at the boundary.
///
/// Looks for the longest run of up to `MAX_OVERLAP_WORDS` words that ends
/// `left` and starts `right`. Words must match exactly, case and punctuation included.
pub fn stitch(left: &str, right: &str) -> String {
    let left_words: Vec<&str> = left.split_whitespace().collect();
    let right_words: Vec<&str> = right.split_whitespace().collect();
    if left_words.is_empty() {
        return right_words.join(" ");
    }
    if right_words.is_empty() {
        return left_words.join(" ");
    }

    let max = MAX_OVERLAP_WORDS.min(left_words.len()).min(right_words.len());

    let overlap = (1..=max)
        .rev()
        .find(|&k| left_words[left_words.len() - k..] == right_words[..k])
        .unwrap_or(0);

    left_words
        .iter()
        .chain(right_words[overlap..].iter())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn stitch_all<I>(chunks: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    chunks
        .into_iter()
        .fold(String::new(), |merged, chunk| stitch(&merged, chunk.as_ref()))
}

/// Picks between the live transcript and a post-hoc one: the post-hoc text
/// replaces the live one only when it is strictly longer.
pub fn prefer_longer(live: &str, post_hoc: &str) -> Option<String> {
    let post_hoc = post_hoc.trim();
    (post_hoc.chars().count() > live.trim().chars().count()).then(|| post_hoc.to_string())
}

/// Transcribes long recordings in overlapping windows through the AI gateway.
#[derive(Debug, Clone)]
pub struct ChunkedTranscriber {
    window: Duration,
    overlap: Duration,
    concurrency: usize,
}

impl Default for ChunkedTranscriber {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            overlap: Duration::from_secs(2),
            concurrency: 2,
        }
    }
}

impl ChunkedTranscriber {
    pub fn new(window: Duration, overlap: Duration, concurrency: usize) -> Self {
        Self {
            window,
            overlap,
            concurrency: concurrency.max(1),
        }
    }

    /// Transcribes every window and stitches the results in order.
    ///
    /// A failed window is skipped; the call only fails when every window
    /// failed or the gateway reports that sign in is required.
    pub async fn transcribe(&self, gateway: &dyn AiGateway, pcm: &Pcm) -> Result<String, AiError> {
        let windows = waveform::split_windows(
            pcm.samples(),
            pcm.sample_rate(),
            self.window,
            self.overlap,
        );
        if windows.is_empty() {
            return Ok(String::new());
        }
        let total = windows.len();
        let sample_rate = pcm.sample_rate();
        tracing::info!(chunks = total, "transcribing recording in chunks");

        let results: Vec<Result<String, AiError>> = stream::iter(windows.into_iter().enumerate())
            .map(|(index, window)| async move {
                let wav = waveform::encode_wav(window, sample_rate)
                    .map_err(|e| AiError::Malformed(format!("failed to encode chunk: {e}")))?;
                let chunk = AudioArtifact::new(wav, AudioFormat::Wav);
                let messages = vec![
                    ChatMessage::system(TRANSCRIBE_PROMPT),
                    ChatMessage::user_parts(vec![
                        ContentPart::text(&format!("Chunk {} of {}.", index + 1, total)),
                        chunk.to_content_part(),
                    ]),
                ];
                let text = gateway.call_ai(messages, ExpectJson::No).await?;
                let text = text.trim();
                Ok(if text == NO_SPEECH { String::new() } else { text.to_string() })
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut texts = Vec::with_capacity(total);
        let mut first_error = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(text) => texts.push(text),
                Err(err @ AiError::AuthRequired(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(chunk = index + 1, error = %err, "chunk transcription failed, skipping");
                    first_error.get_or_insert(err);
                }
            }
        }

        match (texts.is_empty(), first_error) {
            (true, Some(err)) => Err(err),
            _ => Ok(stitch_all(texts)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockAiGateway;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn overlapping_words_are_spliced_once() {
        assert_eq!(
            stitch("the quick brown fox", "brown fox jumps over"),
            "the quick brown fox jumps over"
        );
    }

    #[test]
    fn overlap_needs_an_exact_word_match() {
        assert_eq!(
            stitch("we will expand into Vietnam.", "vietnam, because labor costs"),
            "we will expand into Vietnam. vietnam, because labor costs"
        );
        assert_eq!(
            stitch("we will expand into Vietnam.", "Vietnam. because labor costs"),
            "we will expand into Vietnam. because labor costs"
        );
    }

    #[test]
    fn chunks_without_overlap_are_joined_with_a_space() {
        assert_eq!(stitch("first part", "second part"), "first part second part");
        assert_eq!(stitch("", "only right"), "only right");
        assert_eq!(stitch("only left", "  "), "only left");
    }

    #[test]
    fn longest_overlap_wins() {
        assert_eq!(stitch("a b a b", "a b a b c"), "a b a b c");
    }

    #[test]
    fn stitch_all_folds_in_order() {
        let merged = stitch_all(["one two three", "three four five", "five six"]);
        assert_eq!(merged, "one two three four five six");
    }

    #[test]
    fn only_strictly_longer_transcripts_replace_live_text() {
        assert_eq!(
            prefer_longer("short", "a longer transcript"),
            Some("a longer transcript".to_string())
        );
        assert_eq!(prefer_longer("same!", "same?"), None);
        assert_eq!(prefer_longer("live text wins", ""), None);
    }

    #[tokio::test]
    async fn long_recordings_are_transcribed_per_window_and_stitched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut gateway = MockAiGateway::new();
        gateway.expect_call_ai().returning(move |messages, expect| {
            assert_eq!(expect, ExpectJson::No);
            assert_eq!(messages[1].audio_part_count(), 1);
            let text = messages[1].text();
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(if text.starts_with("Chunk 1 ") {
                "the quick brown fox".to_string()
            } else {
                "brown fox jumps over".to_string()
            })
        });

        let pcm = Pcm::new(vec![0.0; 100 * 100], 100);
        let text = ChunkedTranscriber::default()
            .transcribe(&gateway, &pcm)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(text, "the quick brown fox jumps over");
    }

    #[tokio::test]
    async fn failed_windows_are_skipped() {
        let mut gateway = MockAiGateway::new();
        gateway.expect_call_ai().returning(|messages, _| {
            if messages[1].text().starts_with("Chunk 2 ") {
                Err(AiError::Upstream {
                    status: Some(500),
                    details: "boom".to_string(),
                })
            } else {
                Ok("opening remarks".to_string())
            }
        });

        let pcm = Pcm::new(vec![0.0; 100 * 100], 100);
        let text = ChunkedTranscriber::default()
            .transcribe(&gateway, &pcm)
            .await
            .unwrap();
        assert_eq!(text, "opening remarks");
    }

    #[tokio::test]
    async fn every_window_failing_is_an_error() {
        let mut gateway = MockAiGateway::new();
        gateway
            .expect_call_ai()
            .returning(|_, _| Err(AiError::RateLimited));

        let pcm = Pcm::new(vec![0.0; 500], 100);
        let err = ChunkedTranscriber::default()
            .transcribe(&gateway, &pcm)
            .await
            .unwrap_err();
        assert_eq!(err, AiError::RateLimited);
    }
}
