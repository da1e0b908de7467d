use std::io::Cursor;
use std::time::Duration;

/// RMS level under which a frame counts as silence.
pub const SILENCE_THRESHOLD: f32 = 0.01;
/// Frame length used for silence detection.
pub const FRAME_MS: u32 = 20;
/// A trim that leaves less than this is discarded in favour of the full buffer.
pub const MIN_TRIMMED: Duration = Duration::from_millis(500);

pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}

/// Drops leading and trailing near-silence.
///
/// Returns the input untouched when nothing is loud enough or when the
/// trimmed result would be shorter than `MIN_TRIMMED`.
pub fn trim_silence(samples: &[f32], sample_rate: u32) -> &[f32] {
    let frame_len = ((sample_rate * FRAME_MS / 1000) as usize).max(1);
    let frames: Vec<&[f32]> = samples.chunks(frame_len).collect();
    let is_loud = |frame: &&[f32]| rms(frame) >= SILENCE_THRESHOLD;

    let (Some(first), Some(last)) = (
        frames.iter().position(is_loud),
        frames.iter().rposition(is_loud),
    ) else {
        return samples;
    };

    let start = first * frame_len;
    let end = ((last + 1) * frame_len).min(samples.len());
    let trimmed = &samples[start..end];
    let min_len = (MIN_TRIMMED.as_secs_f32() * sample_rate as f32) as usize;
    if trimmed.len() < min_len {
        tracing::debug!(
            trimmed = trimmed.len(),
            min_len,
            "silence trim too aggressive, keeping full buffer"
        );
        return samples;
    }
    trimmed
}

/// Splits samples into windows of `window` length that overlap by `overlap`.
pub fn split_windows(
    samples: &[f32],
    sample_rate: u32,
    window: Duration,
    overlap: Duration,
) -> Vec<&[f32]> {
    let window_len = ((window.as_secs_f64() * sample_rate as f64) as usize).max(1);
    let overlap_len = (overlap.as_secs_f64() * sample_rate as f64) as usize;
    let step = if overlap_len < window_len {
        window_len - overlap_len
    } else {
        window_len
    };

    let mut windows = Vec::new();
    let mut start = 0;
    while start < samples.len() {
        let end = (start + window_len).min(samples.len());
        windows.push(&samples[start..end]);
        if end == samples.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Encodes mono f32 samples as 16-bit PCM WAV.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let value = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
