use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of every recorded artifact.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

const RESAMPLE_CHUNK: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits samples into fixed-size chunks, zero padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// Converts a whole mono buffer from one sample rate to another.
pub fn resample_to(samples: &[f32], from: u32, to: u32) -> anyhow::Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(from as f64, to as f64, RESAMPLE_CHUNK)?;
    let expected = (samples.len() as f64 * to as f64 / from as f64).round() as usize;

    let mut out = Vec::with_capacity(expected + RESAMPLE_CHUNK);
    for chunk in split_for_chunks(samples, RESAMPLE_CHUNK) {
        let resampled = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    out.truncate(expected);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_chunk_is_zero_padded() {
        let chunks = split_for_chunks(&[1.0; 5], 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }

    #[test]
    fn resampling_scales_length_by_rate() {
        let input = vec![0.0; 4800];
        let output = resample_to(&input, 48_000, CAPTURE_SAMPLE_RATE).unwrap();
        assert_eq!(output.len(), 1600);

        let same = resample_to(&input[..10], 16_000, 16_000).unwrap();
        assert_eq!(same.len(), 10);
    }
}
