//! Band-limited resampling using rubato
//!
//! Converts mono PCM to the analysis sample rate. The sinc filter's output
//! delay is trimmed and the tail flushed, so `n` input frames always yield
//! `ceil(n * to / from)` output frames aligned with the input.

use crate::error::{RecommendError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Input frames fed to the resampler per call
const CHUNK_FRAMES: usize = 4096;

/// Upper bound on flush calls after the input is exhausted
const MAX_FLUSH_CALLS: usize = 8;

/// Resample mono samples from `input_rate` to `output_rate`
///
/// Returns a copy when the rates already match. Any rubato failure is a
/// [`RecommendError::Decode`]; resampling is never skipped.
pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == 0 || output_rate == 0 {
        return Err(RecommendError::Decode(format!(
            "Invalid sample rate conversion {} Hz -> {} Hz",
            input_rate, output_rate
        )));
    }

    if input_rate == output_rate {
        return Ok(input.to_vec());
    }

    if input.is_empty() {
        return Ok(Vec::new());
    }

    let ratio = output_rate as f64 / input_rate as f64;
    let mut resampler = create_resampler(ratio)?;
    let delay = resampler.output_delay();
    let expected = (input.len() as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(expected + delay);

    for chunk in input.chunks(CHUNK_FRAMES) {
        let frames = if chunk.len() == CHUNK_FRAMES {
            resampler.process(&[chunk], None)
        } else {
            resampler.process_partial(Some(&[chunk]), None)
        }
        .map_err(|e| RecommendError::Decode(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&frames[0]);
    }

    let mut flushes = 0;
    while output.len() < expected + delay && flushes < MAX_FLUSH_CALLS {
        let frames = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| RecommendError::Decode(format!("Resampler flush failed: {}", e)))?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
        flushes += 1;
    }

    if output.len() < expected + delay {
        return Err(RecommendError::Decode(format!(
            "Resampler produced {} frames, expected {}",
            output.len().saturating_sub(delay),
            expected
        )));
    }

    output.drain(..delay);
    output.truncate(expected);

    debug!(
        input_frames = input.len(),
        output_frames = output.len(),
        input_rate,
        output_rate,
        "Resampled mono signal"
    );

    Ok(output)
}

fn create_resampler(ratio: f64) -> Result<SincFixedIn<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, 1)
        .map_err(|e| RecommendError::Decode(format!("Failed to create resampler: {}", e)))
}
