//! Framing, windowing and FFT magnitude computation

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Analysis frame length in samples
pub const FRAME_SIZE: usize = 2048;

/// Hop between consecutive frames in samples
pub const HOP_SIZE: usize = 512;

/// Number of non-negative frequency bins per frame
pub const SPECTRUM_BINS: usize = FRAME_SIZE / 2 + 1;

/// Short-time Fourier transform with a fixed periodic Hann window
pub struct Stft {
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
}

impl Default for Stft {
    fn default() -> Self {
        Self::new()
    }
}

impl Stft {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            fft: planner.plan_fft_forward(FRAME_SIZE),
            window: hann_window(FRAME_SIZE),
        }
    }

    /// Number of whole frames in a signal of `len` samples
    pub fn frame_count(len: usize) -> usize {
        if len < FRAME_SIZE {
            0
        } else {
            1 + (len - FRAME_SIZE) / HOP_SIZE
        }
    }

    /// Iterate over whole, un-windowed frames (trailing partial frame dropped)
    pub fn frames(samples: &[f32]) -> impl Iterator<Item = &[f32]> {
        (0..Self::frame_count(samples.len()))
            .map(move |i| &samples[i * HOP_SIZE..i * HOP_SIZE + FRAME_SIZE])
    }

    /// Magnitude spectrum of one frame after windowing
    ///
    /// `scratch` is reused between calls to avoid reallocating the FFT buffer.
    pub fn magnitude(&self, frame: &[f32], scratch: &mut Vec<Complex<f64>>) -> Vec<f64> {
        scratch.clear();
        scratch.extend(
            frame
                .iter()
                .zip(&self.window)
                .map(|(&s, &w)| Complex::new(s as f64 * w, 0.0)),
        );
        self.fft.process(scratch);

        scratch[..SPECTRUM_BINS].iter().map(|c| c.norm()).collect()
    }
}

/// Periodic Hann window
fn hann_window(size: usize) -> Vec<f64> {
    let n = size as f64;
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n).cos())
        .collect()
}

/// Centre frequency in Hz of each spectrum bin
pub fn bin_frequencies(sample_rate: u32) -> Vec<f64> {
    (0..SPECTRUM_BINS)
        .map(|k| k as f64 * sample_rate as f64 / FRAME_SIZE as f64)
        .collect()
}
