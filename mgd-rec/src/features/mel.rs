//! Mel filterbank and cepstral coefficients
//!
//! Slaney-style mel scale and area-normalised triangular filters, log power in
//! decibels clamped to an 80 dB range below the track's loudest band, then an
//! orthonormal DCT-II keeping the first [`MFCC_COUNT`] coefficients.

use crate::features::schema::MFCC_COUNT;
use std::f64::consts::PI;

/// Number of mel bands
pub const MEL_BANDS: usize = 128;

/// Dynamic range kept below the loudest mel band
pub const TOP_DB: f64 = 80.0;

/// Power floor before taking the logarithm
const AMIN: f64 = 1e-10;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Hz to mel (Slaney: linear below 1 kHz, logarithmic above)
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Mel to Hz, inverse of [`hz_to_mel`]
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// One triangular filter stored sparsely
struct MelFilter {
    first_bin: usize,
    weights: Vec<f64>,
}

/// Triangular mel filterbank over FFT bins
pub struct MelFilterbank {
    filters: Vec<MelFilter>,
}

impl MelFilterbank {
    /// Build `bands` filters spanning 0 Hz to Nyquist for the given bin frequencies
    pub fn new(bin_frequencies: &[f64], sample_rate: u32, bands: usize) -> Self {
        let max_mel = hz_to_mel(sample_rate as f64 / 2.0);
        let edges: Vec<f64> = (0..bands + 2)
            .map(|i| mel_to_hz(max_mel * i as f64 / (bands + 1) as f64))
            .collect();

        let filters = (0..bands)
            .map(|m| {
                let (lower, centre, upper) = (edges[m], edges[m + 1], edges[m + 2]);
                let norm = 2.0 / (upper - lower);
                let dense: Vec<f64> = bin_frequencies
                    .iter()
                    .map(|&f| {
                        let rising = (f - lower) / (centre - lower);
                        let falling = (upper - f) / (upper - centre);
                        rising.min(falling).max(0.0) * norm
                    })
                    .collect();

                let first_bin = dense.iter().position(|&w| w > 0.0).unwrap_or(0);
                let last_bin = dense
                    .iter()
                    .rposition(|&w| w > 0.0)
                    .map(|i| i + 1)
                    .unwrap_or(first_bin);
                MelFilter {
                    first_bin,
                    weights: dense[first_bin..last_bin].to_vec(),
                }
            })
            .collect();

        Self { filters }
    }

    pub fn bands(&self) -> usize {
        self.filters.len()
    }

    /// Mel band energies of a power spectrum
    pub fn apply(&self, power: &[f64]) -> Vec<f64> {
        self.filters
            .iter()
            .map(|filter| {
                filter
                    .weights
                    .iter()
                    .zip(&power[filter.first_bin..])
                    .map(|(w, p)| w * p)
                    .sum()
            })
            .collect()
    }
}

/// Power to decibels with a floor
pub fn power_to_db(power: f64) -> f64 {
    10.0 * power.max(AMIN).log10()
}

/// Clamp every band to at most [`TOP_DB`] below the global maximum
pub fn clamp_dynamic_range(frames: &mut [Vec<f64>]) {
    let peak = frames
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return;
    }
    let floor = peak - TOP_DB;
    for value in frames.iter_mut().flat_map(|frame| frame.iter_mut()) {
        if *value < floor {
            *value = floor;
        }
    }
}

/// Orthonormal DCT-II truncated to [`MFCC_COUNT`] coefficients
pub struct Dct {
    basis: Vec<Vec<f64>>,
}

impl Dct {
    pub fn new(inputs: usize) -> Self {
        let n = inputs as f64;
        let basis = (0..MFCC_COUNT)
            .map(|k| {
                let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
                (0..inputs)
                    .map(|m| scale * (PI * k as f64 * (2.0 * m as f64 + 1.0) / (2.0 * n)).cos())
                    .collect()
            })
            .collect();
        Self { basis }
    }

    /// Cepstral coefficients of one frame of log mel energies
    pub fn coefficients(&self, log_mel: &[f64]) -> [f64; MFCC_COUNT] {
        let mut out = [0.0; MFCC_COUNT];
        for (coefficient, row) in out.iter_mut().zip(&self.basis) {
            *coefficient = row.iter().zip(log_mel).map(|(b, x)| b * x).sum();
        }
        out
    }
}
