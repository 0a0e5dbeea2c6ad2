//! Per-frame spectral shape and time-domain features
//!
//! Spectral shape uses the magnitude spectrum. A frame with no spectral energy
//! scores 0 for centroid, bandwidth and rolloff rather than an undefined ratio;
//! whole-signal silence is rejected before framing.

/// Fraction of spectral magnitude below the rolloff frequency
pub const ROLLOFF_FRACTION: f64 = 0.85;

/// Spectral shape of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectralShape {
    pub centroid: f64,
    pub rolloff: f64,
    pub bandwidth: f64,
}

/// Centroid, rolloff and bandwidth (all in Hz) of a magnitude spectrum
pub fn spectral_shape(magnitudes: &[f64], frequencies: &[f64]) -> SpectralShape {
    let total: f64 = magnitudes.iter().sum();
    if total <= 0.0 {
        return SpectralShape::default();
    }

    let centroid = magnitudes
        .iter()
        .zip(frequencies)
        .map(|(m, f)| m * f)
        .sum::<f64>()
        / total;

    let bandwidth = magnitudes
        .iter()
        .zip(frequencies)
        .map(|(m, f)| (m / total) * (f - centroid).powi(2))
        .sum::<f64>()
        .sqrt();

    let threshold = ROLLOFF_FRACTION * total;
    let mut cumulative = 0.0;
    let mut rolloff = frequencies.last().copied().unwrap_or(0.0);
    for (m, f) in magnitudes.iter().zip(frequencies) {
        cumulative += m;
        if cumulative >= threshold {
            rolloff = *f;
            break;
        }
    }

    SpectralShape {
        centroid,
        rolloff,
        bandwidth,
    }
}

/// Root-mean-square amplitude of a frame
pub fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = frame.iter().map(|&s| (s as f64).powi(2)).sum();
    (sum_squares / frame.len() as f64).sqrt()
}

/// Fraction of adjacent sample pairs whose sign differs
///
/// Zero counts as positive, so a run of zeros never crosses.
pub fn zero_crossing_rate(frame: &[f32]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|pair| pair[0].is_sign_negative() != pair[1].is_sign_negative())
        .count();
    crossings as f64 / frame.len() as f64
}
