//! Acoustic feature extraction
//!
//! Turns a decoded mono signal into one [`FeatureVector`] of [`FEATURE_DIM`]
//! values. Extraction is deterministic: the same samples always produce the
//! same vector.
//!
//! **Algorithm:**
//! 1. Reject degenerate input (too short, non-finite samples, near-silence)
//! 2. Slice into 2048-sample frames with a 512-sample hop
//! 3. Per frame: RMS and zero-crossing rate on raw samples; Hann-windowed FFT
//!    for spectral shape, chroma and mel band energies
//! 4. Clamp log-mel energies to an 80 dB range, take MFCCs per frame
//! 5. Estimate tempo from the log-mel onset envelope
//! 6. Average (and for spectral shape, also take the deviation) over frames

pub mod chroma;
pub mod mel;
pub mod schema;
pub mod spectral;
pub mod stft;
pub mod tempo;

pub use schema::{
    decode_wire, encode_wire, AcousticFeatures, FeatureVector, Summary, CHROMA_COUNT,
    FEATURE_DIM, FEATURE_NAMES, MFCC_COUNT,
};

use crate::audio::PcmSignal;
use crate::error::{RecommendError, Result};
use chroma::ChromaMap;
use mel::{clamp_dynamic_range, power_to_db, Dct, MelFilterbank, MEL_BANDS};
use rustfft::num_complex::Complex;
use stft::{bin_frequencies, Stft, FRAME_SIZE, HOP_SIZE};
use tracing::debug;

/// Whole-signal RMS below which the input is treated as silence
pub const SILENCE_RMS: f64 = 1e-8;

/// Deterministic feature extractor
pub struct FeatureExtractor {
    stft: Stft,
    dct: Dct,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            stft: Stft::new(),
            dct: Dct::new(MEL_BANDS),
        }
    }

    /// Extract the feature vector of a decoded signal
    ///
    /// # Errors
    /// `FeatureExtraction` when the signal is shorter than one frame, contains
    /// NaN or infinite samples, is silent, or produces a non-finite feature.
    pub fn extract(&self, signal: &PcmSignal) -> Result<FeatureVector> {
        let samples = signal.samples();
        validate_signal(samples)?;

        let sample_rate = signal.sample_rate();
        let frequencies = bin_frequencies(sample_rate);
        let filterbank = MelFilterbank::new(&frequencies, sample_rate, MEL_BANDS);
        let chroma_map = ChromaMap::new(&frequencies);

        let frame_count = Stft::frame_count(samples.len());
        let mut rms_values = Vec::with_capacity(frame_count);
        let mut zcr_values = Vec::with_capacity(frame_count);
        let mut centroids = Vec::with_capacity(frame_count);
        let mut rolloffs = Vec::with_capacity(frame_count);
        let mut bandwidths = Vec::with_capacity(frame_count);
        let mut chroma_sum = [0.0; CHROMA_COUNT];
        let mut log_mel: Vec<Vec<f64>> = Vec::with_capacity(frame_count);
        let mut scratch = Vec::<Complex<f64>>::with_capacity(FRAME_SIZE);

        for frame in Stft::frames(samples) {
            rms_values.push(spectral::rms(frame));
            zcr_values.push(spectral::zero_crossing_rate(frame));

            let magnitudes = self.stft.magnitude(frame, &mut scratch);
            let shape = spectral::spectral_shape(&magnitudes, &frequencies);
            centroids.push(shape.centroid);
            rolloffs.push(shape.rolloff);
            bandwidths.push(shape.bandwidth);

            let power: Vec<f64> = magnitudes.iter().map(|m| m * m).collect();
            for (sum, value) in chroma_sum.iter_mut().zip(chroma_map.profile(&power)) {
                *sum += value;
            }
            log_mel.push(filterbank.apply(&power).into_iter().map(power_to_db).collect());
        }

        clamp_dynamic_range(&mut log_mel);

        let mut mfcc_mean = [0.0; MFCC_COUNT];
        for frame in &log_mel {
            for (sum, c) in mfcc_mean.iter_mut().zip(self.dct.coefficients(frame)) {
                *sum += c;
            }
        }

        let n = frame_count as f64;
        mfcc_mean.iter_mut().for_each(|v| *v /= n);
        chroma_sum.iter_mut().for_each(|v| *v /= n);

        let frame_rate = sample_rate as f64 / HOP_SIZE as f64;
        let tempo_bpm = tempo::estimate_tempo(&tempo::onset_envelope(&log_mel), frame_rate);

        let features = AcousticFeatures {
            mfcc_mean,
            tempo_bpm,
            chroma_mean: chroma_sum,
            spectral_centroid: Summary::of(&centroids),
            spectral_rolloff: Summary::of(&rolloffs),
            spectral_bandwidth: Summary::of(&bandwidths),
            rms_mean: Summary::of(&rms_values).mean,
            zero_crossing_rate_mean: Summary::of(&zcr_values).mean,
        };

        let vector = features.to_vector();
        if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
            return Err(RecommendError::FeatureExtraction(format!(
                "non-finite value for {}",
                FEATURE_NAMES[index]
            )));
        }

        debug!(
            frames = frame_count,
            tempo_bpm,
            "Extracted {} features",
            FEATURE_DIM
        );

        Ok(vector)
    }
}

fn validate_signal(samples: &[f32]) -> Result<()> {
    if samples.len() < FRAME_SIZE {
        return Err(RecommendError::FeatureExtraction(format!(
            "signal too short: {} samples, need at least {}",
            samples.len(),
            FRAME_SIZE
        )));
    }

    if samples.iter().any(|s| !s.is_finite()) {
        return Err(RecommendError::FeatureExtraction(
            "signal contains non-finite samples".to_string(),
        ));
    }

    if spectral::rms(samples) < SILENCE_RMS {
        return Err(RecommendError::FeatureExtraction(
            "signal is silent".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const RATE: u32 = 22_050;

    fn sine(freq: f64, amplitude: f64, seconds: f64) -> PcmSignal {
        let len = (RATE as f64 * seconds) as usize;
        let samples = (0..len)
            .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / RATE as f64).sin()) as f32)
            .collect();
        PcmSignal::new(samples, RATE)
    }

    fn value(vector: &FeatureVector, name: &str) -> f64 {
        vector.get(name).unwrap()
    }

    #[test]
    fn test_too_short_signal_rejected() {
        let signal = PcmSignal::new(vec![0.1; FRAME_SIZE - 1], RATE);
        let err = FeatureExtractor::new().extract(&signal).unwrap_err();
        assert!(matches!(err, RecommendError::FeatureExtraction(_)));
    }

    #[test]
    fn test_silent_signal_rejected() {
        let signal = PcmSignal::new(vec![0.0; RATE as usize], RATE);
        let err = FeatureExtractor::new().extract(&signal).unwrap_err();
        assert!(matches!(err, RecommendError::FeatureExtraction(_)));
    }

    #[test]
    fn test_nan_sample_rejected() {
        let mut samples = vec![0.25; RATE as usize];
        samples[1000] = f32::NAN;
        let err = FeatureExtractor::new()
            .extract(&PcmSignal::new(samples, RATE))
            .unwrap_err();
        assert!(matches!(err, RecommendError::FeatureExtraction(_)));
    }

    #[test]
    fn test_sine_features() {
        let vector = FeatureExtractor::new().extract(&sine(440.0, 0.5, 5.0)).unwrap();
        assert_eq!(vector.len(), FEATURE_DIM);

        let centroid = value(&vector, "spectral_centroid_mean");
        assert!((centroid - 440.0).abs() < 25.0, "centroid {}", centroid);

        let rms = value(&vector, "rms_mean");
        assert!((rms - 0.5 / 2f64.sqrt()).abs() < 0.01, "rms {}", rms);

        let zcr = value(&vector, "zero_crossing_rate_mean");
        assert!((zcr - 880.0 / RATE as f64).abs() < 0.005, "zcr {}", zcr);

        // A dominates the pitch-class profile
        let chroma = &vector[schema::CHROMA_OFFSET..schema::CHROMA_OFFSET + CHROMA_COUNT];
        let strongest = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(strongest, 9);
    }

    #[test]
    fn test_higher_tone_has_higher_centroid() {
        let extractor = FeatureExtractor::new();
        let low = extractor.extract(&sine(220.0, 0.5, 3.0)).unwrap();
        let high = extractor.extract(&sine(1760.0, 0.5, 3.0)).unwrap();
        assert!(
            value(&high, "spectral_centroid_mean") > value(&low, "spectral_centroid_mean")
        );
        assert!(
            value(&high, "spectral_rolloff_mean") > value(&low, "spectral_rolloff_mean")
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::new();
        let signal = sine(330.0, 0.3, 2.0);
        assert_eq!(
            extractor.extract(&signal).unwrap(),
            extractor.extract(&signal).unwrap()
        );
    }

    #[test]
    fn test_click_track_tempo() {
        // 10 ms noise bursts every 22 hops (about 0.51 s, 117.5 BPM)
        let len = RATE as usize * 10;
        let period = 22 * HOP_SIZE;
        let mut state: u32 = 12345;
        let samples: Vec<f32> = (0..len)
            .map(|i| {
                if i % period < 220 {
                    state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                    ((state >> 16) as f32 / 32768.0) - 1.0
                } else {
                    0.0
                }
            })
            .collect();

        let vector = FeatureExtractor::new()
            .extract(&PcmSignal::new(samples, RATE))
            .unwrap();
        let tempo = value(&vector, "tempo_bpm");
        assert!((tempo - 120.0).abs() < 5.0, "tempo {}", tempo);
    }
}
