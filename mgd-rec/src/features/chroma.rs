//! Pitch-class (chroma) profile
//!
//! Each FFT bin above [`MIN_CHROMA_HZ`] is assigned to its nearest equal-tempered
//! pitch class (A4 = 440 Hz). Bin power is summed per class and the profile is
//! scaled so the strongest class is 1.0.

use crate::features::schema::CHROMA_COUNT;

/// Bins below A0 carry no usable pitch information
pub const MIN_CHROMA_HZ: f64 = 27.5;

/// Bin to pitch-class assignment
pub struct ChromaMap {
    classes: Vec<Option<usize>>,
}

impl ChromaMap {
    pub fn new(bin_frequencies: &[f64]) -> Self {
        let classes = bin_frequencies
            .iter()
            .map(|&f| (f >= MIN_CHROMA_HZ).then(|| pitch_class(f)))
            .collect();
        Self { classes }
    }

    /// Max-normalised chroma of one power spectrum (all zeros when silent)
    pub fn profile(&self, power: &[f64]) -> [f64; CHROMA_COUNT] {
        let mut chroma = [0.0; CHROMA_COUNT];
        for (class, p) in self.classes.iter().zip(power) {
            if let Some(class) = class {
                chroma[*class] += p;
            }
        }

        let peak = chroma.iter().copied().fold(0.0, f64::max);
        if peak > 0.0 {
            for value in chroma.iter_mut() {
                *value /= peak;
            }
        }
        chroma
    }
}

/// Pitch class of a frequency, 0 = C
pub fn pitch_class(hz: f64) -> usize {
    let midi = 69.0 + 12.0 * (hz / 440.0).log2();
    (midi.round() as i64).rem_euclid(CHROMA_COUNT as i64) as usize
}
