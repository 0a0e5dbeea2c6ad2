//! Fixed feature schema
//!
//! Every vector in the system has [`FEATURE_DIM`] entries and index `i` always
//! names the same feature. [`AcousticFeatures`] assigns all named fields in one
//! pass and [`AcousticFeatures::to_vector`] flattens them at fixed offsets.

use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Number of cepstral coefficients summarised
pub const MFCC_COUNT: usize = 20;

/// Number of pitch classes summarised
pub const CHROMA_COUNT: usize = 12;

/// Offset of the first MFCC mean
pub const MFCC_OFFSET: usize = 0;
/// Offset of the tempo estimate
pub const TEMPO_OFFSET: usize = MFCC_OFFSET + MFCC_COUNT;
/// Offset of the first chroma mean
pub const CHROMA_OFFSET: usize = TEMPO_OFFSET + 1;
/// Offset of the spectral-shape block (centroid, rolloff, bandwidth; mean then std)
pub const SPECTRAL_OFFSET: usize = CHROMA_OFFSET + CHROMA_COUNT;
/// Offset of mean short-term energy
pub const RMS_OFFSET: usize = SPECTRAL_OFFSET + 6;
/// Offset of mean zero-crossing rate
pub const ZCR_OFFSET: usize = RMS_OFFSET + 1;

/// Feature dimension D shared by every vector in the deployment
pub const FEATURE_DIM: usize = ZCR_OFFSET + 1;

/// Bytes per value in the wire form
const WIRE_VALUE_BYTES: usize = std::mem::size_of::<f64>();

/// Name of each feature, by index
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "mfcc_mean_0",
    "mfcc_mean_1",
    "mfcc_mean_2",
    "mfcc_mean_3",
    "mfcc_mean_4",
    "mfcc_mean_5",
    "mfcc_mean_6",
    "mfcc_mean_7",
    "mfcc_mean_8",
    "mfcc_mean_9",
    "mfcc_mean_10",
    "mfcc_mean_11",
    "mfcc_mean_12",
    "mfcc_mean_13",
    "mfcc_mean_14",
    "mfcc_mean_15",
    "mfcc_mean_16",
    "mfcc_mean_17",
    "mfcc_mean_18",
    "mfcc_mean_19",
    "tempo_bpm",
    "chroma_mean_c",
    "chroma_mean_c_sharp",
    "chroma_mean_d",
    "chroma_mean_d_sharp",
    "chroma_mean_e",
    "chroma_mean_f",
    "chroma_mean_f_sharp",
    "chroma_mean_g",
    "chroma_mean_g_sharp",
    "chroma_mean_a",
    "chroma_mean_a_sharp",
    "chroma_mean_b",
    "spectral_centroid_mean",
    "spectral_centroid_std",
    "spectral_rolloff_mean",
    "spectral_rolloff_std",
    "spectral_bandwidth_mean",
    "spectral_bandwidth_std",
    "rms_mean",
    "zero_crossing_rate_mean",
];

/// Mean and population standard deviation of a per-frame quantity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
}

impl Summary {
    /// Summarise a sequence of per-frame values (empty input yields zeros)
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Named acoustic features of one track
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticFeatures {
    pub mfcc_mean: [f64; MFCC_COUNT],
    pub tempo_bpm: f64,
    pub chroma_mean: [f64; CHROMA_COUNT],
    pub spectral_centroid: Summary,
    pub spectral_rolloff: Summary,
    pub spectral_bandwidth: Summary,
    pub rms_mean: f64,
    pub zero_crossing_rate_mean: f64,
}

impl AcousticFeatures {
    /// Flatten into the fixed-offset vector layout
    pub fn to_vector(&self) -> FeatureVector {
        let mut values = [0.0; FEATURE_DIM];
        values[MFCC_OFFSET..MFCC_OFFSET + MFCC_COUNT].copy_from_slice(&self.mfcc_mean);
        values[TEMPO_OFFSET] = self.tempo_bpm;
        values[CHROMA_OFFSET..CHROMA_OFFSET + CHROMA_COUNT].copy_from_slice(&self.chroma_mean);
        values[SPECTRAL_OFFSET] = self.spectral_centroid.mean;
        values[SPECTRAL_OFFSET + 1] = self.spectral_centroid.std;
        values[SPECTRAL_OFFSET + 2] = self.spectral_rolloff.mean;
        values[SPECTRAL_OFFSET + 3] = self.spectral_rolloff.std;
        values[SPECTRAL_OFFSET + 4] = self.spectral_bandwidth.mean;
        values[SPECTRAL_OFFSET + 5] = self.spectral_bandwidth.std;
        values[RMS_OFFSET] = self.rms_mean;
        values[ZCR_OFFSET] = self.zero_crossing_rate_mean;
        FeatureVector(values)
    }
}

/// Fixed-dimension feature vector; immutable once built
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector([f64; FEATURE_DIM]);

impl FeatureVector {
    /// Build from a slice, rejecting any length other than [`FEATURE_DIM`]
    pub fn from_slice(values: &[f64]) -> Result<Self, String> {
        let array: [f64; FEATURE_DIM] = values.try_into().map_err(|_| {
            format!(
                "expected {} feature values, found {}",
                FEATURE_DIM,
                values.len()
            )
        })?;
        if let Some(index) = array.iter().position(|v| !v.is_finite()) {
            return Err(format!(
                "feature {} ({}) is not finite",
                index, FEATURE_NAMES[index]
            ));
        }
        Ok(Self(array))
    }

    /// Value of a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|index| self.0[index])
    }

    /// Encode as the wire form (little-endian IEEE-754 f64 values)
    pub fn to_wire(&self) -> Vec<u8> {
        encode_wire(&self.0)
    }
}

impl Deref for FeatureVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_slice(&values)
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(vector: FeatureVector) -> Self {
        vector.0.to_vec()
    }
}

/// Encode values as consecutive little-endian f64s
pub fn encode_wire(values: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * WIRE_VALUE_BYTES);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode the wire form without checking the dimension
///
/// Dimension checks happen when a stored row becomes a catalog entry, so that a
/// wrong-length vector is reported as corrupt rather than coerced.
pub fn decode_wire(bytes: &[u8]) -> Result<Vec<f64>, String> {
    if bytes.len() % WIRE_VALUE_BYTES != 0 {
        return Err(format!(
            "feature blob of {} bytes is not a whole number of f64 values",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(WIRE_VALUE_BYTES)
        .map(|chunk| {
            let mut raw = [0u8; WIRE_VALUE_BYTES];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect())
}
