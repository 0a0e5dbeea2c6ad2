//! Audio ingestion: container sniffing, decoding and resampling
//!
//! Everything downstream of this module sees only [`PcmSignal`]: mono f32 at
//! [`TARGET_SAMPLE_RATE`], at most [`MAX_DURATION_SECS`] long.

pub mod decoder;
pub mod resampler;

pub use decoder::{
    AudioDecoder, ContainerFormat, PcmSignal, RawAudio, Sniffed, MAX_DURATION_SECS,
    TARGET_SAMPLE_RATE,
};
pub use resampler::resample_mono;
