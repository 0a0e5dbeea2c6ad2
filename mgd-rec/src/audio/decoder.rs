//! Audio Decoding
//!
//! **Purpose:** Turn uploaded bytes into canonical mono f32 PCM at the analysis
//! sample rate, truncated to the analysis window.
//!
//! **Algorithm:**
//! 1. Sniff the container from magic bytes (fall back to the declared format)
//! 2. Reject unsupported containers before touching the decoder
//! 3. Decode packets of the default track with symphonia
//! 4. Down-mix every buffer to mono by channel averaging
//! 5. Stop once the analysis window is covered at the source rate
//! 6. Resample to the target rate and truncate to the exact window

use crate::audio::resampler::resample_mono;
use crate::error::{RecommendError, Result};
use std::fmt;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Analysis sample rate in Hz
pub const TARGET_SAMPLE_RATE: u32 = 22_050;

/// Seconds of audio analysed from the start of each track
pub const MAX_DURATION_SECS: f64 = 120.0;

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    Wav,
    Flac,
    Mp3,
    Ogg,
    Mp4,
    Aac,
}

/// Outcome of magic-byte sniffing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    Supported(ContainerFormat),
    /// Recognised file type this build does not decode (Ogg/Opus, AIFF, images, ...)
    Unsupported(&'static str),
    /// No known signature
    Unknown,
}

impl ContainerFormat {
    /// Identify the container from its leading bytes
    pub fn sniff(bytes: &[u8]) -> Sniffed {
        match infer::get(bytes) {
            Some(kind) => match Self::from_extension(kind.extension()) {
                Some(format) => Sniffed::Supported(format),
                None => Sniffed::Unsupported(kind.mime_type()),
            },
            None => Sniffed::Unknown,
        }
    }

    /// Map a file extension (without dot, any case) to a container
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            "mp3" => Some(Self::Mp3),
            "ogg" | "oga" => Some(Self::Ogg),
            "mp4" | "m4a" => Some(Self::Mp4),
            "aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Extension passed to symphonia's probe as a hint
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Mp4 => "m4a",
            Self::Aac => "aac",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Uploaded audio bytes plus an optional caller-declared container
#[derive(Debug, Clone)]
pub struct RawAudio {
    bytes: Vec<u8>,
    declared: Option<ContainerFormat>,
}

impl RawAudio {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            declared: None,
        }
    }

    /// Attach a declared container, used only when the bytes carry no known signature
    pub fn with_declared_format(mut self, format: ContainerFormat) -> Self {
        self.declared = Some(format);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sniffed container, else the declared one
    ///
    /// A recognised but unsupported file type is rejected whatever was declared.
    pub fn format(&self) -> Result<ContainerFormat> {
        match ContainerFormat::sniff(&self.bytes) {
            Sniffed::Supported(format) => Ok(format),
            Sniffed::Unsupported(mime) => Err(RecommendError::UnsupportedFormat(format!(
                "{} is not a supported audio container",
                mime
            ))),
            Sniffed::Unknown => self.declared.ok_or_else(|| {
                let reason = if self.bytes.is_empty() {
                    "empty input"
                } else {
                    "unrecognised container"
                };
                RecommendError::UnsupportedFormat(reason.to_string())
            }),
        }
    }
}

/// Canonical mono PCM; never mutated after creation
#[derive(Debug, Clone, PartialEq)]
pub struct PcmSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl PcmSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decoder producing [`PcmSignal`]s at a fixed rate and bounded duration
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    target_sample_rate: u32,
    max_duration_secs: f64,
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new(TARGET_SAMPLE_RATE, MAX_DURATION_SECS)
    }
}

impl AudioDecoder {
    pub fn new(target_sample_rate: u32, max_duration_secs: f64) -> Self {
        Self {
            target_sample_rate,
            max_duration_secs,
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decode raw audio; the bytes are consumed
    ///
    /// # Errors
    /// * [`RecommendError::UnsupportedFormat`] - unknown container or codec
    /// * [`RecommendError::Decode`] - corrupt stream, no samples, or resampling failure
    pub fn decode(&self, raw: RawAudio) -> Result<PcmSignal> {
        let format = raw.format()?;

        let (mono, source_rate) = self.decode_mono(raw.bytes, format)?;

        let mut samples = resample_mono(&mono, source_rate, self.target_sample_rate)?;
        samples.truncate(max_frames(self.max_duration_secs, self.target_sample_rate));

        if samples.is_empty() {
            return Err(RecommendError::Decode("Stream contains no audio samples".to_string()));
        }

        debug!(
            container = %format,
            source_rate,
            target_rate = self.target_sample_rate,
            samples = samples.len(),
            "Audio decoding complete"
        );

        Ok(PcmSignal::new(samples, self.target_sample_rate))
    }

    /// Decode to mono at the source rate, stopping at the analysis window
    fn decode_mono(&self, bytes: Vec<u8>, format: ContainerFormat) -> Result<(Vec<f32>, u32)> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => {
                    RecommendError::UnsupportedFormat(format!("{} container: {}", format, what))
                }
                other => RecommendError::Decode(format!("Failed to probe {} stream: {}", format, other)),
            })?;

        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| RecommendError::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let declared_rate = track.codec_params.sample_rate;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => {
                    RecommendError::UnsupportedFormat(format!("codec: {}", what))
                }
                other => RecommendError::Decode(format!("Failed to create decoder: {}", other)),
            })?;

        let mut mono: Vec<f32> = Vec::new();
        let mut source_rate = declared_rate;
        let mut frame_limit = declared_rate.map(|rate| max_frames(self.max_duration_secs, rate));

        loop {
            if let Some(limit) = frame_limit {
                if mono.len() >= limit {
                    break;
                }
            }

            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => {
                    return Err(RecommendError::Decode(format!("Error reading packet: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| RecommendError::Decode(format!("Failed to decode packet: {}", e)))?;

            let spec = *decoded.spec();
            if decoded.frames() == 0 {
                continue;
            }

            if source_rate.is_none() {
                source_rate = Some(spec.rate);
                frame_limit = Some(max_frames(self.max_duration_secs, spec.rate));
            }

            let channels = spec.channels.count().max(1);
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);

            mono.extend(
                buffer
                    .samples()
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }

        let source_rate = source_rate
            .ok_or_else(|| RecommendError::Decode("Sample rate unknown".to_string()))?;

        if let Some(limit) = frame_limit {
            mono.truncate(limit);
        }

        if mono.is_empty() {
            return Err(RecommendError::Decode("Stream contains no audio samples".to_string()));
        }

        Ok((mono, source_rate))
    }
}

/// Frames covering `seconds` at `rate`
fn max_frames(seconds: f64, rate: u32) -> usize {
    (seconds * rate as f64).ceil() as usize
}
