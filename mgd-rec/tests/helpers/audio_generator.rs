//! Audio Test Fixture Generator
//!
//! Synthesises WAV fixtures in memory with hound

use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Configuration for a generated tone
#[derive(Debug, Clone)]
pub struct ToneConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency: f64,
    pub amplitude: f64,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 3.0,
            sample_rate: 44100,
            channels: 2,
            frequency: 440.0,
            amplitude: 0.3,
        }
    }
}

impl ToneConfig {
    pub fn tone(frequency: f64) -> Self {
        Self {
            frequency,
            ..Default::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            amplitude: 0.0,
            ..Default::default()
        }
    }
}

fn sample_at(config: &ToneConfig, i: usize) -> i16 {
    let t = i as f64 / config.sample_rate as f64;
    let value = config.amplitude * (2.0 * std::f64::consts::PI * config.frequency * t).sin();
    (value * i16::MAX as f64) as i16
}

fn write_tone<W>(writer: &mut hound::WavWriter<W>, config: &ToneConfig) -> anyhow::Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;
    for i in 0..total_samples {
        let sample = sample_at(config, i);
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }
    Ok(())
}

fn wav_spec(config: &ToneConfig) -> hound::WavSpec {
    hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Generate a 16-bit PCM WAV file image in memory
pub fn generate_wav_bytes(config: &ToneConfig) -> anyhow::Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(config))?;
        write_tone(&mut writer, config)?;
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Generate a WAV file on disk
///
/// # Arguments
/// * `path` - Output file path
/// * `config` - Tone configuration
pub fn generate_test_wav(path: &Path, config: &ToneConfig) -> anyhow::Result<PathBuf> {
    let mut writer = hound::WavWriter::create(path, wav_spec(config))?;
    write_tone(&mut writer, config)?;
    writer.finalize()?;
    Ok(path.to_path_buf())
}
