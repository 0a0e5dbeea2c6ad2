//! Global tempo estimation
//!
//! Onset strength is the mean positive change in log-mel energy between
//! consecutive frames. The mean-removed onset envelope is autocorrelated over
//! lags spanning MIN_BPM..MAX_BPM and weighted by a log-normal prior centred on
//! PRIOR_BPM, one octave wide. A signal without periodic onsets scores 0 BPM.

/// Slowest tempo considered
pub const MIN_BPM: f64 = 30.0;

/// Fastest tempo considered
pub const MAX_BPM: f64 = 300.0;

/// Centre of the tempo prior
pub const PRIOR_BPM: f64 = 120.0;

/// Onset strength per frame (first frame is 0)
pub fn onset_envelope(log_mel_frames: &[Vec<f64>]) -> Vec<f64> {
    let mut envelope = Vec::with_capacity(log_mel_frames.len());
    if log_mel_frames.is_empty() {
        return envelope;
    }
    envelope.push(0.0);

    for pair in log_mel_frames.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let bands = current.len().max(1) as f64;
        let flux: f64 = current
            .iter()
            .zip(previous)
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        envelope.push(flux / bands);
    }

    envelope
}

/// Tempo in BPM from an onset envelope sampled at `frame_rate` Hz
pub fn estimate_tempo(envelope: &[f64], frame_rate: f64) -> f64 {
    if envelope.is_empty() || frame_rate <= 0.0 {
        return 0.0;
    }

    let min_lag = (60.0 * frame_rate / MAX_BPM).ceil().max(1.0) as usize;
    let max_lag = ((60.0 * frame_rate / MIN_BPM).floor() as usize).min(envelope.len() - 1);
    if max_lag < min_lag {
        return 0.0;
    }

    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    let centred: Vec<f64> = envelope.iter().map(|v| v - mean).collect();
    let variance = centred.iter().map(|v| v * v).sum::<f64>() / centred.len() as f64;
    if variance <= 1e-12 {
        return 0.0;
    }

    let mut best: Option<(usize, f64)> = None;
    for lag in min_lag..=max_lag {
        let overlap = centred.len() - lag;
        let correlation = centred[..overlap]
            .iter()
            .zip(&centred[lag..])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / overlap as f64;

        let bpm = 60.0 * frame_rate / lag as f64;
        let score = correlation * prior_weight(bpm);

        // Strictly greater keeps the shortest lag on ties
        if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((lag, score));
        }
    }

    best.map_or(0.0, |(lag, _)| 60.0 * frame_rate / lag as f64)
}

fn prior_weight(bpm: f64) -> f64 {
    let octaves = (bpm / PRIOR_BPM).log2();
    (-0.5 * octaves * octaves).exp()
}
