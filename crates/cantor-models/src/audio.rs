//! Audio helpers: normalization, concatenation and WAV I/O.

use cantor_abstraction::AudioClip;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use thiserror::Error;

/// Errors raised by the audio helpers.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Nothing to concatenate.
    #[error("No audio clips to concatenate")]
    Empty,

    /// A clip does not match the sample rate of the first clip.
    #[error("Clip {index} has sample rate {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        /// Position of the offending clip.
        index: usize,
        /// Sample rate of the first clip.
        expected: u32,
        /// Sample rate of the offending clip.
        found: u32,
    },

    /// The file has zero channels or a zero sample rate.
    #[error("Invalid audio layout: {0}")]
    InvalidLayout(String),

    /// Reading or writing the WAV container failed.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Bring samples into [-1.0, 1.0].
///
/// A peak above 1.0 scales the whole signal down; anything left outside the
/// range is clipped.
pub fn normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    if peak > 1.0 + 1e-6 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
    for s in samples.iter_mut() {
        *s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
    }
}

/// Peak level that [`normalize_loudness`] brings a clip to (about -1 dBFS).
pub const LOUDNESS_TARGET_PEAK: f32 = 0.891;

/// Scale the whole signal so its peak sits at [`LOUDNESS_TARGET_PEAK`].
///
/// Silence is left untouched. One gain is applied to every sample, so the
/// relative levels inside the clip are kept.
pub fn normalize_loudness(samples: &mut [f32]) {
    let peak = samples.iter().filter(|s| !s.is_nan()).fold(0.0_f32, |m, s| m.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }
    let gain = LOUDNESS_TARGET_PEAK / peak;
    for s in samples.iter_mut() {
        *s = if s.is_nan() { 0.0 } else { (*s * gain).clamp(-1.0, 1.0) };
    }
}

/// Average interleaved channels down to mono.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved.chunks(channels).map(|frame| frame.iter().sum::<f32>() / frame.len() as f32).collect()
}

/// Join clips end to end, in order.
///
/// # Errors
/// Returns `AudioError::Empty` for no clips and
/// `AudioError::SampleRateMismatch` when the rates differ.
pub fn concat(clips: &[AudioClip]) -> Result<AudioClip, AudioError> {
    let first = clips.first().ok_or(AudioError::Empty)?;
    let expected = first.sample_rate;

    let mut samples = Vec::with_capacity(clips.iter().map(|c| c.samples.len()).sum());
    for (index, clip) in clips.iter().enumerate() {
        if clip.sample_rate != expected {
            return Err(AudioError::SampleRateMismatch { index, expected, found: clip.sample_rate });
        }
        samples.extend_from_slice(&clip.samples);
    }
    Ok(AudioClip::new(samples, expected))
}

/// Convert float samples to 16-bit PCM with a symmetric mapping.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&x| {
            let x = x.clamp(-1.0, 1.0);
            if x >= 0.0 { (x * 32767.0).round() as i16 } else { (x * 32768.0).round() as i16 }
        })
        .collect()
}

/// Read a WAV file as a normalized mono clip.
///
/// # Errors
/// Returns `AudioError` if the file cannot be read or has an invalid layout.
pub fn read_wav(path: impl AsRef<Path>) -> Result<AudioClip, AudioError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(AudioError::InvalidLayout(format!(
            "{} channels at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
    };

    let mut samples = downmix(&interleaved, usize::from(spec.channels));
    normalize(&mut samples);
    Ok(AudioClip::new(samples, spec.sample_rate))
}

/// Write a clip as 16-bit PCM mono WAV.
///
/// # Errors
/// Returns `AudioError` if the file cannot be written.
pub fn write_wav(path: impl AsRef<Path>, clip: &AudioClip) -> Result<(), AudioError> {
    if clip.sample_rate == 0 {
        return Err(AudioError::InvalidLayout("sample rate must be > 0".to_string()));
    }
    let spec = WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for sample in f32_to_pcm16(&clip.samples) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
