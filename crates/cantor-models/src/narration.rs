//! Long-form narration: one model, many sentences, one clip.

use crate::audio::{self, AudioError};
use crate::chunker::Segments;
use cantor_abstraction::{AudioClip, ModelError, SpeechModel, SpeechRequest};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while narrating.
#[derive(Debug, Error)]
pub enum NarrationError {
    /// The text produced no segments.
    #[error("Text contains nothing to narrate")]
    NothingToNarrate,

    /// The model failed on one segment.
    #[error("Segment {index} of {total} failed: {source}")]
    Segment {
        /// 1-based position of the failed segment.
        index: usize,
        /// Number of segments.
        total: usize,
        /// Model error.
        #[source]
        source: ModelError,
    },

    /// Segment outputs could not be joined.
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Progress report emitted after each segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentProgress<'a> {
    /// Segments finished so far.
    pub completed: usize,
    /// Total number of segments.
    pub total: usize,
    /// Text of the segment just finished.
    pub text: &'a str,
}

/// Result of a narration.
#[derive(Debug, Clone)]
pub struct Narration {
    /// Concatenated audio.
    pub clip: AudioClip,
    /// Number of segments generated.
    pub segments: usize,
}

/// Generate every segment with `model`, strictly in order, and join the
/// outputs.
///
/// `template` supplies language, reference and parameters; its text is
/// replaced by each segment in turn.
pub async fn narrate<F>(
    model: &dyn SpeechModel,
    segments: Segments,
    template: &SpeechRequest,
    mut on_progress: F,
) -> Result<Narration, NarrationError>
where
    F: FnMut(SegmentProgress<'_>),
{
    let total = segments.total();
    if total == 0 {
        return Err(NarrationError::NothingToNarrate);
    }
    info!(model_id = model.model_id(), total, "Starting narration");

    let mut clips = Vec::with_capacity(total);
    for (i, text) in segments.enumerate() {
        let request = SpeechRequest { text, ..template.clone() };
        let clip = model
            .generate(&request)
            .await
            .map_err(|source| NarrationError::Segment { index: i + 1, total, source })?;
        debug!(segment = i + 1, total, samples = clip.samples.len(), "Segment generated");
        clips.push(clip);
        on_progress(SegmentProgress { completed: i + 1, total, text: &request.text });
    }

    let clip = audio::concat(&clips)?;
    info!(
        model_id = model.model_id(),
        total,
        duration_secs = clip.duration().as_secs_f32(),
        "Narration finished"
    );
    Ok(Narration { clip, segments: total })
}
