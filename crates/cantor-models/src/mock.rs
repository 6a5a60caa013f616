//! Deterministic synthetic backend.
//!
//! The mock engine turns each character into a short tone, so the same text
//! always yields the same samples. It records loads, releases and reclamation
//! hints, which makes it the backend of choice for tests and dry runs.

use async_trait::async_trait;
use cantor_abstraction::{AudioClip, LoadTarget, ModelError, ModelLoader, SpeechModel, SpeechRequest};
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Output sample rate of the mock engine.
pub const MOCK_SAMPLE_RATE: u32 = 24_000;

/// Samples emitted per character (20 ms at 24 kHz).
const SAMPLES_PER_CHAR: usize = 480;

/// A synthetic speech model.
#[derive(Debug)]
pub struct MockSpeechModel {
    id: String,
    sample_rate: u32,
    released: AtomicBool,
    release_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    fail_release: bool,
}

impl MockSpeechModel {
    /// Creates a new `MockSpeechModel` with the given ID.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self::with_sample_rate(id, MOCK_SAMPLE_RATE)
    }

    /// Creates a model that emits audio at `sample_rate`.
    #[must_use]
    pub fn with_sample_rate(id: String, sample_rate: u32) -> Self {
        Self {
            id,
            sample_rate,
            released: AtomicBool::new(false),
            release_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            fail_release: false,
        }
    }

    /// Make `release` report an error (the handle is still marked released).
    #[must_use]
    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// How many times `release` was invoked.
    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    /// How many times `generate` was invoked.
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Whether the handle has been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn synthesize(&self, request: &SpeechRequest) -> Vec<f32> {
        let seed_shift = (request.parameters.seed % 7) as f32;
        let gain = 0.25 + 0.1 * request.parameters.exaggeration.min(2.0);
        let rate = self.sample_rate as f32;

        let mut samples = Vec::with_capacity(request.text.chars().count() * SAMPLES_PER_CHAR);
        for ch in request.text.chars() {
            if ch.is_whitespace() {
                samples.extend(std::iter::repeat_n(0.0, SAMPLES_PER_CHAR));
                continue;
            }
            let freq = 180.0 + (u32::from(ch) % 48) as f32 * 12.0 + seed_shift;
            samples.extend(
                (0..SAMPLES_PER_CHAR).map(|i| gain * (TAU * freq * i as f32 / rate).sin()),
            );
        }
        samples
    }
}

#[async_trait]
impl SpeechModel for MockSpeechModel {
    async fn generate(&self, request: &SpeechRequest) -> Result<AudioClip, ModelError> {
        if self.is_released() {
            return Err(ModelError::Released(self.id.clone()));
        }
        if request.text.trim().is_empty() {
            return Err(ModelError::InvalidInput("text is empty".to_string()));
        }
        request.parameters.validate()?;
        self.generate_calls.fetch_add(1, Ordering::SeqCst);

        debug!(
            model_id = %self.id,
            chars = request.text.chars().count(),
            speaker = ?request.speaker,
            has_reference = request.reference.is_some(),
            "MockSpeechModel generating audio"
        );

        Ok(AudioClip::new(self.synthesize(request), self.sample_rate))
    }

    fn release(&self) -> Result<(), ModelError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.released.store(true, Ordering::SeqCst);
        if self.fail_release {
            return Err(ModelError::ReleaseError(format!("teardown of {} failed", self.id)));
        }
        Ok(())
    }

    fn model_id(&self) -> &str {
        &self.id
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Loader for [`MockSpeechModel`] handles.
///
/// Keeps every handle it created so tests can inspect release counts.
#[derive(Debug, Default)]
pub struct MockLoader {
    delay: Duration,
    fail_next: AtomicUsize,
    fail_release: bool,
    sample_rates: HashMap<String, u32>,
    loads: AtomicUsize,
    reclaims: AtomicUsize,
    created: Mutex<Vec<Arc<MockSpeechModel>>>,
}

impl MockLoader {
    /// Creates a loader with no delay and no scripted failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every load.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `count` loads.
    #[must_use]
    pub fn failing_first(self, count: usize) -> Self {
        self.fail_next.store(count, Ordering::SeqCst);
        self
    }

    /// Handles created by this loader report an error on release.
    #[must_use]
    pub fn with_failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Models with id `model_id` emit audio at `sample_rate`.
    #[must_use]
    pub fn with_sample_rate(mut self, model_id: &str, sample_rate: u32) -> Self {
        self.sample_rates.insert(model_id.to_string(), sample_rate);
        self
    }

    /// Schedule `count` more failing loads.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of load invocations (successful or not).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of successful loads for one model id.
    pub fn load_count_for(&self, model_id: &str) -> usize {
        self.handles_for(model_id).len()
    }

    /// Number of reclamation hints received.
    pub fn reclaim_count(&self) -> usize {
        self.reclaims.load(Ordering::SeqCst)
    }

    /// Handles successfully created for `model_id`, oldest first.
    pub fn handles_for(&self, model_id: &str) -> Vec<Arc<MockSpeechModel>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.model_id() == model_id)
            .cloned()
            .collect()
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    async fn load(&self, target: &LoadTarget) -> Result<Arc<dyn SpeechModel>, ModelError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.take_failure() {
            return Err(ModelError::LoadError(format!(
                "simulated failure fetching {}",
                target.repo_id
            )));
        }

        let sample_rate =
            self.sample_rates.get(&target.model_id).copied().unwrap_or(MOCK_SAMPLE_RATE);
        let mut model = MockSpeechModel::with_sample_rate(target.model_id.clone(), sample_rate);
        if self.fail_release {
            model = model.failing_release();
        }
        let model = Arc::new(model);
        self.created.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::clone(&model));

        debug!(
            model_id = %target.model_id,
            device = %target.options.device,
            precision = %target.options.precision,
            "MockLoader created model"
        );
        Ok(model)
    }

    fn reclaim(&self) {
        self.reclaims.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "mock"
    }
}
