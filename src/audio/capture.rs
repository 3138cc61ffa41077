//! Shared capture state with real-time volume metering
//!
//! The input stream writes every block here. Metering always follows the live
//! input; samples are only kept while the state is [`CaptureState::Capturing`].

use parking_lot::Mutex;
use std::sync::Arc;

/// Current state of audio capture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// Input may be open, but samples are discarded
    Idle,
    Capturing,
    Paused,
    Error,
}

/// Shared state for audio capture - thread-safe
#[derive(Clone)]
pub struct SharedCaptureState {
    inner: Arc<Mutex<CaptureStateInner>>,
}

struct CaptureStateInner {
    /// Smoothed RMS volume level (0.0 - 1.0)
    volume_level: f32,
    /// Peak volume level with slow decay
    peak_level: f32,
    /// Kept audio samples (f32, mono)
    samples: Vec<f32>,
    /// Duration of kept samples in seconds
    duration: f64,
    state: CaptureState,
    error: Option<String>,
    /// Sample rate reported by the input stream
    sample_rate: u32,
}

impl SharedCaptureState {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureStateInner {
                volume_level: 0.0,
                peak_level: 0.0,
                samples: Vec::new(),
                duration: 0.0,
                state: CaptureState::Idle,
                error: None,
                sample_rate,
            })),
        }
    }

    pub fn volume_level(&self) -> f32 {
        self.inner.lock().volume_level
    }

    pub fn peak_level(&self) -> f32 {
        self.inner.lock().peak_level
    }

    pub fn state(&self) -> CaptureState {
        self.inner.lock().state
    }

    pub fn duration(&self) -> f64 {
        self.inner.lock().duration
    }

    pub fn sample_count(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn set_state(&self, state: CaptureState) {
        self.inner.lock().state = state;
    }

    pub fn set_error(&self, error: String) {
        let mut inner = self.inner.lock();
        inner.error = Some(error);
        inner.state = CaptureState::Error;
    }

    /// Drop kept samples and metering, back to idle
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.samples.clear();
        inner.duration = 0.0;
        inner.volume_level = 0.0;
        inner.peak_level = 0.0;
        inner.error = None;
        inner.state = CaptureState::Idle;
    }

    /// Move the kept samples out, leaving the buffer empty
    pub fn take_samples(&self) -> Vec<f32> {
        let mut inner = self.inner.lock();
        inner.duration = 0.0;
        std::mem::take(&mut inner.samples)
    }

    /// Process incoming audio samples
    pub fn process_samples(&self, samples: &[f32], sample_rate: u32) {
        let mut inner = self.inner.lock();
        // Zero until the stream has negotiated a format
        if sample_rate > 0 {
            inner.sample_rate = sample_rate;
        }

        if samples.is_empty() {
            return;
        }

        // Smooth volume level for display
        let rms = calculate_rms(samples);
        inner.volume_level = inner.volume_level * 0.7 + rms * 0.3;

        // Track peak with slow decay
        inner.peak_level = (inner.peak_level * 0.95).max(calculate_peak(samples));

        if inner.state != CaptureState::Capturing {
            return;
        }

        inner.samples.extend_from_slice(samples);
        inner.duration = inner.samples.len() as f64 / inner.sample_rate as f64;
    }
}

/// Calculate RMS volume from samples
pub(crate) fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Calculate peak volume from samples
pub(crate) fn calculate_peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}
