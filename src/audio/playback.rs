//! Audio playback engine
//!
//! Plays a WAV file through the output stream with position tracking, an
//! optional scheduled start time and looping.

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::backend::{self, StreamHandle};
use super::recorder::WavRecorder;
use super::AudioEngine;
use crate::error::EngineError;

/// Shared state for audio playback - thread-safe
#[derive(Clone)]
pub struct SharedPlaybackState {
    inner: Arc<Mutex<PlaybackStateInner>>,
}

struct PlaybackStateInner {
    /// Audio samples to play (mono)
    samples: Vec<f32>,
    sample_rate: u32,
    /// Current playback position (sample index)
    position: usize,
    /// Total duration in seconds
    duration: f64,
    is_playing: bool,
    /// Wrap to the start instead of finishing
    looped: bool,
    /// Emit silence until this instant (scheduled start)
    hold_until: Option<Instant>,
}

impl SharedPlaybackState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlaybackStateInner {
                samples: Vec::new(),
                sample_rate: 48000,
                position: 0,
                duration: 0.0,
                is_playing: false,
                looped: false,
                hold_until: None,
            })),
        }
    }

    /// Load audio samples for playback
    pub fn load(&self, samples: Vec<f32>, sample_rate: u32) {
        let mut inner = self.inner.lock();
        inner.duration = WavRecorder::duration_seconds(samples.len(), sample_rate);
        inner.samples = samples;
        inner.sample_rate = sample_rate;
        inner.position = 0;
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate
    }

    /// Current playback position in seconds
    pub fn current_time(&self) -> f64 {
        let inner = self.inner.lock();
        inner.position as f64 / inner.sample_rate as f64
    }

    pub fn position(&self) -> usize {
        self.inner.lock().position
    }

    /// Total duration in seconds
    pub fn duration(&self) -> f64 {
        self.inner.lock().duration
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().is_playing
    }

    pub fn is_looped(&self) -> bool {
        self.inner.lock().looped
    }

    /// Playback progress as fraction (0.0 - 1.0)
    pub fn progress(&self) -> f32 {
        let inner = self.inner.lock();
        if inner.samples.is_empty() {
            0.0
        } else {
            inner.position as f32 / inner.samples.len() as f32
        }
    }

    /// True once a non-looped source has played to the end
    pub fn is_finished(&self) -> bool {
        let inner = self.inner.lock();
        !inner.looped && inner.position >= inner.samples.len()
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.inner.lock().is_playing = playing;
    }

    pub(crate) fn set_looped(&self, looped: bool) {
        self.inner.lock().looped = looped;
    }

    /// Output silence for `delay` before the first sample
    pub(crate) fn hold_for(&self, delay: Duration) {
        self.inner.lock().hold_until = Some(Instant::now() + delay);
    }

    /// Reset playback position to start and cancel any scheduled start
    pub fn rewind(&self) {
        let mut inner = self.inner.lock();
        inner.position = 0;
        inner.hold_until = None;
    }

    /// Next block for the output stream (advances position)
    ///
    /// Returns `None` once a non-looped source is exhausted.
    pub(crate) fn next_samples(&self, count: usize) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();

        if let Some(until) = inner.hold_until {
            if Instant::now() < until {
                return Some(vec![0.0; count]);
            }
            inner.hold_until = None;
        }

        let mut out = Vec::with_capacity(count);
        while out.len() < count && !inner.samples.is_empty() {
            if inner.position >= inner.samples.len() {
                if !inner.looped {
                    break;
                }
                inner.position = 0;
            }
            let start = inner.position;
            let end = (start + count - out.len()).min(inner.samples.len());
            out.extend_from_slice(&inner.samples[start..end]);
            inner.position = end;
        }

        if !inner.looped && inner.position >= inner.samples.len() {
            inner.is_playing = false;
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

impl Default for SharedPlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine playing one WAV source
pub struct PlaybackEngine {
    source: PathBuf,
    state: SharedPlaybackState,
    start_time: Option<DateTime<Utc>>,
    stream: Option<StreamHandle>,
}

impl PlaybackEngine {
    /// Open and decode `source`; fails if it is not a readable WAV file
    pub fn open(source: impl AsRef<Path>) -> Result<Self, EngineError> {
        let source = source.as_ref().to_path_buf();
        let (samples, sample_rate) = WavRecorder::load(&source)?;
        debug!(
            "Loaded {} ({} samples at {} Hz)",
            source.display(),
            samples.len(),
            sample_rate
        );

        let state = SharedPlaybackState::new();
        state.load(samples, sample_rate);

        Ok(Self {
            source,
            state,
            start_time: None,
            stream: None,
        })
    }

    /// Hold the first `run` until this wall-clock time
    pub fn with_start_time(mut self, start_time: Option<DateTime<Utc>>) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_looped(self, looped: bool) -> Self {
        self.state.set_looped(looped);
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Shared playback state for position updates
    pub fn shared_state(&self) -> SharedPlaybackState {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| !stream.is_finished())
    }

    fn halt_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.state.set_playing(false);
    }
}

impl AudioEngine for PlaybackEngine {
    fn prepare(&mut self) {
        self.state.rewind();
        debug!("Prepared {}", self.source.display());
    }

    fn run(&mut self) {
        if self.is_running() {
            return;
        }
        // Reap a stream that reached the end on its own
        self.stream = None;

        if self.state.is_finished() {
            self.state.rewind();
        }

        if let Some(start_time) = self.start_time.take() {
            // Negative deltas (start time already passed) play immediately
            if let Ok(delay) = (start_time - Utc::now()).to_std() {
                debug!("Delaying {} by {:?}", self.source.display(), delay);
                self.state.hold_for(delay);
            }
        }

        self.state.set_playing(true);
        match backend::spawn_output(self.state.clone()) {
            Ok(stream) => {
                info!("Playing {}", self.source.display());
                self.stream = Some(stream);
            }
            Err(e) => {
                error!("Failed to start playback of {}: {}", self.source.display(), e);
                self.state.set_playing(false);
            }
        }
    }

    fn pause(&mut self) {
        self.halt_stream();
        debug!(
            "Paused {} at {:.2}s",
            self.source.display(),
            self.state.current_time()
        );
    }

    fn stop(&mut self) {
        self.halt_stream();
        self.state.rewind();
        info!("Stopped {}", self.source.display());
    }
}
