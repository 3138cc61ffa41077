//! Audio engines driven by item state
//!
//! This module provides:
//! - The four-operation [`AudioEngine`] capability the coordinator depends on
//! - WAV playback with scheduled start and looping
//! - Microphone capture with metering and WAV recording via hound
//! - Device streams (headless by default, PipeWire with the `pipewire` feature)

mod backend;
mod capture;
mod playback;
mod recorder;

pub use backend::StreamHandle;
pub use capture::{CaptureState, SharedCaptureState};
pub use playback::{PlaybackEngine, SharedPlaybackState};
pub use recorder::{RecordingEngine, WavRecorder};

use log::trace;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::EngineError;
use crate::models::{ItemConfiguration, ItemState};

/// Something that can produce or consume audio
///
/// Operations are fire-and-forget: failures are logged by the engine and
/// never reported back.
pub trait AudioEngine: Send {
    /// Get ready without producing output
    fn prepare(&mut self);
    /// Begin producing or consuming audio
    fn run(&mut self);
    /// Suspend, keeping position so `run` can resume
    fn pause(&mut self);
    /// Terminate; not expected to resume
    fn stop(&mut self);
}

pub type SharedEngine = Arc<Mutex<dyn AudioEngine>>;

/// Invoke the engine operation matching an item state
pub fn drive(engine: &mut dyn AudioEngine, state: ItemState) {
    trace!("Driving engine for state {}", state);
    match state {
        ItemState::Initial => engine.prepare(),
        ItemState::Running => engine.run(),
        ItemState::Paused => engine.pause(),
        ItemState::Stopped => engine.stop(),
    }
}

/// Builds the engine realizing an item configuration
pub trait EngineFactory: Send + Sync {
    fn build(&self, configuration: &ItemConfiguration) -> Result<SharedEngine, EngineError>;
}

/// Factory producing device-backed playback and recording engines
#[derive(Debug, Clone)]
pub struct DeviceEngineFactory {
    sample_rate: u32,
}

impl DeviceEngineFactory {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Default for DeviceEngineFactory {
    fn default() -> Self {
        Self::new(recorder::DEFAULT_SAMPLE_RATE)
    }
}

impl EngineFactory for DeviceEngineFactory {
    fn build(&self, configuration: &ItemConfiguration) -> Result<SharedEngine, EngineError> {
        match configuration {
            ItemConfiguration::Playback {
                source,
                start_time,
                looped,
            } => {
                let engine = PlaybackEngine::open(source)?
                    .with_start_time(*start_time)
                    .with_looped(*looped);
                let engine: SharedEngine = Arc::new(Mutex::new(engine));
                Ok(engine)
            }
            ItemConfiguration::Record { destination } => {
                let mut engine =
                    RecordingEngine::new(destination).with_sample_rate(self.sample_rate);
                // Open the input now: starting it later from the background fails
                // on some platforms, so input is taken and ignored until `run`.
                engine.activate()?;
                let engine: SharedEngine = Arc::new(Mutex::new(engine));
                Ok(engine)
            }
        }
    }
}
