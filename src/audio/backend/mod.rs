//! Device streams feeding the engines
//!
//! Each stream runs on its own thread until stopped. The headless backend
//! paces the stream with a clock; the `pipewire` feature talks to PipeWire.

#[cfg(not(feature = "pipewire"))]
mod headless;
#[cfg(feature = "pipewire")]
mod pipewire_stream;

#[cfg(not(feature = "pipewire"))]
use headless as imp;
#[cfg(feature = "pipewire")]
use pipewire_stream as imp;

use std::thread::JoinHandle;

use super::capture::SharedCaptureState;
use super::playback::SharedPlaybackState;
use crate::error::EngineError;

/// Running device stream; stops and joins its thread when dropped
pub struct StreamHandle {
    stop: Option<Box<dyn FnOnce() + Send>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub(crate) fn new(stop: impl FnOnce() + Send + 'static, thread: JoinHandle<()>) -> Self {
        Self {
            stop: Some(Box::new(stop)),
            thread: Some(thread),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |thread| thread.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start an output stream pulling samples from `state`
pub(crate) fn spawn_output(state: SharedPlaybackState) -> Result<StreamHandle, EngineError> {
    imp::spawn_output(state)
}

/// Start an input stream pushing samples into `state`
pub(crate) fn spawn_input(
    state: SharedCaptureState,
    sample_rate: u32,
) -> Result<StreamHandle, EngineError> {
    imp::spawn_input(state, sample_rate)
}
