//! Clock-paced streams for machines without an audio server
//!
//! Output consumes samples at the source rate without rendering them; input
//! produces silence at the requested rate.

use log::{debug, trace};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::StreamHandle;
use crate::audio::capture::SharedCaptureState;
use crate::audio::playback::SharedPlaybackState;
use crate::error::EngineError;

/// Period of one stream block
const BLOCK: Duration = Duration::from_millis(10);

fn block_frames(sample_rate: u32) -> usize {
    (sample_rate as usize / 100).max(1)
}

pub(super) fn spawn_output(state: SharedPlaybackState) -> Result<StreamHandle, EngineError> {
    let (sender, receiver) = mpsc::channel::<()>();
    let frames = block_frames(state.sample_rate());

    let thread = thread::Builder::new()
        .name("audiobox-output".into())
        .spawn(move || {
            loop {
                if state.next_samples(frames).is_none() {
                    debug!("Output reached end of source");
                    state.set_playing(false);
                    break;
                }
                match receiver.recv_timeout(BLOCK) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    // Stop requested or handle dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            trace!("Output thread exiting");
        })?;

    Ok(StreamHandle::new(
        move || {
            let _ = sender.send(());
        },
        thread,
    ))
}

pub(super) fn spawn_input(
    state: SharedCaptureState,
    sample_rate: u32,
) -> Result<StreamHandle, EngineError> {
    let (sender, receiver) = mpsc::channel::<()>();
    let silence = vec![0.0f32; block_frames(sample_rate)];

    let thread = thread::Builder::new()
        .name("audiobox-input".into())
        .spawn(move || {
            loop {
                state.process_samples(&silence, sample_rate);
                match receiver.recv_timeout(BLOCK) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            trace!("Input thread exiting");
        })?;

    Ok(StreamHandle::new(
        move || {
            let _ = sender.send(());
        },
        thread,
    ))
}
