//! WAV file recording using hound
//!
//! [`WavRecorder`] reads and writes mono f32 WAV files; [`RecordingEngine`]
//! captures from the input stream and writes one file per take.

use hound::{WavSpec, WavWriter};
use log::{debug, error, info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::backend::{self, StreamHandle};
use super::capture::{CaptureState, SharedCaptureState};
use super::AudioEngine;
use crate::error::EngineError;

pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// WAV file reader/writer rooted at a recordings directory
#[derive(Debug, Clone)]
pub struct WavRecorder {
    spec: WavSpec,
    recordings_dir: PathBuf,
}

impl WavRecorder {
    /// Create a recorder writing 32-bit float mono files into `recordings_dir`
    pub fn new(recordings_dir: impl AsRef<Path>) -> Self {
        let spec = WavSpec {
            channels: 1,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        Self {
            spec,
            recordings_dir: recordings_dir.as_ref().to_path_buf(),
        }
    }

    /// Set the sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.spec.sample_rate = rate;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Ensure the recordings directory exists
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.recordings_dir)
    }

    /// Generate a unique filename for a new recording
    pub fn generate_filename(&self) -> PathBuf {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        self.recordings_dir
            .join(format!("recording_{}_{}.wav", timestamp, &uuid[..8]))
    }

    /// Save samples to a WAV file
    ///
    /// Returns the path to the saved file
    pub fn save(&self, samples: &[f32], filename: Option<&Path>) -> Result<PathBuf, EngineError> {
        self.ensure_dir()?;

        let path = match filename {
            Some(p) => p.to_path_buf(),
            None => self.generate_filename(),
        };

        let write_error = |source: hound::Error| EngineError::Write {
            path: path.clone(),
            source,
        };

        let file = File::create(&path)?;
        let mut wav_writer =
            WavWriter::new(BufWriter::new(file), self.spec).map_err(write_error)?;

        for &sample in samples {
            wav_writer.write_sample(sample).map_err(write_error)?;
        }

        wav_writer.finalize().map_err(write_error)?;

        Ok(path)
    }

    /// Load a WAV file as mono f32 samples
    ///
    /// Returns the samples and sample rate
    pub fn load(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32), EngineError> {
        let path = path.as_ref();
        let open_error = |source: hound::Error| EngineError::Open {
            path: path.to_path_buf(),
            source,
        };

        let reader = hound::WavReader::open(path).map_err(open_error)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(open_error)?,
            hound::SampleFormat::Int => {
                // Convert integer samples to float
                let max_value = (1u32 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_value))
                    .collect::<Result<_, _>>()
                    .map_err(open_error)?
            }
        };

        // Mix down to mono
        let samples = if channels > 1 {
            samples
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        } else {
            samples
        };

        Ok((samples, spec.sample_rate))
    }

    /// Get duration of samples in seconds
    pub fn duration_seconds(sample_count: usize, sample_rate: u32) -> f64 {
        sample_count as f64 / sample_rate as f64
    }
}

/// Engine capturing takes into generated files under a destination directory
pub struct RecordingEngine {
    writer: WavRecorder,
    capture: SharedCaptureState,
    stream: Option<StreamHandle>,
    saved: Vec<PathBuf>,
}

impl RecordingEngine {
    pub fn new(destination: impl AsRef<Path>) -> Self {
        Self {
            writer: WavRecorder::new(destination),
            capture: SharedCaptureState::new(DEFAULT_SAMPLE_RATE),
            stream: None,
            saved: Vec::new(),
        }
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.writer = self.writer.with_sample_rate(rate);
        self.capture = SharedCaptureState::new(rate);
        self
    }

    /// Open the input stream now; input is discarded until `run`
    pub fn activate(&mut self) -> Result<(), EngineError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.writer.ensure_dir()?;
        let stream = backend::spawn_input(self.capture.clone(), self.writer.sample_rate())?;
        debug!(
            "Input open for recordings in {}",
            self.writer.recordings_dir().display()
        );
        self.stream = Some(stream);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Shared capture state for level metering
    pub fn shared_state(&self) -> SharedCaptureState {
        self.capture.clone()
    }

    /// Files written so far, oldest first
    pub fn saved_recordings(&self) -> &[PathBuf] {
        &self.saved
    }

    fn finish_take(&mut self) {
        let sample_rate = self.capture.sample_rate();
        let samples = self.capture.take_samples();
        if samples.is_empty() {
            debug!("Nothing captured, no recording written");
            return;
        }

        // Use the actual capture sample rate for the WAV file
        let writer = self.writer.clone().with_sample_rate(sample_rate);
        match writer.save(&samples, None) {
            Ok(path) => {
                info!(
                    "Saved {:.1}s recording to {}",
                    WavRecorder::duration_seconds(samples.len(), sample_rate),
                    path.display()
                );
                self.saved.push(path);
            }
            Err(e) => error!("Failed to save recording: {}", e),
        }
    }
}

impl AudioEngine for RecordingEngine {
    fn prepare(&mut self) {
        self.capture.reset();
    }

    fn run(&mut self) {
        if self.stream.is_none() {
            warn!("Input was not activated up front, opening it now");
            if let Err(e) = self.activate() {
                error!("Failed to open input: {}", e);
                self.capture.set_error(e.to_string());
                return;
            }
        }
        self.capture.set_state(CaptureState::Capturing);
        info!("Recording");
    }

    fn pause(&mut self) {
        if self.capture.state() == CaptureState::Capturing {
            self.capture.set_state(CaptureState::Paused);
        }
    }

    fn stop(&mut self) {
        self.capture.set_state(CaptureState::Idle);
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.finish_take();
    }
}
