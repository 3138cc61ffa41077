//! Command-line interface for AudioBox
//!
//! Handles argument parsing, logging configuration and the stdin control
//! commands of the interactive session.

use anyhow::{bail, Result};
use audiobox::{Event, InterruptionNotification, ItemConfiguration, PlaybackAction, Settings};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

/// AudioBox - play or record one audio item, driven from stdin
#[derive(Parser, Debug)]
#[command(name = "audiobox")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Override the configured recordings directory
    #[arg(long, global = true)]
    pub recordings_dir: Option<PathBuf>,

    /// Override the configured capture sample rate
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub sample_rate: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a WAV file
    Play {
        file: PathBuf,

        /// Loop until stopped
        #[arg(long = "loop")]
        looped: bool,

        /// Delay the start by this many seconds
        #[arg(long, allow_negative_numbers = true)]
        start_in: Option<f64>,
    },
    /// Record into the recordings directory
    Record {
        /// Write takes here instead of the recordings directory
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Apply command-line overrides on top of stored settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.recordings_dir {
            settings.recordings_dir = dir.clone();
        }
        if let Some(rate) = self.sample_rate {
            settings.sample_rate = rate;
        }
    }

    /// Item configuration for the requested command
    pub fn configuration(&self, settings: &Settings) -> Result<ItemConfiguration> {
        match &self.command {
            Command::Play {
                file,
                looped,
                start_in,
            } => {
                let start_time = match start_in {
                    Some(secs) if !secs.is_finite() || *secs < 0.0 => {
                        bail!("--start-in must be a non-negative number of seconds")
                    }
                    Some(secs) => {
                        let delay = chrono::Duration::try_milliseconds((secs * 1000.0) as i64);
                        match delay.and_then(|delay| Utc::now().checked_add_signed(delay)) {
                            Some(start_time) => Some(start_time),
                            None => bail!("--start-in is out of range"),
                        }
                    }
                    None => None,
                };
                Ok(ItemConfiguration::Playback {
                    source: file.clone(),
                    start_time,
                    looped: *looped,
                })
            }
            Command::Record { dest } => Ok(ItemConfiguration::record(
                dest.clone()
                    .unwrap_or_else(|| settings.recordings_dir.clone()),
            )),
        }
    }
}

/// A line typed into the interactive session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Forward to the coordinator
    Event(ControlEvent),
    /// Simulate a session interruption
    Interruption(InterruptionKind),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Action(PlaybackAction),
    Deactivate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionKind {
    Began,
    Ended { should_resume: bool },
}

impl Control {
    pub fn parse(line: &str) -> Option<Self> {
        let control = match line.trim().to_ascii_lowercase().as_str() {
            "play" | "p" => Control::Event(ControlEvent::Action(PlaybackAction::Play)),
            "pause" => Control::Event(ControlEvent::Action(PlaybackAction::Pause)),
            "stop" | "s" => Control::Event(ControlEvent::Action(PlaybackAction::Stop)),
            "deactivate" => Control::Event(ControlEvent::Deactivate),
            "interrupt" | "i" => Control::Interruption(InterruptionKind::Began),
            "resume" | "r" => Control::Interruption(InterruptionKind::Ended {
                should_resume: true,
            }),
            "end" => Control::Interruption(InterruptionKind::Ended {
                should_resume: false,
            }),
            "help" | "h" | "?" => Control::Help,
            "quit" | "q" | "exit" => Control::Quit,
            _ => return None,
        };
        Some(control)
    }
}

impl ControlEvent {
    pub fn into_event(self) -> Event {
        match self {
            ControlEvent::Action(action) => Event::Action(action),
            ControlEvent::Deactivate => Event::DeactivateSession,
        }
    }
}

impl InterruptionKind {
    pub fn notification(self) -> InterruptionNotification {
        match self {
            InterruptionKind::Began => InterruptionNotification::began(),
            InterruptionKind::Ended { should_resume } => {
                InterruptionNotification::ended(should_resume)
            }
        }
    }
}

pub const HELP: &str = "\
commands:
  play, p         resume or start the item
  pause           pause the item
  stop, s         stop the item
  interrupt, i    simulate an interruption beginning
  resume, r       interruption ended, may resume
  end             interruption ended, do not resume
  deactivate      deactivate the session
  quit, q         deactivate and exit";

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    // Set audiobox modules to requested verbosity level
    builder.filter_module("audiobox", args.log_level());

    builder.format_timestamp_millis().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(args(&["audiobox", "record"]).log_level(), LevelFilter::Warn);
        assert_eq!(args(&["audiobox", "-vv", "record"]).log_level(), LevelFilter::Debug);
        assert_eq!(args(&["audiobox", "record", "-vvvv"]).log_level(), LevelFilter::Trace);
        assert_eq!(args(&["audiobox", "-q", "-v", "record"]).log_level(), LevelFilter::Error);
    }

    #[test]
    fn test_play_configuration() {
        let settings = Settings::default();
        let config = args(&["audiobox", "play", "nature.wav", "--loop"])
            .configuration(&settings)
            .unwrap();
        assert_eq!(
            config,
            ItemConfiguration::Playback {
                source: PathBuf::from("nature.wav"),
                start_time: None,
                looped: true,
            }
        );

        let config = args(&["audiobox", "play", "alarm.wav", "--start-in", "2.5"])
            .configuration(&settings)
            .unwrap();
        match config {
            ItemConfiguration::Playback { start_time, .. } => {
                assert!(start_time.unwrap() > Utc::now());
            }
            other => panic!("unexpected configuration {:?}", other),
        }

        assert!(args(&["audiobox", "play", "alarm.wav", "--start-in", "-1"])
            .configuration(&settings)
            .is_err());
    }

    #[test]
    fn test_huge_start_delay_is_rejected() {
        let settings = Settings::default();
        for secs in ["1e300", "1e15"] {
            let result = args(&["audiobox", "play", "alarm.wav", "--start-in", secs])
                .configuration(&settings);
            assert!(result.is_err(), "--start-in {} was accepted", secs);
        }
    }

    #[test]
    fn test_record_configuration_uses_overrides() {
        let parsed = args(&[
            "audiobox",
            "--recordings-dir",
            "/srv/takes",
            "--sample-rate",
            "16000",
            "record",
        ]);
        let mut settings = Settings::default();
        parsed.apply(&mut settings);
        assert_eq!(settings.sample_rate, 16000);
        assert_eq!(
            parsed.configuration(&settings).unwrap(),
            ItemConfiguration::record("/srv/takes")
        );

        let parsed = args(&["audiobox", "record", "--dest", "/tmp/elsewhere"]);
        assert_eq!(
            parsed.configuration(&settings).unwrap(),
            ItemConfiguration::record("/tmp/elsewhere")
        );
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        assert!(Args::try_parse_from(["audiobox", "--sample-rate", "0", "record"]).is_err());
        assert!(Args::try_parse_from(["audiobox", "--sample-rate", "8000", "record"]).is_ok());
    }

    #[test]
    fn test_control_parsing() {
        assert_eq!(
            Control::parse(" Pause "),
            Some(Control::Event(ControlEvent::Action(PlaybackAction::Pause)))
        );
        assert_eq!(
            Control::parse("i"),
            Some(Control::Interruption(InterruptionKind::Began))
        );
        assert_eq!(
            Control::parse("end"),
            Some(Control::Interruption(InterruptionKind::Ended {
                should_resume: false
            }))
        );
        assert_eq!(Control::parse("q"), Some(Control::Quit));
        assert_eq!(Control::parse("rewind"), None);
    }
}
