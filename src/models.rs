use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::item::AudioItem;

/// How an audio item is realized by an engine
///
/// Only consulted when the item is created; the coordinator does not keep it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ItemConfiguration {
    /// Play a WAV file, optionally at a scheduled wall-clock time, optionally looped
    Playback {
        source: PathBuf,
        #[serde(default)]
        start_time: Option<DateTime<Utc>>,
        #[serde(default)]
        looped: bool,
    },
    /// Record into WAV files generated under a destination directory
    Record { destination: PathBuf },
}

impl ItemConfiguration {
    pub fn playback(source: impl Into<PathBuf>) -> Self {
        Self::Playback {
            source: source.into(),
            start_time: None,
            looped: false,
        }
    }

    pub fn record(destination: impl Into<PathBuf>) -> Self {
        Self::Record {
            destination: destination.into(),
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }
}

/// Transport actions routed to the current item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackAction {
    Play,
    Pause,
    Stop,
}

/// Lifecycle of an audio item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    #[default]
    Initial,
    Running,
    Paused,
    Stopped,
}

impl ItemState {
    /// State reached by applying `action`
    ///
    /// `Stopped` is terminal: a stopped item ignores every further action.
    pub fn apply(self, action: PlaybackAction) -> ItemState {
        match (self, action) {
            (ItemState::Stopped, _) => ItemState::Stopped,
            (_, PlaybackAction::Play) => ItemState::Running,
            (_, PlaybackAction::Pause) => ItemState::Paused,
            (_, PlaybackAction::Stop) => ItemState::Stopped,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ItemState::Stopped
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ItemState::Initial => "initial",
            ItemState::Running => "running",
            ItemState::Paused => "paused",
            ItemState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// External events consumed by the coordinator
#[derive(Debug, Clone)]
pub enum Event {
    /// Make this item the current one (retiring the previous) and start it
    Activate(AudioItem),
    /// Forward a transport action to the current item
    Action(PlaybackAction),
    /// Drop the current item and every registered engine
    DeactivateSession,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_drive_states() {
        assert_eq!(ItemState::Initial.apply(PlaybackAction::Play), ItemState::Running);
        assert_eq!(ItemState::Running.apply(PlaybackAction::Pause), ItemState::Paused);
        assert_eq!(ItemState::Paused.apply(PlaybackAction::Play), ItemState::Running);
        assert_eq!(ItemState::Initial.apply(PlaybackAction::Stop), ItemState::Stopped);
    }

    #[test]
    fn test_pause_is_idempotent() {
        assert_eq!(ItemState::Paused.apply(PlaybackAction::Pause), ItemState::Paused);
    }

    #[test]
    fn test_stopped_is_terminal() {
        for action in [PlaybackAction::Play, PlaybackAction::Pause, PlaybackAction::Stop] {
            assert_eq!(ItemState::Stopped.apply(action), ItemState::Stopped);
        }
        assert!(ItemState::Stopped.is_terminal());
        assert!(!ItemState::Paused.is_terminal());
    }

    #[test]
    fn test_configuration_serde() {
        let json = r#"{"mode":"playback","source":"/tmp/nature.wav","looped":true}"#;
        let config: ItemConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(
            config,
            ItemConfiguration::Playback {
                source: PathBuf::from("/tmp/nature.wav"),
                start_time: None,
                looped: true,
            }
        );

        let record = ItemConfiguration::record("/tmp/takes");
        assert!(record.is_record());
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"mode":"record","destination":"/tmp/takes"}"#);
    }
}
