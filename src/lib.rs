//! AudioBox - coordinates playback and recording of one active audio item
//!
//! External events (activation, transport actions, session deactivation) and
//! audio-session interruptions drive a small per-item state machine; state
//! changes are relayed to the engine that plays or records the item.

pub mod audio;
pub mod bus;
pub mod coordinator;
pub mod error;
pub mod item;
pub mod models;
pub mod session;
pub mod settings;

pub use bus::{Bus, Subscription};
pub use coordinator::AudioBox;
pub use error::{EngineError, SettingsError};
pub use item::AudioItem;
pub use models::{Event, ItemConfiguration, ItemState, PlaybackAction};
pub use session::{AudioSession, Interruption, InterruptionNotification};
pub use settings::Settings;
