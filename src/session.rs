//! Audio session: category configuration and interruption notifications
//!
//! Interruptions (an incoming call, another app taking the device) are posted
//! to the session as raw notifications, parsed into [`Interruption`] values
//! and published to every listener. Notifications that cannot be parsed are
//! dropped.

use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bus::{Bus, Subscription};
use crate::models::{Event, PlaybackAction};

/// Notification `kind` value for an interruption that has begun
pub const INTERRUPTION_BEGAN: u64 = 1;
/// Notification `kind` value for an interruption that has ended
pub const INTERRUPTION_ENDED: u64 = 0;
/// Option bit telling the app it may resume after an interruption ends
pub const OPTION_SHOULD_RESUME: u64 = 1;

/// What the session is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Playback,
    Record,
    PlayAndRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryOptions {
    /// Route output to the speaker rather than the receiver
    pub default_to_speaker: bool,
}

/// Session interruption phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Began,
    Ended { should_resume: bool },
}

impl Interruption {
    /// Parse a raw notification; `None` for payloads we do not understand
    pub fn from_notification(notification: &InterruptionNotification) -> Option<Self> {
        match notification.kind? {
            INTERRUPTION_BEGAN => Some(Interruption::Began),
            INTERRUPTION_ENDED => {
                let should_resume = notification
                    .options
                    .is_some_and(|options| options & OPTION_SHOULD_RESUME != 0);
                Some(Interruption::Ended { should_resume })
            }
            _ => None,
        }
    }

    /// Coordinator event this interruption maps to, if any
    pub fn into_event(self) -> Option<Event> {
        match self {
            Interruption::Began => Some(Event::Action(PlaybackAction::Pause)),
            Interruption::Ended {
                should_resume: true,
            } => Some(Event::Action(PlaybackAction::Play)),
            Interruption::Ended {
                should_resume: false,
            } => None,
        }
    }
}

/// Raw interruption payload as delivered by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptionNotification {
    pub kind: Option<u64>,
    pub options: Option<u64>,
}

impl InterruptionNotification {
    pub fn began() -> Self {
        Self {
            kind: Some(INTERRUPTION_BEGAN),
            options: None,
        }
    }

    pub fn ended(should_resume: bool) -> Self {
        Self {
            kind: Some(INTERRUPTION_ENDED),
            options: Some(if should_resume { OPTION_SHOULD_RESUME } else { 0 }),
        }
    }
}

struct SessionInner {
    config: Mutex<(Category, CategoryOptions)>,
    interruptions: Bus<Interruption>,
}

/// Shared handle to the process audio session
#[derive(Clone)]
pub struct AudioSession {
    inner: Arc<SessionInner>,
}

impl AudioSession {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config: Mutex::new((Category::default(), CategoryOptions::default())),
                interruptions: Bus::new(),
            }),
        }
    }

    pub fn set_category(&self, category: Category, options: CategoryOptions) {
        info!("Audio session category: {:?} {:?}", category, options);
        *self.inner.config.lock() = (category, options);
    }

    pub fn category(&self) -> (Category, CategoryOptions) {
        *self.inner.config.lock()
    }

    /// Deliver a raw platform notification to interruption listeners
    pub fn post(&self, notification: InterruptionNotification) {
        match Interruption::from_notification(&notification) {
            Some(interruption) => self.interrupt(interruption),
            None => debug!("Dropping unrecognized interruption {:?}", notification),
        }
    }

    pub fn interrupt(&self, interruption: Interruption) {
        debug!("Session interruption: {:?}", interruption);
        self.inner.interruptions.send(interruption);
    }

    pub fn subscribe_interruptions<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Interruption) + Send + Sync + 'static,
    {
        self.inner
            .interruptions
            .subscribe(move |interruption| listener(*interruption))
    }
}

impl Default for AudioSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(kind: Option<u64>, options: Option<u64>) -> Option<Interruption> {
        Interruption::from_notification(&InterruptionNotification { kind, options })
    }

    #[test]
    fn test_parse_notifications() {
        assert_eq!(parse(Some(1), None), Some(Interruption::Began));
        assert_eq!(
            parse(Some(0), Some(1)),
            Some(Interruption::Ended { should_resume: true })
        );
        assert_eq!(
            parse(Some(0), Some(0)),
            Some(Interruption::Ended { should_resume: false })
        );
        // Missing options means no resume hint
        assert_eq!(
            parse(Some(0), None),
            Some(Interruption::Ended { should_resume: false })
        );
        assert_eq!(parse(None, Some(1)), None);
        assert_eq!(parse(Some(7), None), None);
    }

    #[test]
    fn test_translation_to_events() {
        assert!(matches!(
            Interruption::Began.into_event(),
            Some(Event::Action(PlaybackAction::Pause))
        ));
        assert!(matches!(
            Interruption::Ended { should_resume: true }.into_event(),
            Some(Event::Action(PlaybackAction::Play))
        ));
        assert!(Interruption::Ended {
            should_resume: false
        }
        .into_event()
        .is_none());
    }

    #[test]
    fn test_post_drops_unrecognized_payloads() {
        let session = AudioSession::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = session.subscribe_interruptions(move |i| sink.lock().push(i));

        session.post(InterruptionNotification::began());
        session.post(InterruptionNotification {
            kind: Some(42),
            options: None,
        });
        session.post(InterruptionNotification::ended(true));

        assert_eq!(
            *seen.lock(),
            vec![
                Interruption::Began,
                Interruption::Ended { should_resume: true }
            ]
        );
    }

    #[test]
    fn test_category_configuration() {
        let session = AudioSession::new();
        assert_eq!(session.category().0, Category::Playback);

        let options = CategoryOptions {
            default_to_speaker: true,
        };
        session.clone().set_category(Category::PlayAndRecord, options);
        assert_eq!(session.category(), (Category::PlayAndRecord, options));
    }
}
