//! Audio items and their lifecycle state machine

use log::debug;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use uuid::Uuid;

use crate::bus::{Bus, Subscription};
use crate::models::{ItemState, PlaybackAction};

struct ItemInner {
    id: Uuid,
    /// Latest state, observable by async consumers
    state: watch::Sender<ItemState>,
    /// Every transition, delivered in order to synchronous listeners
    transitions: Bus<ItemState>,
}

/// Handle to one audio item
///
/// Cloning the handle is cheap; all clones share identity and state. Two
/// handles are equal when they refer to the same item.
#[derive(Clone)]
pub struct AudioItem {
    inner: Arc<ItemInner>,
}

impl AudioItem {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ItemState::Initial);
        Self {
            inner: Arc::new(ItemInner {
                id: Uuid::new_v4(),
                state,
                transitions: Bus::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> ItemState {
        *self.inner.state.borrow()
    }

    /// Receiver that always holds the latest state
    pub fn watch_state(&self) -> watch::Receiver<ItemState> {
        self.inner.state.subscribe()
    }

    /// Call `listener` with the current state, then with every transition.
    pub fn subscribe_state<F>(&self, listener: F) -> Subscription
    where
        F: Fn(ItemState) + Send + Sync + 'static,
    {
        listener(self.state());
        self.inner.transitions.subscribe(move |state| listener(*state))
    }

    /// Apply a transport action.
    ///
    /// Repeating the current action re-emits the same state. Once stopped the
    /// item ignores further actions.
    pub(crate) fn handle(&self, action: PlaybackAction) {
        let mut transition = None;
        self.inner.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            let next = state.apply(action);
            transition = Some((*state, next));
            *state = next;
            true
        });

        match transition {
            Some((from, to)) => {
                debug!("Item {}: {} -> {} ({:?})", self.inner.id, from, to, action);
                self.inner.transitions.send(to);
            }
            None => debug!(
                "Item {} is stopped, ignoring {:?}",
                self.inner.id, action
            ),
        }
    }

    /// Relay every action sent on `actions` into this item
    pub(crate) fn attach(&self, actions: &Bus<PlaybackAction>) -> Subscription {
        let weak: Weak<ItemInner> = Arc::downgrade(&self.inner);
        actions.subscribe(move |action| {
            if let Some(inner) = weak.upgrade() {
                AudioItem { inner }.handle(*action);
            }
        })
    }
}

impl PartialEq for AudioItem {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for AudioItem {}

impl std::hash::Hash for AudioItem {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl std::fmt::Debug for AudioItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioItem")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn collect_states(item: &AudioItem) -> (Arc<Mutex<Vec<ItemState>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = item.subscribe_state(move |state| sink.lock().push(state));
        (seen, subscription)
    }

    #[test]
    fn test_new_item_is_initial_with_unique_id() {
        let a = AudioItem::new();
        let b = AudioItem::new();
        assert_eq!(a.state(), ItemState::Initial);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_subscribe_replays_current_state_then_transitions() {
        let item = AudioItem::new();
        let (seen, _subscription) = collect_states(&item);

        item.handle(PlaybackAction::Play);
        item.handle(PlaybackAction::Pause);
        item.handle(PlaybackAction::Pause);
        item.handle(PlaybackAction::Stop);

        assert_eq!(
            *seen.lock(),
            vec![
                ItemState::Initial,
                ItemState::Running,
                ItemState::Paused,
                ItemState::Paused,
                ItemState::Stopped,
            ]
        );
    }

    #[test]
    fn test_stopped_item_emits_nothing() {
        let item = AudioItem::new();
        item.handle(PlaybackAction::Stop);
        let (seen, _subscription) = collect_states(&item);

        item.handle(PlaybackAction::Play);

        assert_eq!(item.state(), ItemState::Stopped);
        assert_eq!(*seen.lock(), vec![ItemState::Stopped]);
    }

    #[test]
    fn test_attach_relays_actions_until_canceled() {
        let item = AudioItem::new();
        let actions = Bus::new();
        let relay = item.attach(&actions);

        actions.send(PlaybackAction::Play);
        assert_eq!(item.state(), ItemState::Running);

        relay.cancel();
        actions.send(PlaybackAction::Pause);
        assert_eq!(item.state(), ItemState::Running);
    }

    #[tokio::test]
    async fn test_watch_state_sees_latest() {
        let item = AudioItem::new();
        let mut rx = item.watch_state();

        item.handle(PlaybackAction::Play);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ItemState::Running);
    }
}
