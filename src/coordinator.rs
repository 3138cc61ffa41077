//! Single-active-item audio coordinator
//!
//! [`AudioBox`] owns at most one current [`AudioItem`]. External events and
//! translated session interruptions are merged into one pipeline, so the
//! current item, the engine registry and the relay table are only ever
//! touched by one delivery at a time.
//!
//! Promoting a new item always retires the previous one first: it receives a
//! `stop`, its relays are canceled and its engine leaves the registry. Only
//! then is the new item wired up and started.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use uuid::Uuid;

use crate::audio::{self, DeviceEngineFactory, EngineFactory, SharedEngine};
use crate::bus::{Bus, Subscription};
use crate::item::AudioItem;
use crate::models::{Event, ItemConfiguration, PlaybackAction};
use crate::session::{AudioSession, Category, CategoryOptions};

/// Active relays of the current item
struct ItemRelays {
    /// coordinator actions -> item state
    actions: Subscription,
    /// item state -> engine; absent when the item has no engine
    engine: Option<Subscription>,
}

struct Inner {
    session: AudioSession,
    factory: Box<dyn EngineFactory>,
    engines: Mutex<HashMap<Uuid, SharedEngine>>,
    relays: Mutex<HashMap<Uuid, ItemRelays>>,
    current: watch::Sender<Option<AudioItem>>,
    actions: Bus<PlaybackAction>,
    pipeline: Bus<Event>,
    _handler: Subscription,
}

/// Coordinates playback and recording of one audio item at a time
#[derive(Clone)]
pub struct AudioBox {
    inner: Arc<Inner>,
}

impl AudioBox {
    /// Coordinator with device-backed engines
    pub fn new(session: AudioSession) -> Self {
        Self::with_factory(session, DeviceEngineFactory::default())
    }

    /// Coordinator building engines with `factory`
    pub fn with_factory(session: AudioSession, factory: impl EngineFactory + 'static) -> Self {
        session.set_category(
            Category::PlayAndRecord,
            CategoryOptions {
                default_to_speaker: true,
            },
        );
        let (current, _) = watch::channel(None);

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let pipeline = Bus::new();
            let weak = weak.clone();
            let handler = pipeline.subscribe(move |event: &Event| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle(event);
                }
            });

            Inner {
                session,
                factory: Box::new(factory),
                engines: Mutex::new(HashMap::new()),
                relays: Mutex::new(HashMap::new()),
                current,
                actions: Bus::new(),
                pipeline,
                _handler: handler,
            }
        });

        Self { inner }
    }

    /// Allocate a new item and register its engine
    ///
    /// The item is not made current. If the engine cannot be built the item
    /// is still returned; its state changes then have no engine side effect.
    pub fn create(&self, configuration: &ItemConfiguration) -> AudioItem {
        let item = AudioItem::new();
        match self.inner.factory.build(configuration) {
            Ok(engine) => {
                debug!("Registered engine for item {}", item.id());
                self.inner.engines.lock().insert(item.id(), engine);
            }
            Err(e) => warn!("No engine for item {}: {}", item.id(), e),
        }
        item
    }

    /// Start consuming `events`, merged with translated session interruptions
    ///
    /// Both feeds stop when the returned subscription is canceled or dropped.
    pub fn attach(&self, events: &Bus<Event>) -> Subscription {
        let pipeline = self.inner.pipeline.clone();
        let forward = events.subscribe(move |event| pipeline.send(event.clone()));

        let pipeline = self.inner.pipeline.clone();
        let interruptions = self
            .inner
            .session
            .subscribe_interruptions(move |interruption| match interruption.into_event() {
                Some(event) => pipeline.send(event),
                None => debug!("Interruption {:?} maps to no event", interruption),
            });

        Subscription::group(vec![forward, interruptions])
    }

    pub fn current_item(&self) -> Option<AudioItem> {
        self.inner.current.borrow().clone()
    }

    /// Receiver that always holds the latest current item
    pub fn watch_current_item(&self) -> watch::Receiver<Option<AudioItem>> {
        self.inner.current.subscribe()
    }

    pub fn session(&self) -> &AudioSession {
        &self.inner.session
    }

    pub fn has_engine(&self, item: &AudioItem) -> bool {
        self.inner.engines.lock().contains_key(&item.id())
    }

    pub fn engine_count(&self) -> usize {
        self.inner.engines.lock().len()
    }
}

impl Inner {
    fn handle(&self, event: &Event) {
        match event {
            Event::Activate(item) => self.promote(Some(item.clone())),
            Event::Action(action) => {
                if self.current.borrow().is_none() {
                    debug!("No current item, dropping {:?}", action);
                    return;
                }
                self.actions.send(*action);
            }
            Event::DeactivateSession => {
                // Retiring the current item still sends it `stop`
                self.promote(None);
                let engines = std::mem::take(&mut *self.engines.lock());
                info!("Session deactivated, released {} engine(s)", engines.len());
                drop(engines);
            }
        }
    }

    fn promote(&self, next: Option<AudioItem>) {
        let previous = self.current.borrow().clone();

        if let (Some(previous), Some(next)) = (&previous, &next) {
            if previous == next {
                debug!("Item {} is already current", next.id());
                return;
            }
        }

        if let Some(previous) = previous {
            self.retire(&previous);
        }

        self.current.send_replace(next.clone());

        if let Some(item) = next {
            self.setup(&item);
        }
    }

    fn retire(&self, item: &AudioItem) {
        self.actions.send(PlaybackAction::Stop);

        // Cancel relays and release the engine outside the locks
        let relays = self.relays.lock().remove(&item.id());
        drop(relays);
        let engine = self.engines.lock().remove(&item.id());
        drop(engine);

        info!("Retired item {}", item.id());
    }

    fn setup(&self, item: &AudioItem) {
        let actions = item.attach(&self.actions);

        let engine = self.engines.lock().get(&item.id()).cloned();
        let engine = engine.map(|engine| {
            item.subscribe_state(move |state| audio::drive(&mut *engine.lock(), state))
        });
        if engine.is_none() {
            debug!("Item {} has no engine", item.id());
        }

        self.relays
            .lock()
            .insert(item.id(), ItemRelays { actions, engine });

        info!("Activated item {}", item.id());
        self.actions.send(PlaybackAction::Play);
    }
}
