//! In-process event queue with an explicit listener list
//!
//! Values sent on a [`Bus`] are queued and delivered to every listener in
//! arrival order. At most one delivery is in flight per bus: a send made while
//! the bus is draining (from inside a listener, or from another thread) is
//! queued and delivered by the caller that is already draining.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct BusInner<T> {
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    queue: Mutex<VecDeque<T>>,
    draining: AtomicBool,
    next_id: AtomicU64,
}

/// Push-based event bus with synchronous, ordered delivery
pub struct Bus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Bus<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a listener; it stays registered until the returned
    /// [`Subscription`] is canceled or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));

        let weak: Weak<BusInner<T>> = Arc::downgrade(&self.inner);
        Subscription::from_fn(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().retain(|(other, _)| *other != id);
            }
        })
    }

    /// Queue a value and deliver everything pending, unless another caller
    /// is already draining this bus.
    pub fn send(&self, value: T) {
        self.inner.queue.lock().push_back(value);
        self.drain();
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn drain(&self) {
        loop {
            if self.inner.draining.swap(true, Ordering::AcqRel) {
                return;
            }
            {
                let _guard = DrainGuard(&self.inner.draining);
                loop {
                    let next = self.inner.queue.lock().pop_front();
                    let Some(value) = next else { break };

                    // Snapshot so listeners may (un)subscribe while being called
                    let listeners: Vec<Listener<T>> = self
                        .inner
                        .listeners
                        .lock()
                        .iter()
                        .map(|(_, listener)| listener.clone())
                        .collect();
                    for listener in listeners {
                        listener(&value);
                    }
                }
            }
            // A sender may have queued between our last pop and the flag reset
            if self.inner.queue.lock().is_empty() {
                return;
            }
        }
    }
}

impl<T: Send + 'static> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Cancelable registration handle
///
/// Dropping the handle cancels it. Canceling stops further delivery but does
/// not undo anything a listener already did.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn from_fn(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Bundle several subscriptions so they are canceled together
    pub fn group(subscriptions: Vec<Subscription>) -> Self {
        Self::from_fn(move || drop(subscriptions))
    }

    pub fn cancel(mut self) {
        self.shutdown();
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn shutdown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&u32) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &str| -> Box<dyn Fn(&u32) + Send + Sync> {
            let sink = sink.clone();
            let name = name.to_string();
            Box::new(move |value: &u32| sink.lock().push(format!("{}:{}", name, value)))
        };
        (log, make)
    }

    #[test]
    fn test_delivers_in_order_to_every_listener() {
        let bus: Bus<u32> = Bus::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let _sa = bus.subscribe(move |v| a(v));
        let _sb = bus.subscribe(move |v| b(v));

        bus.send(1);
        bus.send(2);

        assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn test_reentrant_send_is_queued_behind_current_delivery() {
        let bus: Bus<u32> = Bus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let first = log.clone();
        let _s1 = bus.subscribe(move |v| {
            first.lock().push(format!("first:{}", v));
            if *v == 1 {
                inner_bus.send(2);
            }
        });
        let second = log.clone();
        let _s2 = bus.subscribe(move |v| second.lock().push(format!("second:{}", v)));

        bus.send(1);

        assert_eq!(
            *log.lock(),
            vec!["first:1", "second:1", "first:2", "second:2"]
        );
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let bus: Bus<u32> = Bus::new();
        let (log, make) = recorder();
        let a = make("a");
        let subscription = bus.subscribe(move |v| a(v));

        bus.send(1);
        subscription.cancel();
        bus.send(2);

        assert_eq!(*log.lock(), vec!["a:1"]);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_drop_cancels_and_group_cancels_all() {
        let bus: Bus<u32> = Bus::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        {
            let _dropped = bus.subscribe(move |v| a(v));
        }
        let group = Subscription::group(vec![bus.subscribe(move |v| b(v))]);
        assert_eq!(bus.listener_count(), 1);

        bus.send(7);
        drop(group);
        bus.send(8);

        assert_eq!(*log.lock(), vec!["b:7"]);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_concurrent_senders_deliver_everything_once() {
        let bus: Bus<u32> = Bus::new();
        let total = Arc::new(Mutex::new(Vec::new()));
        let sink = total.clone();
        let _s = bus.subscribe(move |v| sink.lock().push(*v));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let bus = bus.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        bus.send(t * 1000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = total.lock().clone();
        assert_eq!(seen.len(), 400);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 400);
    }
}
