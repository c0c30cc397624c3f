//! Typed observer registry.
//!
//! An [`EventBus`] delivers one event type to every subscriber, in
//! subscription order, on the publishing thread. A subscriber that returns
//! an error or panics is logged and skipped; the remaining subscribers
//! still receive the event and the publisher is never interrupted.

use crate::coordinate::Coordinate;
use crate::error::ObserverError;
use crate::scene::{BaseLayer, Region, ViewState};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

type Callback<E> = Arc<dyn Fn(&E) -> Result<(), ObserverError> + Send + Sync>;

/// Outcome of one [`EventBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers that handled the event
    pub delivered: usize,

    /// Subscribers that failed or panicked
    pub failed: usize,
}

/// Observer registry for events of type `E`.
pub struct EventBus<E> {
    /// Label used in fault logs
    name: &'static str,

    subscribers: RwLock<Vec<(SubscriptionId, Callback<E>)>>,

    next_id: AtomicU64,

    /// Total failed deliveries since creation
    faults: AtomicU64,
}

impl<E> EventBus<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }

    /// Registers a callback and returns its handle.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes a subscriber. Returns false if the handle was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    /// Delivers `event` to every subscriber in registration order.
    ///
    /// The subscriber list is snapshotted first, so callbacks may
    /// subscribe or unsubscribe without deadlocking; such changes take
    /// effect from the next event.
    pub fn publish(&self, event: &E) -> Delivery {
        let snapshot: Vec<(SubscriptionId, Callback<E>)> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        let mut delivery = Delivery::default();
        for (id, callback) in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(event)))
                .unwrap_or_else(|payload| Err(ObserverError::Panicked(panic_message(payload))));

            match outcome {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    delivery.failed += 1;
                    self.faults.fetch_add(1, Ordering::Relaxed);
                    warn!(bus = self.name, subscriber = %id, error = %e, "observer failed");
                }
            }
        }
        delivery
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Total failed deliveries since creation.
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Events published by a `MapScene`.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// A track point (and its connecting segment, if any) was rendered
    SegmentAdded {
        from: Option<Coordinate>,
        to: Coordinate,
    },

    /// A box region finished drawing
    RegionDrawn(Region),

    /// Drawn regions were removed
    RegionsCleared { count: usize },

    /// The click marker moved
    MarkerPlaced(Coordinate),

    /// Center or zoom changed
    ViewChanged(ViewState),

    /// The visible base tile layer changed
    BaseLayerChanged(BaseLayer),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_publish_in_registration_order() {
        let bus: EventBus<u32> = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            bus.subscribe(move |v: &u32| {
                seen.lock().unwrap().push(format!("{}{}", tag, v));
                Ok(())
            });
        }

        let delivery = bus.publish(&1);
        assert_eq!(delivery, Delivery { delivered: 3, failed: 0 });
        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_failing_subscriber_is_isolated() {
        let bus: EventBus<u32> = EventBus::new("test");
        let hits = Arc::new(AtomicU64::new(0));

        bus.subscribe(|_| Err(ObserverError::render("tile server down")));
        bus.subscribe(|_| panic!("renderer exploded"));
        let counter = hits.clone();
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let delivery = bus.publish(&7);

        assert_eq!(delivery.failed, 2);
        assert_eq!(delivery.delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.fault_count(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus: EventBus<()> = EventBus::new("test");
        let id = bus.subscribe(|_| Ok(()));
        bus.subscribe(|_| Ok(()));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(&()).delivered, 1);
    }

    #[test]
    fn test_subscriber_can_unsubscribe_itself() {
        let bus: Arc<EventBus<()>> = Arc::new(EventBus::new("test"));
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let bus_ref = Arc::downgrade(&bus);
        let slot_ref = slot.clone();
        let id = bus.subscribe(move |_| {
            if let (Some(bus), Some(id)) = (bus_ref.upgrade(), *slot_ref.lock().unwrap()) {
                bus.unsubscribe(id);
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(id);

        assert_eq!(bus.publish(&()).delivered, 1);
        assert_eq!(bus.publish(&()).delivered, 0);
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(5u8)), "non-string panic payload");
    }
}
