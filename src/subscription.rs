//! Callback registry and change dispatch.
//!
//! Subscribers register a [`Mapping`]: a unique key, the set of capabilities
//! they care about, and a [`Listener`]. When the hub reports a changed
//! capability, [`Subscriptions::dispatch`] walks the mappings in registration
//! order and notifies every one whose interest set contains it.
//!
//! ## Delivery
//! - [`Delivery::Inline`] runs the listener on the sensor's receive thread.
//!   A slow listener throttles ingestion for that sensor, and a panicking
//!   one takes the receive loop down with it.
//! - [`Delivery::Queued`] hands notifications to a per-subscriber worker
//!   thread over a bounded channel. When the queue is full the notification
//!   is dropped and a warning logged.
//!
//! The registry lock is released before any listener runs, so listeners may
//! register, unregister or query the sensor from inside a callback.

use crate::capability::Capability;
use crate::snapshot::Snapshot;
use crate::value::Sample;
use crossbeam::channel::{bounded, Sender, TrySendError};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread;

/// Payload handed to a listener.
#[derive(Debug, Clone)]
pub struct Notification {
    /// The capability whose value changed.
    pub changed: Capability,
    /// Current samples for the subscriber's interest set (capabilities
    /// without a value yet are omitted).
    pub values: BTreeMap<Capability, Sample>,
}

impl Notification {
    /// The new sample of the changed capability.
    pub fn sample(&self) -> Option<&Sample> {
        self.values.get(&self.changed)
    }

    pub fn get(&self, capability: Capability) -> Option<&Sample> {
        self.values.get(&capability)
    }
}

/// Trait for reacting to capability changes.
pub trait Listener: Send + Sync {
    fn on_change(&self, notification: &Notification);
}

impl<F> Listener for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn on_change(&self, notification: &Notification) {
        self(notification)
    }
}

/// How notifications reach a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    #[default]
    Inline,
    Queued {
        capacity: usize,
    },
}

/// A subscriber registration.
pub struct Mapping {
    key: String,
    capabilities: BTreeSet<Capability>,
    listener: Arc<dyn Listener>,
    delivery: Delivery,
}

impl Mapping {
    pub fn new(
        key: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
        listener: impl Listener + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            capabilities: capabilities.into_iter().collect(),
            listener: Arc::new(listener),
            delivery: Delivery::Inline,
        }
    }

    /// Deliver through a bounded queue of `capacity` notifications (at
    /// least one).
    pub fn queued(mut self, capacity: usize) -> Self {
        self.delivery = Delivery::Queued {
            capacity: capacity.max(1),
        };
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }
}

#[derive(Clone)]
enum Sink {
    Inline(Arc<dyn Listener>),
    Queued(Sender<Notification>),
}

struct Entry {
    key: String,
    capabilities: BTreeSet<Capability>,
    sink: Sink,
}

/// Registered mappings, in registration order.
#[derive(Default)]
pub struct Subscriptions {
    entries: Mutex<Vec<Entry>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `mapping`. Returns `false` without side effects if its key is
    /// already registered.
    pub fn register(&self, mapping: Mapping) -> bool {
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.key == mapping.key) {
            return false;
        }

        let sink = match mapping.delivery {
            Delivery::Inline => Sink::Inline(mapping.listener),
            Delivery::Queued { capacity } => {
                match spawn_worker(&mapping.key, capacity, mapping.listener) {
                    Ok(tx) => Sink::Queued(tx),
                    Err(err) => {
                        warn!("subscriber `{}`: no worker thread ({err})", mapping.key);
                        return false;
                    }
                }
            }
        };

        debug!(
            "registered `{}` for {:?}",
            mapping.key, mapping.capabilities
        );
        entries.push(Entry {
            key: mapping.key,
            capabilities: mapping.capabilities,
            sink,
        });
        true
    }

    /// Remove the mapping registered under `key`. Returns `false` if absent.
    ///
    /// A queued subscriber's worker drains what is already queued and exits.
    pub fn unregister(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|e| e.key == key) {
            Some(index) => {
                entries.remove(index);
                debug!("unregistered `{key}`");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().iter().any(|e| e.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Notify every subscriber interested in `changed`.
    pub fn dispatch(&self, changed: Capability, snapshot: &Snapshot) {
        let targets: Vec<(String, BTreeSet<Capability>, Sink)> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.capabilities.contains(&changed))
            .map(|e| (e.key.clone(), e.capabilities.clone(), e.sink.clone()))
            .collect();

        for (key, interest, sink) in targets {
            let notification = Notification {
                changed,
                values: snapshot.restrict(&interest),
            };
            match sink {
                Sink::Inline(listener) => listener.on_change(&notification),
                Sink::Queued(tx) => match tx.try_send(notification) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("subscriber `{key}` queue full; dropping {changed} notification")
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        debug!("subscriber `{key}` worker gone")
                    }
                },
            }
        }
    }
}

fn spawn_worker(
    key: &str,
    capacity: usize,
    listener: Arc<dyn Listener>,
) -> std::io::Result<Sender<Notification>> {
    let (tx, rx) = bounded::<Notification>(capacity);
    thread::Builder::new()
        .name(format!("dippid-sub-{key}"))
        .spawn(move || {
            for notification in rx {
                listener.on_change(&notification);
            }
        })?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::CapabilityHub;
    use crate::frame::Frame;
    use crossbeam::channel::unbounded;
    use parking_lot::Mutex as PlMutex;
    use std::time::Duration;

    fn recorder() -> (Arc<PlMutex<Vec<Capability>>>, impl Listener + 'static) {
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |n: &Notification| sink.lock().push(n.changed))
    }

    fn snapshot_with(frame: &str) -> Arc<Snapshot> {
        let hub = CapabilityHub::new();
        hub.update(&Frame::from(frame));
        hub.snapshot()
    }

    #[test]
    fn duplicate_keys_are_refused() {
        let subs = Subscriptions::new();
        let (_, a) = recorder();
        let (_, b) = recorder();
        assert!(subs.register(Mapping::new("ui", [Capability::Button1], a)));
        assert!(!subs.register(Mapping::new("ui", [Capability::Button2], b)));
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn unregister_reports_presence() {
        let subs = Subscriptions::new();
        let (seen, listener) = recorder();
        subs.register(Mapping::new("ui", [Capability::Button1], listener));

        assert!(!subs.unregister("other"));
        assert_eq!(subs.len(), 1);
        assert!(subs.unregister("ui"));
        assert!(!subs.contains("ui"));

        subs.dispatch(Capability::Button1, &snapshot_with(r#"{"button_1":1}"#));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn dispatch_filters_by_interest() {
        let subs = Subscriptions::new();
        let (buttons, on_button) = recorder();
        let (rotations, on_rotation) = recorder();
        subs.register(Mapping::new("buttons", [Capability::Button1], on_button));
        subs.register(Mapping::new("rotation", [Capability::Rotation], on_rotation));

        let snap = snapshot_with(r#"{"rotation":{"pitch":1,"roll":2,"yaw":3}}"#);
        subs.dispatch(Capability::Rotation, &snap);

        assert!(buttons.lock().is_empty());
        assert_eq!(*rotations.lock(), vec![Capability::Rotation]);
    }

    #[test]
    fn notification_carries_interest_set_values() {
        let subs = Subscriptions::new();
        let (tx, rx) = unbounded();
        subs.register(Mapping::new(
            "pair",
            [Capability::Button1, Capability::Button2, Capability::Gravity],
            move |n: &Notification| tx.send(n.clone()).unwrap(),
        ));

        let snap = snapshot_with(r#"{"button_1":1,"button_2":0,"temperature":30}"#);
        subs.dispatch(Capability::Button1, &snap);

        let n = rx.try_recv().unwrap();
        assert_eq!(n.changed, Capability::Button1);
        assert_eq!(
            n.values.keys().copied().collect::<Vec<_>>(),
            vec![Capability::Button1, Capability::Button2]
        );
        assert!(n.sample().unwrap().value.as_button().unwrap().is_pressed());
    }

    #[test]
    fn dispatch_follows_registration_order() {
        let subs = Subscriptions::new();
        let order = Arc::new(PlMutex::new(Vec::new()));
        for key in ["c", "a", "b"] {
            let order = Arc::clone(&order);
            subs.register(Mapping::new(key, [Capability::Button1], move |_: &Notification| {
                order.lock().push(key)
            }));
        }
        subs.dispatch(Capability::Button1, &snapshot_with(r#"{"button_1":1}"#));
        assert_eq!(*order.lock(), vec!["c", "a", "b"]);
    }

    #[test]
    fn listeners_may_unregister_themselves() {
        let subs = Arc::new(Subscriptions::new());
        let inner = Arc::clone(&subs);
        subs.register(Mapping::new("once", [Capability::Button1], move |_: &Notification| {
            inner.unregister("once");
        }));
        subs.dispatch(Capability::Button1, &snapshot_with(r#"{"button_1":1}"#));
        assert!(subs.is_empty());
    }

    #[test]
    fn queued_delivery_runs_off_thread() {
        let subs = Subscriptions::new();
        let (tx, rx) = unbounded();
        let mapping = Mapping::new("queued", [Capability::Button2], move |n: &Notification| {
            tx.send((n.changed, thread::current().id())).unwrap()
        })
        .queued(4);
        assert_eq!(mapping.delivery(), Delivery::Queued { capacity: 4 });
        subs.register(mapping);

        subs.dispatch(Capability::Button2, &snapshot_with(r#"{"button_2":1}"#));
        let (cap, worker) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(cap, Capability::Button2);
        assert_ne!(worker, thread::current().id());
    }

    #[test]
    fn zero_capacity_queue_still_buffers_one() {
        let (started_tx, started) = unbounded();
        let (gate, gate_rx) = unbounded::<()>();
        let (done_tx, done) = unbounded();
        let mapping = Mapping::new("slow", [Capability::Button3], move |n: &Notification| {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
            done_tx.send(n.changed).unwrap();
        })
        .queued(0);
        assert_eq!(mapping.delivery(), Delivery::Queued { capacity: 1 });

        let subs = Subscriptions::new();
        subs.register(mapping);
        let snap = snapshot_with(r#"{"button_3":1}"#);

        subs.dispatch(Capability::Button3, &snap);
        started.recv_timeout(Duration::from_secs(2)).unwrap();
        subs.dispatch(Capability::Button3, &snap);

        gate.send(()).unwrap();
        gate.send(()).unwrap();
        assert_eq!(done.recv_timeout(Duration::from_secs(2)).unwrap(), Capability::Button3);
        assert_eq!(done.recv_timeout(Duration::from_secs(2)).unwrap(), Capability::Button3);
    }
}
