//! Sensor instances.
//!
//! A [`Sensor`] ties one [`Transport`] to a [`CapabilityHub`] and a
//! [`Subscriptions`] registry, and runs the receive loop on a dedicated
//! thread:
//!
//! ```text
//! transport.recv() -> hub.update(frame) -> changed capabilities -> subscriptions.dispatch
//! ```
//!
//! Only the receive thread writes samples. Queries from other threads read
//! the hub's current snapshot and never block on the loop.
//!
//! The loop runs while `receiving` is set. [`Sensor::disconnect`] clears it,
//! wakes a transport blocked in a read, and joins the thread. Errors never
//! leave the loop: undecodable frames are skipped, transport failures go to
//! the transport's reconnect policy, and a transport that cannot recover ends
//! the loop (the capability set simply stops updating).
//!
//! ```no_run
//! use dippid::{Capability, Mapping, Notification, Sensor};
//!
//! let sensor = Sensor::udp("0.0.0.0:5700".parse()?)?;
//! sensor.register(Mapping::new("ui", [Capability::Button1], |n: &Notification| {
//!     println!("button_1 -> {}", n.sample().unwrap().value);
//! }));
//! # Ok::<(), dippid::Error>(())
//! ```

use crate::backends::polled::{Controller, PolledTransport};
use crate::backends::serial::{SerialPortOpener, SerialTransport};
use crate::backends::udp::UdpTransport;
use crate::backends::{Transport, Waker};
use crate::capability::Capability;
use crate::error::Result;
use crate::frame::Frame;
use crate::hub::CapabilityHub;
use crate::reconnect::ReconnectPolicy;
use crate::snapshot::Snapshot;
use crate::subscription::{Mapping, Subscriptions};
use crate::value::Sample;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique sensor identifier.
pub type SensorId = u64;

pub(crate) type DisconnectHook = Box<dyn FnOnce(SensorId) + Send>;

/// Handle to a live sensor. Clones share the same instance.
#[derive(Clone)]
pub struct Sensor {
    inner: Arc<SensorInner>,
}

struct SensorInner {
    id: SensorId,
    name: String,
    hub: CapabilityHub,
    subscriptions: Subscriptions,
    receiving: AtomicBool,
    disconnected: AtomicBool,
    waker: Option<Box<dyn Waker>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    on_disconnect: Mutex<Option<DisconnectHook>>,
}

impl Sensor {
    /// Start a receive loop for `transport`.
    pub fn spawn(name: impl Into<String>, transport: Box<dyn Transport>) -> Result<Self> {
        Self::spawn_with_hook(name.into(), transport, None)
    }

    pub(crate) fn spawn_with_hook(
        name: String,
        transport: Box<dyn Transport>,
        on_disconnect: Option<DisconnectHook>,
    ) -> Result<Self> {
        let inner = Arc::new(SensorInner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name,
            hub: CapabilityHub::new(),
            subscriptions: Subscriptions::new(),
            receiving: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            waker: transport.waker(),
            worker: Mutex::new(None),
            on_disconnect: Mutex::new(on_disconnect),
        });

        // Hold the slot while spawning so a disconnect from the loop itself
        // cannot miss the handle.
        let mut worker = inner.worker.lock();
        inner.receiving.store(true, Ordering::SeqCst);
        let loop_inner = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name(format!("dippid-{}", inner.name))
            .spawn(move || receive_loop(loop_inner, transport));
        match handle {
            Ok(handle) => *worker = Some(handle),
            Err(err) => {
                inner.receiving.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        }
        drop(worker);

        info!("[{}] connected", inner.name);
        Ok(Self { inner })
    }

    /// Listen for datagrams on `addr`.
    pub fn udp(addr: SocketAddr) -> Result<Self> {
        let transport = UdpTransport::bind(addr)?;
        Self::spawn(transport.describe(), Box::new(transport))
    }

    /// Read lines from the serial device at `path`.
    pub fn serial(path: &str, baud_rate: u32) -> Result<Self> {
        let opener = SerialPortOpener::new(path, baud_rate);
        let transport = SerialTransport::open(opener, ReconnectPolicy::default())?;
        Self::spawn(transport.describe(), Box::new(transport))
    }

    /// Poll `controller` every `interval`.
    pub fn polled<C: Controller + 'static>(controller: C, interval: Duration) -> Result<Self> {
        let name = controller.describe();
        Self::spawn(name, Box::new(PolledTransport::new(controller, interval)))
    }

    pub fn id(&self) -> SensorId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// `true` while the receive loop is running.
    pub fn is_receiving(&self) -> bool {
        self.inner.receiving.load(Ordering::SeqCst)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.inner.hub.has_capability(capability)
    }

    pub fn has_capabilities(&self, capabilities: &[Capability]) -> bool {
        self.inner.hub.has_capabilities(capabilities)
    }

    pub fn get_value(&self, capability: Capability) -> Result<Option<Sample>> {
        self.inner.hub.get_value(capability)
    }

    /// Like [`Sensor::get_value`], resolving `key` as a wire name first.
    pub fn get_value_by_name(&self, key: &str) -> Result<Option<Sample>> {
        self.get_value(key.parse()?)
    }

    pub fn get_values(
        &self,
        capabilities: &[Capability],
    ) -> Result<BTreeMap<Capability, Option<Sample>>> {
        self.inner.hub.get_values(capabilities)
    }

    pub fn get_capabilities(&self) -> BTreeSet<Capability> {
        self.inner.hub.capabilities()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.hub.snapshot()
    }

    /// Register a subscriber. Returns `false` if its key is taken.
    ///
    /// Capabilities named by the mapping join the capability set right away,
    /// without a value.
    pub fn register(&self, mapping: Mapping) -> bool {
        let capabilities = mapping.capabilities().clone();
        if !self.inner.subscriptions.register(mapping) {
            return false;
        }
        self.inner.hub.declare(capabilities);
        true
    }

    /// Remove a subscriber. Returns `false` if `key` was not registered.
    pub fn unregister(&self, key: &str) -> bool {
        self.inner.subscriptions.unregister(key)
    }

    #[cfg(test)]
    pub(crate) fn ingest(&self, frame: &Frame) {
        self.inner.ingest(frame);
    }

    /// Stop the receive loop and wait for it to exit.
    ///
    /// Idempotent. When called from the receive thread itself (e.g. inside a
    /// listener) it returns immediately and the loop exits once the current
    /// frame is done.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        if inner.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        inner.receiving.store(false, Ordering::SeqCst);

        if let Some(hook) = inner.on_disconnect.lock().take() {
            hook(inner.id);
        }
        if let Some(waker) = &inner.waker {
            waker.wake();
        }

        let Some(handle) = inner.worker.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            debug!("[{}] disconnect requested from receive loop", inner.name);
            return;
        }
        // A panicking loop has already logged and cleared `receiving`.
        let _ = handle.join();
        info!("[{}] disconnected", inner.name);
    }
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("receiving", &self.is_receiving())
            .finish()
    }
}

impl SensorInner {
    fn receiving(&self) -> bool {
        self.receiving.load(Ordering::SeqCst)
    }

    fn ingest(&self, frame: &Frame) {
        let changed = self.hub.update(frame);
        if changed.is_empty() {
            return;
        }
        let snapshot = self.hub.snapshot();
        for capability in changed {
            self.subscriptions.dispatch(capability, &snapshot);
        }
    }
}

/// Clears `receiving` when the receive loop exits, including by unwinding
/// out of a panicking listener.
struct LoopExit<'a>(&'a SensorInner);

impl Drop for LoopExit<'_> {
    fn drop(&mut self) {
        self.0.receiving.store(false, Ordering::SeqCst);
        if thread::panicking() {
            error!("[{}] receive loop panicked", self.0.name);
        } else {
            debug!("[{}] receive loop stopped", self.0.name);
        }
    }
}

fn receive_loop(inner: Arc<SensorInner>, mut transport: Box<dyn Transport>) {
    let _exit = LoopExit(&inner);
    debug!("[{}] receive loop started on {}", inner.name, transport.describe());

    while inner.receiving() {
        match transport.recv() {
            Ok(Some(frame)) => inner.ingest(&frame),
            Ok(None) => {}
            Err(err) => {
                if !inner.receiving() {
                    break;
                }
                warn!("[{}] {}: {err}", inner.name, transport.describe());
                let Some(policy) = transport.reconnect_policy().cloned() else {
                    error!("[{}] transport failed, receive loop stopping", inner.name);
                    break;
                };
                if !policy.reconnect(transport.as_mut(), || inner.receiving()) {
                    if inner.receiving() {
                        error!("[{}] giving up on {}", inner.name, transport.describe());
                    }
                    break;
                }
            }
        }
    }
}
