//! Capability hub: the per-sensor last-value store.
//!
//! The hub owns the capability set and the most recent sample per
//! capability. State lives in an immutable [`Snapshot`] behind an
//! [`ArcSwap`]: readers load the current `Arc` without locking, writers build
//! the next snapshot and swap it in. Writers are serialized by a mutex; in
//! practice the only writers are the sensor's receive loop and capability
//! pre-declaration from [`Sensor::register`](crate::Sensor::register).
//!
//! Change detection:
//! - first sighting of a capability stores the sample, never notifies
//! - an identical value refreshes `last_update`, never notifies
//! - a different value replaces the sample and is reported as changed

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::snapshot::Snapshot;
use crate::value::{Sample, Value};
use arc_swap::ArcSwap;
use chrono::Utc;
use log::trace;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub struct CapabilityHub {
    state: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl Default for CapabilityHub {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityHub {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(Snapshot::default()),
            writer: Mutex::new(()),
        }
    }

    /// Decode `frame` and apply it. Returns the capabilities whose value
    /// changed, in frame order.
    ///
    /// Frames that fail to decode are dropped without touching the store.
    pub fn update(&self, frame: &Frame) -> Vec<Capability> {
        match frame.decode() {
            Ok(pairs) => self.apply(pairs),
            Err(err) => {
                trace!("dropping frame: {err}");
                Vec::new()
            }
        }
    }

    /// Apply already decoded pairs. See [`CapabilityHub::update`].
    pub fn apply(&self, pairs: impl IntoIterator<Item = (Capability, Value)>) -> Vec<Capability> {
        let _guard = self.writer.lock();
        let mut next = Snapshot::clone(&self.state.load());
        let now = Utc::now();
        let mut changed = Vec::new();

        for (capability, value) in pairs {
            let incoming = Sample::new(value, now);
            let slot = next.entries.entry(capability).or_insert(None);
            match slot.as_mut() {
                Some(current) if *current == incoming => current.last_update = now,
                Some(current) => {
                    *current = incoming;
                    changed.push(capability);
                }
                None => *slot = Some(incoming),
            }
        }

        next.last_frame = Some(now);
        self.state.store(Arc::new(next));
        changed
    }

    /// Add capabilities to the set without giving them a value.
    pub fn declare(&self, capabilities: impl IntoIterator<Item = Capability>) {
        let _guard = self.writer.lock();
        let current = self.state.load();
        let missing: Vec<Capability> = capabilities
            .into_iter()
            .filter(|cap| !current.contains(*cap))
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut next = Snapshot::clone(&current);
        for cap in missing {
            next.entries.insert(cap, None);
        }
        self.state.store(Arc::new(next));
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.load_full()
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.state.load().contains(capability)
    }

    /// `true` if every capability in `capabilities` is present.
    pub fn has_capabilities(&self, capabilities: &[Capability]) -> bool {
        let snap = self.state.load();
        capabilities.iter().all(|cap| snap.contains(*cap))
    }

    /// Latest sample for `capability`.
    ///
    /// `Err(NotACapability)` if the capability is not in the set, `Ok(None)`
    /// if it was declared but nothing has arrived yet.
    pub fn get_value(&self, capability: Capability) -> Result<Option<Sample>> {
        let snap = self.state.load();
        if !snap.contains(capability) {
            return Err(Error::NotACapability(capability));
        }
        Ok(snap.get(capability).copied())
    }

    /// Batch form of [`CapabilityHub::get_value`], read from one snapshot.
    pub fn get_values(
        &self,
        capabilities: &[Capability],
    ) -> Result<BTreeMap<Capability, Option<Sample>>> {
        let snap = self.state.load();
        capabilities
            .iter()
            .map(|cap| {
                if snap.contains(*cap) {
                    Ok((*cap, snap.get(*cap).copied()))
                } else {
                    Err(Error::NotACapability(*cap))
                }
            })
            .collect()
    }

    pub fn capabilities(&self) -> BTreeSet<Capability> {
        self.state.load().capabilities()
    }
}
