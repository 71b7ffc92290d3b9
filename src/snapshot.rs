//! Point-in-time view of one sensor's capabilities.
//!
//! [`Snapshot`] is an **owned**, read-only copy of a sensor's capability set
//! and the most recent [`Sample`] for each capability. The hub publishes a
//! fresh snapshot after every accepted frame; readers hold on to whichever
//! one they loaded and never observe a half-applied frame.
//!
//! # Semantics
//! - A capability is present once it has been seen in a frame or declared by
//!   a subscriber. Declared-but-unseen capabilities map to `None`.
//! - A snapshot is **immutable**. To refresh, load a new one from the sensor.
//!
//! # Examples
//! ```no_run
//! use dippid::{Capability, Sensor};
//!
//! fn print_accel(sensor: &Sensor) {
//!     let snap = sensor.snapshot();
//!     if let Some(sample) = snap.get(Capability::Accelerometer) {
//!         println!("accelerometer: {} at {}", sample.value, sample.last_update);
//!     }
//! }
//! ```

use crate::capability::Capability;
use crate::value::Sample;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub(crate) entries: BTreeMap<Capability, Option<Sample>>,
    pub(crate) last_frame: Option<DateTime<Utc>>,
}

impl Snapshot {
    #[inline]
    pub fn contains(&self, capability: Capability) -> bool {
        self.entries.contains_key(&capability)
    }

    /// Latest sample for `capability`, if one has been received.
    #[inline]
    pub fn get(&self, capability: Capability) -> Option<&Sample> {
        self.entries.get(&capability).and_then(Option::as_ref)
    }

    pub fn capabilities(&self) -> BTreeSet<Capability> {
        self.entries.keys().copied().collect()
    }

    /// Iterate capabilities that hold a value.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, &Sample)> {
        self.entries
            .iter()
            .filter_map(|(cap, sample)| sample.as_ref().map(|s| (*cap, s)))
    }

    /// Samples for the capabilities in `interest` that hold a value.
    pub fn restrict(&self, interest: &BTreeSet<Capability>) -> BTreeMap<Capability, Sample> {
        interest
            .iter()
            .filter_map(|cap| self.get(*cap).map(|s| (*cap, *s)))
            .collect()
    }

    /// When the last frame was accepted, if ever.
    pub fn last_frame(&self) -> Option<DateTime<Utc>> {
        self.last_frame
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
