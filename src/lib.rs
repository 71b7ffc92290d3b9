//! dippid: a sensor ingestion hub.
//!
//! Reads live state from phones, microcontroller boards and game controllers
//! over UDP, serial lines or polled HID, keeps the latest value per
//! capability, and notifies subscribers when a capability's value changes.

pub mod backends;
pub mod capability;
pub mod config;
pub mod error;
pub mod frame;
pub mod hub;
pub mod logger;
pub mod manager;
pub mod reconnect;
pub mod sensor;
pub mod snapshot;
pub mod subscription;
pub mod value;

pub use capability::*;
pub use config::{HubConfig, SensorConfig, TransportConfig};
pub use error::{Error, Result};
pub use frame::Frame;
pub use hub::CapabilityHub;
pub use logger::ChangeLogger;
pub use manager::SensorManager;
pub use reconnect::ReconnectPolicy;
pub use sensor::{Sensor, SensorId};
pub use snapshot::Snapshot;
pub use subscription::{Delivery, Listener, Mapping, Notification, Subscriptions};
pub use value::*;
