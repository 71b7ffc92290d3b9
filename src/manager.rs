//! Lifecycle owner for live sensors.
//!
//! [`SensorManager`] keeps every sensor it created until that sensor is
//! disconnected, and can shut them all down at once, either explicitly via
//! [`SensorManager::shutdown`] or on Ctrl-C via
//! [`SensorManager::install_interrupt_handler`].
//!
//! ```no_run
//! use dippid::{HubConfig, SensorManager};
//!
//! let config = HubConfig::load("sensors.toml")?;
//! let manager = SensorManager::new();
//! for sensor in &config.sensors {
//!     manager.connect(sensor)?;
//! }
//! manager.install_interrupt_handler()?;
//! # Ok::<(), dippid::Error>(())
//! ```

use crate::backends::{self, Transport};
use crate::config::SensorConfig;
use crate::error::Result;
use crate::sensor::{DisconnectHook, Sensor, SensorId};
use log::info;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

#[derive(Clone, Default)]
pub struct SensorManager {
    inner: Arc<ManagerInner>,
}

#[derive(Default)]
struct ManagerInner {
    sensors: Mutex<Vec<Sensor>>,
}

impl SensorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the configured transport and start a tracked sensor.
    pub fn connect(&self, config: &SensorConfig) -> Result<Sensor> {
        let transport = backends::open(&config.transport)?;
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| transport.describe());
        self.attach(name, transport)
    }

    /// Start a tracked sensor on an already opened transport.
    pub fn attach(&self, name: impl Into<String>, transport: Box<dyn Transport>) -> Result<Sensor> {
        let registry: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        let hook: DisconnectHook = Box::new(move |id: SensorId| {
            if let Some(inner) = registry.upgrade() {
                inner.sensors.lock().retain(|s| s.id() != id);
            }
        });

        // Registering under the lock keeps a concurrent shutdown from missing
        // the new sensor.
        let mut sensors = self.inner.sensors.lock();
        let sensor = Sensor::spawn_with_hook(name.into(), transport, Some(hook))?;
        sensors.push(sensor.clone());
        Ok(sensor)
    }

    /// Live sensors, in connection order.
    pub fn sensors(&self) -> Vec<Sensor> {
        self.inner.sensors.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.sensors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sensors.lock().is_empty()
    }

    /// Disconnect every live sensor.
    pub fn shutdown(&self) {
        let sensors = std::mem::take(&mut *self.inner.sensors.lock());
        if sensors.is_empty() {
            return;
        }
        info!("shutting down {} sensor(s)", sensors.len());
        for sensor in sensors {
            sensor.disconnect();
        }
    }

    /// On Ctrl-C, shut down every sensor and exit the process.
    ///
    /// Only one handler can be installed per process.
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let manager = self.clone();
        ctrlc::set_handler(move || {
            info!("interrupt received");
            manager.shutdown();
            std::process::exit(0);
        })?;
        Ok(())
    }
}
