use super::polled::{Controller, ControllerState};
use crate::capability::Capability;
use crate::error::Result;
use crate::value::Vector3;
use parking_lot::Mutex;
use std::sync::Arc;

/// In-memory controller. Clones share state, so one clone can be handed to
/// a [`PolledTransport`](super::polled::PolledTransport) while another feeds it.
#[derive(Clone, Default)]
pub struct VirtualController {
    id: String,
    state: Arc<Mutex<ControllerState>>,
}

impl VirtualController {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: Arc::default(),
        }
    }

    pub fn set_accelerometer(&self, x: f64, y: f64, z: f64) {
        self.state.lock().accelerometer = Some(Vector3 { x, y, z });
    }

    pub fn set_button(&self, button: Capability, pressed: bool) {
        self.state.lock().buttons.insert(button, pressed);
    }

    pub fn press_button(&self, button: Capability) {
        self.set_button(button, true);
    }

    pub fn release_button(&self, button: Capability) {
        self.set_button(button, false);
    }
}

impl Controller for VirtualController {
    fn describe(&self) -> String {
        self.id.clone()
    }

    fn sample(&mut self) -> Result<ControllerState> {
        Ok(self.state.lock().clone())
    }
}
