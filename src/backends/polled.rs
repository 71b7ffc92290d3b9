//! Polled controllers.
//!
//! Some devices are not pushed over a wire but read by polling their current
//! state. [`PolledTransport`] samples a [`Controller`] once per interval and
//! synthesizes a decoded frame from the accelerometer and button states. No
//! framing exists, so every frame is complete.

use super::Transport;
use crate::capability::Capability;
use crate::error::Result;
use crate::frame::Frame;
use crate::value::{Button, Value, Vector3};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Current state of a polled device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    pub accelerometer: Option<Vector3>,
    pub buttons: BTreeMap<Capability, bool>,
}

impl ControllerState {
    pub fn into_frame(self) -> Frame {
        let mut pairs = Vec::with_capacity(self.buttons.len() + 1);
        if let Some(accel) = self.accelerometer {
            pairs.push((Capability::Accelerometer, Value::Vector(accel)));
        }
        pairs.extend(
            self.buttons
                .into_iter()
                .map(|(cap, pressed)| (cap, Value::Button(Button::new(pressed)))),
        );
        Frame::Decoded(pairs)
    }
}

/// A device whose state is read on demand.
pub trait Controller: Send {
    fn describe(&self) -> String;
    fn sample(&mut self) -> Result<ControllerState>;
}

pub struct PolledTransport<C> {
    controller: C,
    interval: Duration,
    started: bool,
}

impl<C: Controller> PolledTransport<C> {
    pub fn new(controller: C, interval: Duration) -> Self {
        Self {
            controller,
            interval,
            started: false,
        }
    }
}

impl<C: Controller> Transport for PolledTransport<C> {
    fn describe(&self) -> String {
        self.controller.describe()
    }

    fn recv(&mut self) -> Result<Option<Frame>> {
        if self.started {
            thread::sleep(self.interval);
        }
        self.started = true;
        let state = self.controller.sample()?;
        Ok(Some(state.into_frame()))
    }
}
