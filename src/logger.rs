use crate::subscription::{Listener, Notification};
use log::info;

/// A listener that logs every change it receives at `info` level.
pub struct ChangeLogger {
    label: String,
}

impl ChangeLogger {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Listener for ChangeLogger {
    fn on_change(&self, notification: &Notification) {
        match notification.sample() {
            Some(sample) => info!("[{}] {} -> {}", self.label, notification.changed, sample.value),
            None => info!("[{}] {} changed", self.label, notification.changed),
        }
    }
}
