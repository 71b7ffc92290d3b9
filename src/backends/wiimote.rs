//! Nintendo Wiimote over `hidapi`.
//!
//! The remote is switched to continuous reporting mode `0x31` (core buttons
//! plus accelerometer). Each [`Controller::sample`] drains the reports queued
//! since the last poll and returns the most recent state; when nothing new
//! arrived the previous state is returned unchanged.
//!
//! Button mapping: A → `button_1`, B → `button_2`, One → `button_3`,
//! Two → `button_4`. Accelerometer axes are `(raw - 0x80) / 0x19`, roughly
//! in g; no per-device calibration is applied.

use super::polled::{Controller, ControllerState};
use crate::capability::Capability;
use crate::error::Result;
use crate::value::Vector3;
use hidapi::{HidApi, HidDevice};
use log::info;

pub const VENDOR_ID: u16 = 0x057e;
pub const PRODUCT_ID: u16 = 0x0306;

const REPORT_CORE_ACCEL: u8 = 0x31;
const SET_REPORTING_MODE: [u8; 3] = [0x12, 0x00, REPORT_CORE_ACCEL];

/// Safety valve on reports drained per poll.
const MAX_REPORTS_PER_TICK: usize = 32;

const ACCEL_ZERO: f64 = 128.0;
const ACCEL_ONE_G: f64 = 25.0;

// (byte offset in the report, mask, capability)
const BUTTONS: [(usize, u8, Capability); 4] = [
    (2, 0x08, Capability::Button1), // A
    (2, 0x04, Capability::Button2), // B
    (2, 0x02, Capability::Button3), // One
    (2, 0x01, Capability::Button4), // Two
];

pub struct Wiimote {
    name: String,
    raw: HidDevice,
    buf: [u8; 32],
    last: ControllerState,
}

impl Wiimote {
    /// Open the first Wiimote, or the one whose HID serial (its Bluetooth
    /// address on most platforms) matches `address`.
    pub fn open(api: &HidApi, address: Option<&str>) -> Result<Self> {
        let raw = match address {
            Some(serial) => api.open_serial(VENDOR_ID, PRODUCT_ID, serial)?,
            None => api.open(VENDOR_ID, PRODUCT_ID)?,
        };
        raw.write(&SET_REPORTING_MODE)?;

        let name = address
            .map(|a| format!("wiimote://{a}"))
            .unwrap_or_else(|| "wiimote://first".to_string());
        info!("opened {name}");
        Ok(Self {
            name,
            raw,
            buf: [0u8; 32],
            last: ControllerState::default(),
        })
    }
}

impl Controller for Wiimote {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn sample(&mut self) -> Result<ControllerState> {
        for _ in 0..MAX_REPORTS_PER_TICK {
            let len = self.raw.read_timeout(&mut self.buf, 0)?;
            if len == 0 {
                break;
            }
            if let Some(state) = decode_report(&self.buf[..len]) {
                self.last = state;
            }
        }
        Ok(self.last.clone())
    }
}

/// Decode a `0x31` report: `[id, buttons_hi, buttons_lo, ax, ay, az]`.
pub fn decode_report(report: &[u8]) -> Option<ControllerState> {
    if report.len() < 6 || report[0] != REPORT_CORE_ACCEL {
        return None;
    }

    let axis = |raw: u8| (f64::from(raw) - ACCEL_ZERO) / ACCEL_ONE_G;
    let buttons = BUTTONS
        .iter()
        .map(|(byte, mask, cap)| (*cap, report[*byte] & mask != 0))
        .collect();

    Some(ControllerState {
        accelerometer: Some(Vector3 {
            x: axis(report[3]),
            y: axis(report[4]),
            z: axis(report[5]),
        }),
        buttons,
    })
}
