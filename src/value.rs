//! Sensor values and timestamped samples.
//!
//! A [`Value`] is the decoded form of one capability entry in a frame. Which
//! variant a capability produces is fixed by its [`Shape`].
//!
//! ## Wire conventions
//! - **Vectors** (`accelerometer`, `gyroscope`, `gravity`): `{"x": .., "y": .., "z": ..}`.
//! - **Rotation**: `{"pitch": .., "roll": .., "yaw": ..}`.
//! - **Temperature**: a bare number, or `{"degree": ..}`.
//! - **Buttons**: a bare `0`/`1` (any non-zero number counts as pressed), a
//!   boolean, or `{"pressed": ..}`.
//!
//! Extra fields inside objects are ignored. A value that does not fit its
//! capability's shape decodes to `None`.

use crate::capability::{Capability, Shape};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scalar {
    pub degree: f64,
}

/// Button state. `pressed` is `0` (up) or `1` (down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Button {
    pub pressed: u8,
}

impl Button {
    pub fn new(pressed: bool) -> Self {
        Self {
            pressed: u8::from(pressed),
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed != 0
    }
}

/// Decoded capability value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Vector(Vector3),
    Rotation(Rotation),
    Scalar(Scalar),
    Button(Button),
}

impl Value {
    /// Decode a raw JSON entry for `capability`.
    pub fn decode(capability: Capability, raw: &serde_json::Value) -> Option<Self> {
        match capability.shape() {
            Shape::Vector => Vector3::deserialize(raw).ok().map(Value::Vector),
            Shape::Rotation => Rotation::deserialize(raw).ok().map(Value::Rotation),
            Shape::Scalar => decode_degree(raw).map(|degree| Value::Scalar(Scalar { degree })),
            Shape::Button => decode_pressed(raw).map(|pressed| Value::Button(Button::new(pressed))),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::Vector(_) => Shape::Vector,
            Value::Rotation(_) => Shape::Rotation,
            Value::Scalar(_) => Shape::Scalar,
            Value::Button(_) => Shape::Button,
        }
    }

    pub fn as_vector(&self) -> Option<Vector3> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_rotation(&self) -> Option<Rotation> {
        match self {
            Value::Rotation(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_degree(&self) -> Option<f64> {
        match self {
            Value::Scalar(s) => Some(s.degree),
            _ => None,
        }
    }

    pub fn as_button(&self) -> Option<Button> {
        match self {
            Value::Button(b) => Some(*b),
            _ => None,
        }
    }
}

fn decode_degree(raw: &serde_json::Value) -> Option<f64> {
    match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Object(_) => Scalar::deserialize(raw).ok().map(|s| s.degree),
        _ => None,
    }
}

fn decode_pressed(raw: &serde_json::Value) -> Option<bool> {
    match raw {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        serde_json::Value::Object(map) => match map.get("pressed")? {
            serde_json::Value::Object(_) => None,
            inner => decode_pressed(inner),
        },
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Vector(v) => write!(f, "x={:.3} y={:.3} z={:.3}", v.x, v.y, v.z),
            Value::Rotation(r) => {
                write!(f, "pitch={:.3} roll={:.3} yaw={:.3}", r.pitch, r.roll, r.yaw)
            }
            Value::Scalar(s) => write!(f, "{:.2}°", s.degree),
            Value::Button(b) if b.is_pressed() => f.write_str("pressed"),
            Value::Button(_) => f.write_str("released"),
        }
    }
}

/// A value as stored by the hub, stamped when it was accepted.
///
/// Equality compares the value only; `last_update` is ignored.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Sample {
    #[serde(flatten)]
    pub value: Value,
    pub last_update: DateTime<Utc>,
}

impl Sample {
    pub fn new(value: Value, last_update: DateTime<Utc>) -> Self {
        Self { value, last_update }
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
