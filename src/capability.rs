//! Capability identifiers.
//!
//! A [`Capability`] names one class of sensor data (an accelerometer, a
//! button, ...). The set is closed: keys arriving on the wire are matched
//! case-insensitively against [`Capability::ALL`], and anything else is
//! rejected by the frame decoder.
//!
//! Each capability has a fixed [`Shape`] describing the value it carries.
//!
//! | Capability | Shape |
//! |---|---|
//! | `button_1` .. `button_4` | [`Shape::Button`] |
//! | `accelerometer`, `gyroscope`, `gravity` | [`Shape::Vector`] |
//! | `rotation` | [`Shape::Rotation`] |
//! | `temperature` | [`Shape::Scalar`] |

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named class of sensor data.
///
/// Ordering follows declaration order, so `BTreeMap`/`BTreeSet` keyed by
/// capability iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "button_1")]
    Button1,
    #[serde(rename = "button_2")]
    Button2,
    #[serde(rename = "button_3")]
    Button3,
    #[serde(rename = "button_4")]
    Button4,
    #[serde(rename = "accelerometer")]
    Accelerometer,
    #[serde(rename = "gyroscope")]
    Gyroscope,
    #[serde(rename = "rotation")]
    Rotation,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "gravity")]
    Gravity,
}

/// The kind of value a capability carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `{x, y, z}`
    Vector,
    /// `{pitch, roll, yaw}`
    Rotation,
    /// `{degree}`
    Scalar,
    /// `{pressed: 0|1}`
    Button,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::Button1,
        Capability::Button2,
        Capability::Button3,
        Capability::Button4,
        Capability::Accelerometer,
        Capability::Gyroscope,
        Capability::Rotation,
        Capability::Temperature,
        Capability::Gravity,
    ];

    /// Wire name of the capability.
    pub const fn as_str(self) -> &'static str {
        match self {
            Capability::Button1 => "button_1",
            Capability::Button2 => "button_2",
            Capability::Button3 => "button_3",
            Capability::Button4 => "button_4",
            Capability::Accelerometer => "accelerometer",
            Capability::Gyroscope => "gyroscope",
            Capability::Rotation => "rotation",
            Capability::Temperature => "temperature",
            Capability::Gravity => "gravity",
        }
    }

    pub const fn shape(self) -> Shape {
        match self {
            Capability::Button1
            | Capability::Button2
            | Capability::Button3
            | Capability::Button4 => Shape::Button,
            Capability::Accelerometer | Capability::Gyroscope | Capability::Gravity => {
                Shape::Vector
            }
            Capability::Rotation => Shape::Rotation,
            Capability::Temperature => Shape::Scalar,
        }
    }

    /// Case-insensitive lookup of a wire key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|cap| cap.as_str().eq_ignore_ascii_case(key))
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| Error::UnknownCapability(s.to_string()))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
