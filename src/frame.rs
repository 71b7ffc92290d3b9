//! Wire frames.
//!
//! One [`Frame`] is one complete unit of input: a UDP datagram, a serial line,
//! or one poll of a controller. Text frames carry a flat JSON object whose keys
//! are capability names; polled controllers hand over already decoded pairs.

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::value::Value;
use log::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A JSON document as received from the wire.
    Json(String),
    /// Pairs synthesized by a polled device.
    Decoded(Vec<(Capability, Value)>),
}

impl Frame {
    /// Resolve the frame into `(capability, value)` pairs.
    ///
    /// A frame that is not a JSON object fails as a whole. Inside a valid
    /// object, unknown keys and values of the wrong shape are skipped one by
    /// one and the remaining pairs are still returned.
    pub fn decode(&self) -> Result<Vec<(Capability, Value)>> {
        match self {
            Frame::Decoded(pairs) => Ok(pairs.clone()),
            Frame::Json(text) => decode_json(text),
        }
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Frame::Json(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Frame::Json(text.to_string())
    }
}

fn decode_json(text: &str) -> Result<Vec<(Capability, Value)>> {
    let document: serde_json::Value = serde_json::from_str(text).map_err(Error::MalformedFrame)?;
    let serde_json::Value::Object(entries) = document else {
        return Err(Error::NotAnObject);
    };

    let mut pairs = Vec::with_capacity(entries.len());
    for (key, raw) in &entries {
        let Some(capability) = Capability::from_key(key) else {
            debug!("skipping unknown capability key `{key}`");
            continue;
        };
        match Value::decode(capability, raw) {
            Some(value) => pairs.push((capability, value)),
            None => debug!("skipping `{key}`: value {raw} does not fit {:?}", capability.shape()),
        }
    }
    Ok(pairs)
}
