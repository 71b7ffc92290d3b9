use crate::capability::Capability;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("`{0}` is not a known capability")]
    UnknownCapability(String),

    #[error("{0} is not a capability of this sensor")]
    NotACapability(Capability),

    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("{0} does not support reconnecting")]
    ReconnectUnsupported(String),

    #[error("transport `{0}` is not available in this build")]
    Unsupported(&'static str),

    #[error("invalid address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to install interrupt handler: {0}")]
    Interrupt(#[from] ctrlc::Error),

    #[error(transparent)]
    Serial(#[from] serialport::Error),

    #[cfg(feature = "hid")]
    #[error(transparent)]
    Hid(#[from] hidapi::HidError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
