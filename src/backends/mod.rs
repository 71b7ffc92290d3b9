//! Transport backends.
//!
//! A [`Transport`] owns a byte or frame source and yields one [`Frame`] per
//! call to [`Transport::recv`]. The sensor's receive loop drives it.
//!
//! - [`udp`]: one datagram per frame.
//! - [`serial`]: one line per frame, with reconnect on I/O failure.
//! - [`polled`]: samples a [`Controller`](polled::Controller) at a fixed interval.
//! - [`virtual_input`]: in-memory controller, useful for tests and demos.
//! - `wiimote` (feature **`hid`**): Nintendo Wiimote over `hidapi`.

use crate::config::TransportConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::reconnect::ReconnectPolicy;

pub mod polled;
pub mod serial;
pub mod udp;
pub mod virtual_input;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod wiimote;

pub trait Transport: Send {
    /// Human-readable description, e.g. `udp://0.0.0.0:5700`.
    fn describe(&self) -> String;

    /// Wait for the next frame.
    ///
    /// `Ok(None)` means nothing usable arrived this cycle (timeout, empty or
    /// undecodable input). `Err` means the transport itself failed.
    fn recv(&mut self) -> Result<Option<Frame>>;

    /// Re-establish the underlying connection after a failure.
    fn reopen(&mut self) -> Result<()> {
        Err(crate::Error::ReconnectUnsupported(self.describe()))
    }

    /// Policy used by the receive loop when `recv` fails. `None` stops the
    /// loop on the first failure.
    fn reconnect_policy(&self) -> Option<&ReconnectPolicy> {
        None
    }

    /// Handle that unblocks a `recv` in progress on another thread.
    fn waker(&self) -> Option<Box<dyn Waker>> {
        None
    }
}

/// Unblocks a transport's pending read so the receive loop can observe
/// shutdown.
pub trait Waker: Send + Sync {
    fn wake(&self);
}

/// Open the transport described by `config`.
pub fn open(config: &TransportConfig) -> Result<Box<dyn Transport>> {
    match config {
        TransportConfig::Udp { port, bind } => {
            let transport = udp::UdpTransport::bind((*bind, *port).into())?;
            Ok(Box::new(transport))
        }
        TransportConfig::Serial {
            path,
            baud_rate,
            read_timeout_ms,
            reconnect,
        } => {
            let opener = serial::SerialPortOpener::new(path, *baud_rate)
                .read_timeout(std::time::Duration::from_millis(*read_timeout_ms));
            let transport = serial::SerialTransport::open(opener, reconnect.clone())?;
            Ok(Box::new(transport))
        }
        #[cfg(feature = "hid")]
        TransportConfig::Wiimote {
            address,
            poll_interval_ms,
        } => {
            let api = hidapi::HidApi::new()?;
            let wiimote = wiimote::Wiimote::open(&api, address.as_deref())?;
            Ok(Box::new(polled::PolledTransport::new(
                wiimote,
                std::time::Duration::from_millis(*poll_interval_ms),
            )))
        }
        #[cfg(not(feature = "hid"))]
        TransportConfig::Wiimote { .. } => Err(crate::Error::Unsupported("wiimote")),
    }
}
