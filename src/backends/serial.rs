//! Serial line transport.
//!
//! One newline-terminated line is one frame. The port is opened with a short
//! read timeout so the receive loop can observe shutdown; a timeout is not a
//! failure. Any other read error, or end of stream, drops the port and leaves
//! recovery to the transport's [`ReconnectPolicy`].
//!
//! Opening is abstracted behind [`SerialOpener`] so that the line framing and
//! the reconnect path can run against in-memory readers.

use super::Transport;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::reconnect::ReconnectPolicy;
use log::{debug, info, trace};
use std::io::{ErrorKind, Read};
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Lines longer than this without a terminator are discarded.
const MAX_LINE_LEN: usize = 4096;
const READ_CHUNK: usize = 256;

/// Opens (and reopens) the byte stream behind a serial transport.
pub trait SerialOpener: Send {
    fn describe(&self) -> String;
    fn open(&self) -> Result<Box<dyn Read + Send>>;
}

/// Opens a real device through the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialPortOpener {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl SerialOpener for SerialPortOpener {
    fn describe(&self) -> String {
        format!("serial://{}@{}", self.path, self.baud_rate)
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(self.read_timeout)
            .open()?;
        Ok(Box::new(port))
    }
}

pub struct SerialTransport<O: SerialOpener = SerialPortOpener> {
    opener: O,
    port: Option<Box<dyn Read + Send>>,
    pending: Vec<u8>,
    /// Set while skipping the rest of an overlong line.
    discarding: bool,
    policy: ReconnectPolicy,
}

impl<O: SerialOpener> SerialTransport<O> {
    /// Open the device right away; failure to open is reported to the caller.
    pub fn open(opener: O, policy: ReconnectPolicy) -> Result<Self> {
        let port = opener.open()?;
        info!("opened {}", opener.describe());
        Ok(Self {
            opener,
            port: Some(port),
            pending: Vec::new(),
            discarding: false,
            policy,
        })
    }

    /// Pop the next complete line from the buffer.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Buffer freshly read bytes, dropping overlong lines up to their
    /// terminator.
    fn accept(&mut self, mut bytes: &[u8]) {
        if self.discarding {
            let Some(end) = bytes.iter().position(|b| *b == b'\n') else {
                return;
            };
            self.discarding = false;
            bytes = &bytes[end + 1..];
        }
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_LINE_LEN && !self.pending.contains(&b'\n') {
            debug!("{}: discarding overlong line", self.describe());
            self.pending.clear();
            self.discarding = true;
        }
    }

    fn reset(&mut self) {
        self.port = None;
        self.pending.clear();
        self.discarding = false;
    }

    fn lost(&mut self, err: Error) -> Error {
        self.reset();
        err
    }
}

impl<O: SerialOpener> Transport for SerialTransport<O> {
    fn describe(&self) -> String {
        self.opener.describe()
    }

    fn recv(&mut self) -> Result<Option<Frame>> {
        if let Some(line) = self.next_line() {
            return Ok(match String::from_utf8(line) {
                Ok(text) if !text.trim().is_empty() => Some(Frame::Json(text)),
                Ok(_) => None,
                Err(_) => {
                    trace!("{}: dropping non UTF-8 line", self.describe());
                    None
                }
            });
        }

        let Some(port) = self.port.as_mut() else {
            return Err(Error::Io(ErrorKind::NotConnected.into()));
        };

        let mut chunk = [0u8; READ_CHUNK];
        match port.read(&mut chunk) {
            Ok(0) => Err(self.lost(Error::Io(ErrorKind::UnexpectedEof.into()))),
            Ok(len) => {
                self.accept(&chunk[..len]);
                Ok(None)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(self.lost(Error::Io(err))),
        }
    }

    fn reopen(&mut self) -> Result<()> {
        self.reset();
        self.port = Some(self.opener.open()?);
        Ok(())
    }

    fn reconnect_policy(&self) -> Option<&ReconnectPolicy> {
        Some(&self.policy)
    }
}
