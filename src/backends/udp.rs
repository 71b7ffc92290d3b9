//! UDP transport.
//!
//! One datagram is one frame. Datagrams are decoded as UTF-8 and handed on as
//! JSON text; anything else is dropped. There is no reply and no handshake.
//! Datagrams larger than the receive buffer are truncated by the OS and fail
//! to parse downstream.

use super::{Transport, Waker};
use crate::error::{Error, Result};
use crate::frame::Frame;
use log::{debug, trace, warn};
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

const RECV_BUFFER_LEN: usize = 4096;

/// Read timeout used instead of a waker when none can be built.
const FALLBACK_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// `WSAEMSGSIZE`: Windows reports an oversized datagram as an error.
const WSAEMSGSIZE: i32 = 10040;

pub struct UdpTransport {
    socket: UdpSocket,
    local: SocketAddr,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind to `addr`. Port `0` picks an ephemeral port; see
    /// [`UdpTransport::local_addr`].
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let local = socket.local_addr()?;
        debug!("listening on udp://{local}");
        Ok(Self {
            socket,
            local,
            buf: vec![0u8; RECV_BUFFER_LEN],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

impl Transport for UdpTransport {
    fn describe(&self) -> String {
        format!("udp://{}", self.local)
    }

    fn recv(&mut self) -> Result<Option<Frame>> {
        let len = match self.socket.recv_from(&mut self.buf) {
            Ok((len, _)) => len,
            Err(err) if is_per_datagram(&err) => {
                trace!("udp://{}: {err}", self.local);
                return Ok(None);
            }
            Err(err) => return Err(Error::Io(err)),
        };
        if len == 0 {
            return Ok(None);
        }

        match std::str::from_utf8(&self.buf[..len]) {
            Ok(text) => Ok(Some(Frame::Json(text.to_string()))),
            Err(_) => {
                trace!("udp://{}: dropping non UTF-8 datagram", self.local);
                Ok(None)
            }
        }
    }

    fn waker(&self) -> Option<Box<dyn Waker>> {
        self.waker_or_timeout(UdpWaker::new(self.local))
    }
}

impl UdpTransport {
    /// Without a waker, bound every `recv_from` so shutdown is still observed.
    fn waker_or_timeout(&self, waker: std::io::Result<UdpWaker>) -> Option<Box<dyn Waker>> {
        match waker {
            Ok(waker) => Some(Box::new(waker)),
            Err(err) => {
                debug!(
                    "udp://{}: no waker ({err}), polling every {FALLBACK_READ_TIMEOUT:?}",
                    self.local
                );
                if let Err(err) = self.socket.set_read_timeout(Some(FALLBACK_READ_TIMEOUT)) {
                    warn!("udp://{}: cannot set read timeout: {err}", self.local);
                }
                None
            }
        }
    }
}

/// Errors that concern a single datagram (or none at all) rather than the
/// socket. The frame is dropped and the loop carries on.
fn is_per_datagram(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(WSAEMSGSIZE)
        || matches!(
            err.kind(),
            ErrorKind::Interrupted
                | ErrorKind::WouldBlock
                | ErrorKind::TimedOut
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionRefused
        )
}

/// Sends an empty datagram to the listening socket, which returns from its
/// blocking `recv_from`.
struct UdpWaker {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpWaker {
    fn new(listening: SocketAddr) -> std::io::Result<Self> {
        let (unspecified, loopback): (IpAddr, IpAddr) = match listening {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED.into(), Ipv4Addr::LOCALHOST.into()),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED.into(), Ipv6Addr::LOCALHOST.into()),
        };
        let mut target = listening;
        if target.ip().is_unspecified() {
            target.set_ip(loopback);
        }
        let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0))?;
        Ok(Self { socket, target })
    }
}

impl Waker for UdpWaker {
    fn wake(&self) {
        if let Err(err) = self.socket.send_to(&[], self.target) {
            debug!("udp wake to {} failed: {err}", self.target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_transport() -> UdpTransport {
        UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap()
    }

    #[test]
    fn one_datagram_is_one_frame() {
        let mut transport = loopback_transport();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(br#"{"button_1":1}"#, transport.local_addr())
            .unwrap();

        let frame = transport.recv().unwrap();
        assert_eq!(frame, Some(Frame::Json(r#"{"button_1":1}"#.to_string())));
    }

    #[test]
    fn invalid_utf8_is_dropped() {
        let mut transport = loopback_transport();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[0xff, 0xfe, 0x7b], transport.local_addr()).unwrap();
        assert_eq!(transport.recv().unwrap(), None);
    }

    #[test]
    fn waker_unblocks_a_pending_recv() {
        let mut transport = UdpTransport::bind("0.0.0.0:0".parse().unwrap()).unwrap();
        let waker = transport.waker().unwrap();

        let handle = std::thread::spawn(move || transport.recv());
        std::thread::sleep(std::time::Duration::from_millis(50));
        waker.wake();

        let result = handle.join().unwrap().unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn oversized_and_transient_errors_skip_the_datagram() {
        assert!(is_per_datagram(&std::io::Error::from_raw_os_error(WSAEMSGSIZE)));
        assert!(is_per_datagram(&ErrorKind::WouldBlock.into()));
        assert!(is_per_datagram(&ErrorKind::ConnectionReset.into()));
        assert!(!is_per_datagram(&ErrorKind::PermissionDenied.into()));
        assert!(!is_per_datagram(&ErrorKind::NotConnected.into()));
    }

    #[test]
    fn missing_waker_falls_back_to_a_read_timeout() {
        let mut transport = loopback_transport();
        let unavailable = Err(std::io::Error::from(ErrorKind::AddrNotAvailable));
        assert!(transport.waker_or_timeout(unavailable).is_none());
        assert_eq!(
            transport.socket.read_timeout().unwrap(),
            Some(FALLBACK_READ_TIMEOUT)
        );
        assert_eq!(transport.recv().unwrap(), None);
    }

    #[test]
    fn describe_names_the_bound_address() {
        let transport = loopback_transport();
        assert_eq!(
            transport.describe(),
            format!("udp://127.0.0.1:{}", transport.local_addr().port())
        );
    }
}
