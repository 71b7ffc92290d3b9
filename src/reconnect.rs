//! Reconnect policy for transports that can be reopened (serial lines).
//!
//! The first reopen attempt is immediate. After each failure the policy waits
//! `initial_delay * 2^n`, capped at `max_delay`, and gives up after
//! `max_attempts` failures when a limit is set. Waits are sliced so a cleared
//! `receiving` flag is noticed within [`WAIT_SLICE`].

use crate::backends::Transport;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep while waiting between attempts.
pub const WAIT_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay after the `failures`-th consecutive failed attempt (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(32);
        let delay = self.initial_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Reopen `transport` until it succeeds, the attempt limit is reached,
    /// or `keep_going` turns false. Returns `true` when reconnected.
    pub fn reconnect(&self, transport: &mut dyn Transport, keep_going: impl Fn() -> bool) -> bool {
        let mut failures = 0u32;
        loop {
            if !keep_going() {
                return false;
            }
            match transport.reopen() {
                Ok(()) => {
                    info!("{}: reconnected", transport.describe());
                    return true;
                }
                Err(err) => {
                    failures += 1;
                    warn!(
                        "{}: reconnect attempt {failures} failed: {err}",
                        transport.describe()
                    );
                }
            }
            if self.max_attempts.is_some_and(|max| failures >= max) {
                return false;
            }
            wait(self.delay_after(failures), &keep_going);
        }
    }
}

fn wait(total: Duration, keep_going: &impl Fn() -> bool) {
    let deadline = Instant::now() + total;
    loop {
        let now = Instant::now();
        if now >= deadline || !keep_going() {
            return;
        }
        thread::sleep((deadline - now).min(WAIT_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::frame::Frame;
    use std::cell::Cell;

    struct Flaky {
        failures_left: u32,
        reopened: u32,
    }

    impl Transport for Flaky {
        fn describe(&self) -> String {
            "flaky".into()
        }

        fn recv(&mut self) -> Result<Option<Frame>> {
            Ok(None)
        }

        fn reopen(&mut self) -> Result<()> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(Error::Io(std::io::ErrorKind::NotFound.into()));
            }
            self.reopened += 1;
            Ok(())
        }
    }

    fn fast(max_attempts: Option<u32>) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts,
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(4), Duration::from_millis(800));
        assert_eq!(policy.delay_after(10), Duration::from_millis(5_000));
        assert_eq!(policy.delay_after(200), Duration::from_millis(5_000));
    }

    #[test]
    fn retries_until_the_device_comes_back() {
        let mut transport = Flaky {
            failures_left: 3,
            reopened: 0,
        };
        assert!(fast(None).reconnect(&mut transport, || true));
        assert_eq!(transport.reopened, 1);
        assert_eq!(transport.failures_left, 0);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut transport = Flaky {
            failures_left: 10,
            reopened: 0,
        };
        assert!(!fast(Some(3)).reconnect(&mut transport, || true));
        assert_eq!(transport.failures_left, 7);
    }

    #[test]
    fn stops_when_told_to() {
        let mut transport = Flaky {
            failures_left: u32::MAX,
            reopened: 0,
        };
        let calls = Cell::new(0);
        let keep_going = || {
            calls.set(calls.get() + 1);
            calls.get() < 5
        };
        assert!(!ReconnectPolicy::default().reconnect(&mut transport, keep_going));
        assert_eq!(transport.reopened, 0);
    }

    #[test]
    fn unsupported_transports_fail_fast() {
        struct Fixed;
        impl Transport for Fixed {
            fn describe(&self) -> String {
                "fixed".into()
            }
            fn recv(&mut self) -> Result<Option<Frame>> {
                Ok(None)
            }
        }
        assert!(!fast(Some(1)).reconnect(&mut Fixed, || true));
    }

    #[test]
    fn deserializes_with_defaults() {
        let policy: ReconnectPolicy = toml::from_str("max_attempts = 4").unwrap();
        assert_eq!(
            policy,
            ReconnectPolicy {
                max_attempts: Some(4),
                ..ReconnectPolicy::default()
            }
        );
    }
}
