//! Hand-off of the runtime-assigned port from the service to the operator.
//!
//! The readiness handler publishes the bound port once per run; the control
//! surface reads it from any thread. Everything lives in one `AtomicU32`:
//!
//! ```text
//! bit 16      : published in the current run
//! bits 0..16  : last published port (0 = never published)
//! ```
//!
//! `reset()` only clears the run flag. The previous port stays readable until
//! the next run publishes its own.

use std::sync::atomic::{AtomicU32, Ordering};

const PORT_MASK: u32 = 0xFFFF;
const PUBLISHED: u32 = 1 << 16;

/// Sentinel returned by [`PortHandoff::read`] before any run has booted.
pub const UNSET_PORT: u16 = 0;

/// Single-writer, multi-reader store for the bound port.
#[derive(Debug, Default)]
pub struct PortHandoff {
    state: AtomicU32,
}

impl PortHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the bound port for the current run.
    ///
    /// Only the first publish of a run is authoritative; later calls are
    /// ignored with a warning. Port 0 is not a bound port and is refused.
    /// Returns whether the value was stored.
    pub fn publish(&self, port: u16) -> bool {
        if port == UNSET_PORT {
            tracing::warn!("Refusing to publish port 0");
            return false;
        }

        let next = PUBLISHED | u32::from(port);
        let result = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current & PUBLISHED == 0).then_some(next)
            });

        match result {
            Ok(_) => {
                tracing::debug!(port, "Port published");
                true
            }
            Err(current) => {
                tracing::warn!(
                    port,
                    published = current & PORT_MASK,
                    "Port already published for this run, ignoring"
                );
                false
            }
        }
    }

    /// Last published port, or [`UNSET_PORT`] if no run has booted yet.
    pub fn read(&self) -> u16 {
        // Masked to 16 bits, the cast cannot truncate.
        (self.state.load(Ordering::SeqCst) & PORT_MASK) as u16
    }

    /// Whether the current run has published its port.
    pub fn is_published(&self) -> bool {
        self.state.load(Ordering::SeqCst) & PUBLISHED != 0
    }

    /// Re-arm for a new run. Called before the runtime boots.
    pub fn reset(&self) {
        self.state.fetch_and(!PUBLISHED, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_unset_before_publish() {
        let port = PortHandoff::new();
        assert_eq!(port.read(), UNSET_PORT);
        assert!(!port.is_published());
    }

    #[test]
    fn test_first_publish_wins() {
        let port = PortHandoff::new();
        assert!(port.publish(8080));
        assert!(!port.publish(9090));
        assert_eq!(port.read(), 8080);
    }

    #[test]
    fn test_reset_keeps_value_until_next_publish() {
        let port = PortHandoff::new();
        port.publish(8080);

        port.reset();
        assert_eq!(port.read(), 8080);
        assert!(!port.is_published());

        assert!(port.publish(8181));
        assert_eq!(port.read(), 8181);
    }

    #[test]
    fn test_zero_port_is_refused() {
        let port = PortHandoff::new();
        assert!(!port.publish(0));
        assert!(!port.is_published());
        assert_eq!(port.read(), UNSET_PORT);

        assert!(port.publish(8080));
        port.reset();
        assert!(!port.publish(0));
        assert_eq!(port.read(), 8080);
        assert!(!port.is_published());
    }

    #[test]
    fn test_max_port_round_trips() {
        let port = PortHandoff::new();
        port.publish(u16::MAX);
        assert_eq!(port.read(), u16::MAX);
        assert!(port.is_published());
    }

    #[test]
    fn test_concurrent_publishers_single_winner() {
        let port = Arc::new(PortHandoff::new());
        let handles: Vec<_> = (1..=8u16)
            .map(|p| {
                let port = Arc::clone(&port);
                thread::spawn(move || port.publish(9000 + p))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!((9001..=9008).contains(&port.read()));
    }
}
