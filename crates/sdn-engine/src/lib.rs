/*!
 * SDN Engine
 *
 * Command scheduling and the bridge runtime for Somfy SDN motor networks.
 * The [`Scheduler`] owns the outbound queue and the one-request-in-flight
 * discipline; the [`Bridge`] wires it to a transport, the configured
 * known motors and, with the `mqtt` feature, an MQTT broker.
 */

#![warn(missing_docs)]

pub mod bridge;
pub mod error;
pub mod queue;
pub mod scheduler;

pub use bridge::Bridge;
pub use error::{Error, Result};
pub use queue::{CommandQueue, ScheduledCommand};
pub use scheduler::{Scheduler, SchedulerState, Step, Timing};

/// SDN engine crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
