/*!
 * SDN Devices
 *
 * The Somfy SDN wire protocol: addresses, the frame codec, the message
 * catalogue for both motor generations, a resynchronizing frame scanner,
 * transports for serial, PTY, TCP and telnet links, and the motor and group
 * state model fed by inbound reports.
 */

#![warn(missing_docs)]

pub use sdn_core::prelude;

pub mod address;
pub mod codec;
pub mod device;
pub mod error;
pub mod message;
pub mod registry;
pub mod scanner;
pub mod transport;

#[cfg(feature = "mqtt")]
pub mod protocols;

pub use address::Address;
pub use device::{AttributeChange, AttributeSink, Group, Motor};
pub use error::{DeviceError, Result};
pub use message::{Body, Kind, Message};
pub use registry::{ControlAction, DeviceRegistry};
pub use transport::{Endpoint, MessageSink, MessageSource, Transport};

/// SDN devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Transports compiled into this build
pub fn available_transports() -> Vec<&'static str> {
    let mut transports = vec!["tcp", "telnet"];

    #[cfg(all(unix, feature = "serial"))]
    transports.push("pty");

    #[cfg(feature = "serial")]
    transports.push("serial");

    transports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transports() {
        let transports = available_transports();
        assert!(transports.contains(&"tcp"));
        #[cfg(feature = "serial")]
        assert!(transports.contains(&"serial"));
    }
}
