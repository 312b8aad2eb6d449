/*!
 * Error type for protocol, transport and device-state operations.
 */
use thiserror::Error;

use sdn_core::error::Error as CoreError;

use crate::message::NackCode;

/// Error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Text could not be parsed (addresses, connection strings)
    #[error("Format error: {0}")]
    Format(String),

    /// A frame passed its checksum but its parameters do not decode
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// A field value is outside the range the protocol allows
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The device refused the request
    #[error("Device answered with Nack ({0})")]
    Nack(NackCode),

    /// The message can be inspected but never written back to the bus
    #[error("Message is not serializable: {0}")]
    NotSerializable(String),

    /// The endpoint needs a feature this build does not have
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The link reported end-of-stream too many times in a row
    #[error("Connection closed by peer")]
    Closed,

    /// I/O error on the link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout error
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Pub-sub client error
    #[error("MQTT error: {0}")]
    Mqtt(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// Create a new format error
    pub fn format<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::Format(msg.as_ref().to_string())
    }

    /// Create a new malformed-message error
    pub fn malformed<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::Malformed(msg.as_ref().to_string())
    }

    /// Create a new invalid-value error
    pub fn invalid_value<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::InvalidValue(msg.as_ref().to_string())
    }

    /// Whether a reader can log this error and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DeviceError::Malformed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NackReason;

    #[test]
    fn test_recoverable() {
        assert!(DeviceError::malformed("short").is_recoverable());
        assert!(!DeviceError::Closed.is_recoverable());
        assert!(!DeviceError::format("zz").is_recoverable());
    }

    #[test]
    fn test_nack_display() {
        let err = DeviceError::Nack(NackCode::Known(NackReason::NodeIsLocked));
        assert_eq!(err.to_string(), "Device answered with Nack (node_is_locked)");
        let err = DeviceError::Nack(NackCode::Other(0x42));
        assert_eq!(err.to_string(), "Device answered with Nack (0x42)");
    }
}
