/*!
 * Error types for the SDN engine crate.
 */
use thiserror::Error;

use sdn_devices::DeviceError;

/// Error type for scheduler and bridge operations
#[derive(Error, Debug)]
pub enum Error {
    /// The inbound half of the link failed
    #[error("Failure reading: {0}")]
    Read(#[source] DeviceError),

    /// The outbound half of the link failed
    #[error("Failure writing: {0}")]
    Write(#[source] DeviceError),

    /// Device error outside the reader and writer loops
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] sdn_core::error::Error),

    /// A bridge task panicked or was cancelled
    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new other error
    pub fn other<S: AsRef<str>>(msg: S) -> Self {
        Error::Other(msg.as_ref().to_string())
    }

    /// Process exit status for a bridge that stopped with this error:
    /// 2 when reading failed, 1 when writing failed, 3 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Read(_) => 2,
            Error::Write(_) => 1,
            _ => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Read(DeviceError::Closed).exit_code(), 2);
        assert_eq!(Error::Write(DeviceError::Closed).exit_code(), 1);
        assert_eq!(Error::Device(DeviceError::format("zz")).exit_code(), 3);
        assert_eq!(Error::other("stopped").exit_code(), 3);
    }
}
