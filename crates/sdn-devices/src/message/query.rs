//! First-generation queries. Each is answered by the matching `Post*` report.

use super::Payload;
use crate::codec::invert;
use crate::error::{DeviceError, Result};

empty_message! {
    /// Ask for the current position
    GetMotorPosition = 0x0c
}

empty_message! {
    /// Ask for run state and the cause of the last action
    GetMotorStatus = 0x0e
}

empty_message! {
    /// Ask for the configured limits
    GetMotorLimits = 0x21
}

empty_message! {
    /// Ask for the rotation direction
    GetMotorDirection = 0x22
}

empty_message! {
    /// Ask for the rolling speeds
    GetMotorRollingSpeed = 0x23
}

empty_message! {
    /// Ask for the network lock state
    GetNetworkLock = 0x26
}

empty_message! {
    /// Ask every addressed node to announce itself; usually broadcast
    GetNodeAddr = 0x40
}

empty_message! {
    /// Ask for the node label
    GetNodeLabel = 0x45
}

empty_message! {
    /// Ask for the serial number
    GetNodeSerialNumber = 0x4c
}

empty_message! {
    /// Ask for the network stack version
    GetNodeStackVersion = 0x70
}

empty_message! {
    /// Ask for the application version
    GetNodeAppVersion = 0x74
}

/// Ask for one intermediate position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetMotorIP {
    /// IP number, 1..=16
    pub ip: u8,
}

impl GetMotorIP {
    /// Query IP `ip`
    pub fn new(ip: u8) -> Result<Self> {
        check_index(ip, "ip")?;
        Ok(Self { ip })
    }
}

impl Payload for GetMotorIP {
    const MSG: u8 = 0x25;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Self::new(invert(params[0])).map_err(|e| DeviceError::malformed(e.to_string()))
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.ip));
        Ok(())
    }
}

/// Ask for one group membership slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetGroupAddr {
    /// Slot number, 1..=16; zero-based on the wire
    pub group_index: u8,
}

impl GetGroupAddr {
    /// Query slot `group_index`
    pub fn new(group_index: u8) -> Result<Self> {
        check_index(group_index, "group index")?;
        Ok(Self { group_index })
    }
}

impl Payload for GetGroupAddr {
    const MSG: u8 = 0x41;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Self::new(invert(params[0]).saturating_add(1)).map_err(|e| DeviceError::malformed(e.to_string()))
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.group_index.saturating_sub(1)));
        Ok(())
    }
}

/// Validate a 1-based slot number (IPs, group memberships)
pub(crate) fn check_index(index: u8, what: &str) -> Result<()> {
    if (1..=16).contains(&index) {
        Ok(())
    } else {
        Err(DeviceError::invalid_value(format!("{} {} is outside 1..=16", what, index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_index_is_zero_based_on_wire() -> Result<()> {
        let mut out = Vec::new();
        GetGroupAddr::new(1)?.encode(&mut out)?;
        assert_eq!(out, vec![0xff]);
        assert_eq!(GetGroupAddr::decode(&out)?.group_index, 1);
        Ok(())
    }

    #[test]
    fn test_ip_is_one_based_on_wire() -> Result<()> {
        let mut out = Vec::new();
        GetMotorIP::new(16)?.encode(&mut out)?;
        assert_eq!(out, vec![invert(16)]);
        assert_eq!(GetMotorIP::decode(&out)?.ip, 16);
        Ok(())
    }

    #[test]
    fn test_bounds() {
        assert!(GetMotorIP::new(0).is_err());
        assert!(GetGroupAddr::new(17).is_err());
        assert!(matches!(
            GetGroupAddr::decode(&[invert(16)]),
            Err(DeviceError::Malformed(_))
        ));
    }
}
