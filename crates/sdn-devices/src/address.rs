/*!
 * SDN node addresses.
 *
 * Every node on the bus has a three byte address. `FF.FF.FF` reaches every
 * node, `01.01.xx` is a group, and the bridge itself talks as `00.00.01`.
 */
use std::fmt;
use std::str::FromStr;

use crate::codec::transform;
use crate::error::{DeviceError, Result};

/// A three byte SDN address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 3]);

impl Address {
    /// Every node on the bus
    pub const BROADCAST: Address = Address([0xff, 0xff, 0xff]);
    /// The bridge's own source address
    pub const BRIDGE: Address = Address([0x00, 0x00, 0x01]);
    /// The all-zero address, used as "no destination" for group-sourced frames
    pub const NONE: Address = Address([0x00, 0x00, 0x00]);
    /// Source address used by UAI+ keypads, never tracked as a motor
    pub const UAI_PLUS: Address = Address([0x7f, 0x7f, 0x7f]);
    /// Group wildcard reported by motors for an unused membership slot
    pub const GROUP_WILDCARD: Address = Address([0x01, 0x01, 0xff]);

    /// Build an address from raw bytes
    pub const fn new(bytes: [u8; 3]) -> Self {
        Address(bytes)
    }

    /// The group address `01.01.<id>`
    pub const fn group(id: u8) -> Self {
        Address([0x01, 0x01, id])
    }

    /// Raw bytes, most significant first
    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }

    /// Whether this addresses a group of motors
    pub fn is_group(&self) -> bool {
        self.0[0] == 0x01 && self.0[1] == 0x01
    }

    /// Whether this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Whether frames from this address describe a single physical motor
    pub fn is_motor(&self) -> bool {
        !self.is_group()
            && !self.is_broadcast()
            && *self != Self::NONE
            && *self != Self::BRIDGE
            && *self != Self::UAI_PLUS
    }

    /// The address without separators, e.g. `0A0B0C`
    pub fn compact(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }

    /// Decode an address field as it appears in a frame
    pub(crate) fn from_wire(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 3];
        for (slot, byte) in raw.iter_mut().zip(transform(bytes)) {
            *slot = byte;
        }
        Address(raw)
    }

    /// Encode the address as it appears in a frame
    pub(crate) fn to_wire(self) -> Vec<u8> {
        transform(&self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}.{:02X}.{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl From<[u8; 3]> for Address {
    fn from(bytes: [u8; 3]) -> Self {
        Address(bytes)
    }
}

impl FromStr for Address {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self> {
        parse_address(s)
    }
}

/// Parse `hh[.:]hh[.:]hh`, separators optional
pub fn parse_address(text: &str) -> Result<Address> {
    let invalid = || DeviceError::format(format!("invalid address {:?}", text));
    let bytes = text.as_bytes();
    let mut raw = [0u8; 3];
    let mut pos = 0;

    for (i, slot) in raw.iter_mut().enumerate() {
        if i > 0 && matches!(bytes.get(pos), Some(b'.') | Some(b':')) {
            pos += 1;
        }
        let pair = bytes.get(pos..pos + 2).ok_or_else(invalid)?;
        if !pair.iter().all(u8::is_ascii_hexdigit) {
            return Err(invalid());
        }
        let digits = std::str::from_utf8(pair).map_err(|_| invalid())?;
        *slot = u8::from_str_radix(digits, 16).map_err(|_| invalid())?;
        pos += 2;
    }

    if pos != bytes.len() {
        return Err(invalid());
    }
    Ok(Address(raw))
}
