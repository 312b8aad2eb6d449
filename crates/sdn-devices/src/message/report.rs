//! First-generation reports sent by motors.

use super::query::check_index;
use super::types::{ActionCause, ActionSource, MotionDirection, MotorState, RotationDirection};
use super::Payload;
use crate::address::Address;
use crate::codec::{decode_string, encode_nillable, encode_number, encode_string, invert, nillable, number};
use crate::error::{DeviceError, Result};

/// Current position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostMotorPosition {
    /// Position in pulses from the up limit
    pub position_pulses: Option<u16>,
    /// Position in percent of travel
    pub position_percent: Option<u8>,
    /// The intermediate position the motor sits at, if any
    pub ip: Option<u8>,
}

impl Payload for PostMotorPosition {
    const MSG: u8 = 0x0d;
    const PARAMS_LENGTH: Option<usize> = Some(5);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            position_pulses: nillable(&params[0..2]).map(|v| v as u16),
            position_percent: nillable(&params[2..3]).map(|v| v as u8),
            ip: nillable(&params[4..5]).map(|v| v as u8),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(encode_nillable(self.position_pulses.map(u32::from), 2)?);
        out.extend(encode_nillable(self.position_percent.map(u32::from), 1)?);
        out.extend(encode_nillable(None, 1)?);
        out.extend(encode_nillable(self.ip.map(u32::from), 1)?);
        Ok(())
    }
}

/// Run state and last action. Values the motor reports that are not
/// documented decode as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostMotorStatus {
    /// Run state
    pub state: Option<MotorState>,
    /// Direction of the last movement
    pub last_direction: Option<MotionDirection>,
    /// Origin of the last action
    pub last_action_source: Option<ActionSource>,
    /// Why the last action ended
    pub last_action_cause: Option<ActionCause>,
}

impl Payload for PostMotorStatus {
    const MSG: u8 = 0x0f;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            state: MotorState::from_wire(number(&params[0..1])),
            last_direction: MotionDirection::from_wire(number(&params[1..2])),
            last_action_source: ActionSource::from_wire(number(&params[2..3])),
            last_action_cause: ActionCause::from_wire(number(&params[3..4])),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(encode_nillable(self.state.map(|v| v.to_wire().into()), 1)?);
        out.extend(encode_nillable(self.last_direction.map(|v| v.to_wire().into()), 1)?);
        out.extend(encode_nillable(self.last_action_source.map(|v| v.to_wire().into()), 1)?);
        out.extend(encode_nillable(self.last_action_cause.map(|v| v.to_wire().into()), 1)?);
        Ok(())
    }
}

/// Configured limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostMotorLimits {
    /// Up limit in pulses
    pub up_limit: Option<u16>,
    /// Down limit in pulses
    pub down_limit: Option<u16>,
}

impl Payload for PostMotorLimits {
    const MSG: u8 = 0x31;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            up_limit: nillable(&params[0..2]).map(|v| v as u16),
            down_limit: nillable(&params[2..4]).map(|v| v as u16),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(encode_nillable(self.up_limit.map(u32::from), 2)?);
        out.extend(encode_nillable(self.down_limit.map(u32::from), 2)?);
        Ok(())
    }
}

/// Rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostMotorDirection {
    /// Rotation direction
    pub direction: Option<RotationDirection>,
}

impl Payload for PostMotorDirection {
    const MSG: u8 = 0x32;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            direction: RotationDirection::from_wire(number(params)),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(encode_nillable(self.direction.map(|v| v.to_wire().into()), 1)?);
        Ok(())
    }
}

/// Rolling speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostMotorRollingSpeed {
    /// Up speed
    pub up_speed: u8,
    /// Down speed
    pub down_speed: u8,
    /// Slow speed
    pub slow_speed: u8,
}

impl Payload for PostMotorRollingSpeed {
    const MSG: u8 = 0x33;
    const PARAMS_LENGTH: Option<usize> = Some(6);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            up_speed: invert(params[0]),
            down_speed: invert(params[1]),
            slow_speed: invert(params[2]),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend([
            invert(self.up_speed),
            invert(self.down_speed),
            invert(self.slow_speed),
        ]);
        out.extend([invert(0); 3]);
        Ok(())
    }
}

/// One intermediate position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostMotorIP {
    /// IP number, 1..=16
    pub ip: u8,
    /// Position in pulses; `None` when the IP is not set
    pub position_pulses: Option<u16>,
    /// Position in percent
    pub position_percent: Option<u8>,
}

impl Payload for PostMotorIP {
    const MSG: u8 = 0x35;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let ip = invert(params[0]);
        check_index(ip, "ip").map_err(|e| DeviceError::malformed(e.to_string()))?;
        Ok(Self {
            ip,
            position_pulses: nillable(&params[1..3]).map(|v| v as u16),
            position_percent: nillable(&params[3..4]).map(|v| v as u8),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.ip));
        out.extend(encode_nillable(self.position_pulses.map(u32::from), 2)?);
        out.extend(encode_nillable(self.position_percent.map(u32::from), 1)?);
        Ok(())
    }
}

/// Network lock state, kept as the five decoded bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostNetworkLock {
    /// Decoded parameter bytes
    pub values: [u8; 5],
}

impl Payload for PostNetworkLock {
    const MSG: u8 = 0x36;
    const PARAMS_LENGTH: Option<usize> = Some(5);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let mut values = [0u8; 5];
        for (value, byte) in values.iter_mut().zip(params) {
            *value = invert(*byte);
        }
        Ok(Self { values })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(self.values.iter().map(|v| invert(*v)));
        Ok(())
    }
}

empty_message! {
    /// A node announcing itself; the address is the frame source
    PostNodeAddr = 0x60
}

/// One group membership slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostGroupAddr {
    /// Slot number, 1..=16; zero-based on the wire
    pub group_index: u8,
    /// Group in the slot; `None` for an empty slot
    pub group_address: Option<Address>,
}

impl Payload for PostGroupAddr {
    const MSG: u8 = 0x61;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let group_index = invert(params[0]).saturating_add(1);
        check_index(group_index, "group index").map_err(|e| DeviceError::malformed(e.to_string()))?;
        let address = Address::from_wire(&params[1..4]);
        let group_address = if address == Address::NONE || address == Address::GROUP_WILDCARD {
            None
        } else {
            Some(address)
        };
        Ok(Self {
            group_index,
            group_address,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.group_index.saturating_sub(1)));
        out.extend(self.group_address.unwrap_or(Address::NONE).to_wire());
        Ok(())
    }
}

/// Node label. First-generation motors use 16 bytes, ILT2 motors 32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostNodeLabel {
    /// Label text without padding
    pub label: String,
    /// Field width on the wire
    pub width: usize,
}

impl Payload for PostNodeLabel {
    const MSG: u8 = 0x65;
    const PARAMS_LENGTH: Option<usize> = None;

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            label: decode_string(params),
            width: params.len(),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(encode_string(&self.label, self.width));
        Ok(())
    }
}

/// Serial number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostNodeSerialNumber {
    /// Serial number text
    pub serial_number: String,
    /// Field width on the wire
    pub width: usize,
}

impl Payload for PostNodeSerialNumber {
    const MSG: u8 = 0x6c;
    const PARAMS_LENGTH: Option<usize> = None;

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            serial_number: decode_string(params),
            width: params.len(),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(encode_string(&self.serial_number, self.width));
        Ok(())
    }
}

/// Firmware version as reported by the stack and application version queries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeVersion {
    /// Firmware reference number
    pub reference: u32,
    /// Index letter
    pub index_letter: String,
    /// Index number
    pub index_number: u8,
    /// Profile
    pub profile: u8,
}

impl NodeVersion {
    const LENGTH: usize = 6;

    fn decode(params: &[u8]) -> Self {
        Self {
            reference: number(&params[0..3]),
            index_letter: decode_string(&params[3..4]),
            index_number: invert(params[4]),
            profile: invert(params[5]),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(encode_number(self.reference, 3)?);
        out.extend(encode_string(&self.index_letter, 1));
        out.push(invert(self.index_number));
        out.push(invert(self.profile));
        Ok(())
    }
}

/// Network stack version
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostNodeStackVersion(pub NodeVersion);

impl Payload for PostNodeStackVersion {
    const MSG: u8 = 0x71;
    const PARAMS_LENGTH: Option<usize> = Some(NodeVersion::LENGTH);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self(NodeVersion::decode(params)))
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.0.encode(out)
    }
}

/// Application version
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostNodeAppVersion(pub NodeVersion);

impl Payload for PostNodeAppVersion {
    const MSG: u8 = 0x75;
    const PARAMS_LENGTH: Option<usize> = Some(NodeVersion::LENGTH);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self(NodeVersion::decode(params)))
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.0.encode(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Body, Message};

    fn round_trip<P: Payload + std::fmt::Debug + PartialEq>(payload: P) -> Result<()> {
        let mut out = Vec::new();
        payload.encode(&mut out)?;
        if let Some(length) = P::PARAMS_LENGTH {
            assert_eq!(out.len(), length);
        }
        assert_eq!(P::decode(&out)?, payload);
        Ok(())
    }

    #[test]
    fn test_round_trips() -> Result<()> {
        round_trip(PostMotorPosition {
            position_pulses: Some(500),
            position_percent: Some(50),
            ip: None,
        })?;
        round_trip(PostMotorPosition::default())?;
        round_trip(PostMotorStatus {
            state: Some(MotorState::Running),
            last_direction: Some(MotionDirection::Up),
            last_action_source: Some(ActionSource::Network),
            last_action_cause: Some(ActionCause::ThermalProtection),
        })?;
        round_trip(PostMotorStatus::default())?;
        round_trip(PostMotorLimits {
            up_limit: Some(0),
            down_limit: Some(2_000),
        })?;
        round_trip(PostMotorDirection {
            direction: Some(RotationDirection::Reversed),
        })?;
        round_trip(PostMotorRollingSpeed {
            up_speed: 28,
            down_speed: 28,
            slow_speed: 6,
        })?;
        round_trip(PostMotorIP {
            ip: 16,
            position_pulses: Some(1_234),
            position_percent: Some(61),
        })?;
        round_trip(PostNetworkLock {
            values: [1, 0, 3, 4, 0],
        })?;
        round_trip(PostGroupAddr {
            group_index: 16,
            group_address: Some(Address::group(0x20)),
        })?;
        round_trip(PostGroupAddr {
            group_index: 1,
            group_address: None,
        })?;
        round_trip(PostNodeLabel {
            label: "Office East".into(),
            width: 16,
        })?;
        round_trip(PostNodeSerialNumber {
            serial_number: "SN4402".into(),
            width: 12,
        })?;
        round_trip(PostNodeAppVersion(NodeVersion {
            reference: 5_063_313,
            index_letter: "A".into(),
            index_number: 3,
            profile: 1,
        }))?;
        round_trip(PostNodeStackVersion(NodeVersion::default()))?;
        Ok(())
    }

    #[test]
    fn test_wildcard_group_slot_is_empty() -> Result<()> {
        let mut out = vec![invert(2)];
        out.extend(Address::GROUP_WILDCARD.to_wire());
        let slot = PostGroupAddr::decode(&out)?;
        assert_eq!(slot.group_index, 3);
        assert_eq!(slot.group_address, None);
        Ok(())
    }

    #[test]
    fn test_unknown_status_values_decode_as_none() -> Result<()> {
        let status = PostMotorStatus::decode(&[invert(9), invert(0), invert(7), invert(0x30)])?;
        assert_eq!(status.state, None);
        assert_eq!(status.last_direction, Some(MotionDirection::Down));
        assert_eq!(status.last_action_source, None);
        assert_eq!(status.last_action_cause, None);
        Ok(())
    }

    #[test]
    fn test_ilt2_label_width() -> Result<()> {
        let label = PostNodeLabel {
            label: "Living room, south facing window".into(),
            width: 32,
        };
        let message = Message::new(Address::new([1, 2, 3]), label.clone());
        let frame = message.encode()?;
        assert_eq!(frame.len(), 43);
        assert_eq!(Message::decode_frame(&frame)?.body, Body::PostNodeLabel(label));
        Ok(())
    }
}
