//! First-generation configuration commands. All are answered with Ack/Nack.

use super::query::check_index;
use super::types::{required, FactoryReset, IpAction, LimitAction, LimitTarget, RotationDirection};
use super::Payload;
use crate::address::Address;
use crate::codec::{decode_string, encode_nillable, encode_number, encode_string, invert, nillable, number};
use crate::error::{DeviceError, Result};

/// Change a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMotorLimits {
    /// How to change it
    pub action: LimitAction,
    /// Which limit
    pub target: LimitTarget,
    /// Pulses, or milliseconds for `JogMs` (10 ms resolution)
    pub value: u32,
}

impl Payload for SetMotorLimits {
    const MSG: u8 = 0x11;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let action = number(&params[0..1]);
        let action = required(LimitAction::from_wire(action), "limit action", action)?;
        let target = number(&params[1..2]);
        let mut value = number(&params[2..4]);
        if action == LimitAction::JogMs {
            value *= 10;
        }
        Ok(Self {
            action,
            target: required(LimitTarget::from_wire(target), "limit target", target)?,
            value,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let value = if self.action == LimitAction::JogMs {
            self.value / 10
        } else {
            self.value
        };
        out.push(invert(self.action.to_wire()));
        out.push(invert(self.target.to_wire()));
        out.extend(encode_number(value, 2)?);
        Ok(())
    }
}

/// Change the rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMotorDirection {
    /// New direction
    pub direction: RotationDirection,
}

impl Payload for SetMotorDirection {
    const MSG: u8 = 0x12;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let direction = number(params);
        Ok(Self {
            direction: required(RotationDirection::from_wire(direction), "direction", direction)?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.direction.to_wire()));
        Ok(())
    }
}

/// Change rolling speeds; `None` leaves a speed unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetMotorRollingSpeed {
    /// Up speed
    pub up_speed: Option<u8>,
    /// Down speed
    pub down_speed: Option<u8>,
    /// Slow speed
    pub slow_speed: Option<u8>,
}

impl Payload for SetMotorRollingSpeed {
    const MSG: u8 = 0x13;
    const PARAMS_LENGTH: Option<usize> = Some(3);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let speed = |i: usize| nillable(&params[i..i + 1]).map(|v| v as u8);
        Ok(Self {
            up_speed: speed(0),
            down_speed: speed(1),
            slow_speed: speed(2),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        for speed in [self.up_speed, self.down_speed, self.slow_speed] {
            out.extend(encode_nillable(speed.map(u32::from), 1)?);
        }
        Ok(())
    }
}

/// Change an intermediate position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMotorIP {
    /// How to change it
    pub action: IpAction,
    /// IP number 1..=16; `None` (wire 0) for `Distribute`
    pub ip: Option<u8>,
    /// Pulses, percent, or IP count for `Distribute`
    pub value: u16,
}

impl Payload for SetMotorIP {
    const MSG: u8 = 0x15;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let action = number(&params[0..1]);
        let ip = match invert(params[1]) {
            0 => None,
            ip => Some(ip),
        };
        Ok(Self {
            action: required(IpAction::from_wire(action), "ip action", action)?,
            ip,
            value: number(&params[2..4]) as u16,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.action.to_wire()));
        out.push(invert(self.ip.unwrap_or(0)));
        out.extend(encode_number(u32::from(self.value), 2)?);
        Ok(())
    }
}

/// Lock or unlock the motor against network commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetNetworkLock {
    /// Lock when true
    pub locked: bool,
    /// Lock priority
    pub priority: u8,
}

impl Payload for SetNetworkLock {
    const MSG: u8 = 0x16;
    const PARAMS_LENGTH: Option<usize> = Some(2);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            locked: invert(params[0]) != 0,
            priority: invert(params[1]),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(u8::from(self.locked)));
        out.push(invert(self.priority));
        Ok(())
    }
}

/// Restore factory settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetFactoryDefault {
    /// What to reset
    pub reset: FactoryReset,
}

impl Payload for SetFactoryDefault {
    const MSG: u8 = 0x1f;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let reset = number(params);
        Ok(Self {
            reset: required(FactoryReset::from_wire(reset), "reset", reset)?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.reset.to_wire()));
        Ok(())
    }
}

/// Put a group in a membership slot, or clear it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetGroupAddr {
    /// Slot number, 1..=16; zero-based on the wire
    pub group_index: u8,
    /// Group to store; `None` clears the slot
    pub group_address: Option<Address>,
}

impl SetGroupAddr {
    /// Assign slot `group_index`
    pub fn new(group_index: u8, group_address: Option<Address>) -> Result<Self> {
        check_index(group_index, "group index")?;
        Ok(Self {
            group_index,
            group_address,
        })
    }
}

impl Payload for SetGroupAddr {
    const MSG: u8 = 0x51;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let address = Address::from_wire(&params[1..4]);
        let group_address = (address != Address::NONE).then_some(address);
        Self::new(invert(params[0]).saturating_add(1), group_address)
            .map_err(|e| DeviceError::malformed(e.to_string()))
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.group_index.saturating_sub(1)));
        out.extend(self.group_address.unwrap_or(Address::NONE).to_wire());
        Ok(())
    }
}

/// Change the node label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetNodeLabel {
    /// New label; truncated to `width`
    pub label: String,
    /// 16 for first-generation motors, 32 for ILT2
    pub width: usize,
}

impl SetNodeLabel {
    /// Label width of first-generation motors
    pub const WIDTH: usize = 16;
    /// Label width of ILT2 motors
    pub const ILT2_WIDTH: usize = 32;

    /// A label sized for the motor family
    pub fn new(label: impl Into<String>, ilt2: bool) -> Self {
        Self {
            label: label.into(),
            width: if ilt2 { Self::ILT2_WIDTH } else { Self::WIDTH },
        }
    }
}

impl Payload for SetNodeLabel {
    const MSG: u8 = 0x55;
    const PARAMS_LENGTH: Option<usize> = None;

    fn decode_exact(params: &[u8]) -> Result<Self> {
        if params.len() != Self::WIDTH && params.len() != Self::ILT2_WIDTH {
            return Err(DeviceError::malformed(format!(
                "label must be {} or {} bytes, got {}",
                Self::WIDTH,
                Self::ILT2_WIDTH,
                params.len()
            )));
        }
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
