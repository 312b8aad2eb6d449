/*!
 * Second-generation (ILT2) messages.
 *
 * ILT2 motors keep the frame format but answer a different set of opcodes.
 * On the wire their IP numbers are zero-based and percentages are scaled to
 * 0..=255; the types here expose 1-based IPs and 0..=100 percentages like
 * the first-generation messages do. Labels use the shared 0x55/0x65 opcodes
 * with a 32 byte field.
 */
use super::query::check_index;
use super::types::{required, Ilt2LockTarget, Ilt2PositionTarget};
use super::Payload;
use crate::codec::{encode_nillable, encode_number, invert, nillable, number};
use crate::error::{DeviceError, Result};

/// Scale a 0..=100 percentage to the 0..=255 wire range
pub fn percent_to_wire(percent: u16) -> u32 {
    u32::from(percent.min(100)) * 255 / 100
}

/// Scale a 0..=255 wire value to a rounded percentage
pub fn percent_from_wire(raw: u32) -> u16 {
    ((raw.min(255) * 100 + 127) / 255) as u16
}

fn ip_from_wire(raw: u8) -> Result<u8> {
    let ip = raw.saturating_add(1);
    check_index(ip, "ip").map_err(|e| DeviceError::malformed(e.to_string()))?;
    Ok(ip)
}

empty_message! {
    /// Ask for the down limit
    GetMotorSettings = 0x42
}

empty_message! {
    /// Ask for the current position
    GetMotorPosition = 0x44
}

empty_message! {
    /// Ask for the infrared channel configuration
    GetIRConfig = 0x49
}

empty_message! {
    /// Ask for the lock status
    GetLockStatus = 0x4b
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
    const MSG: u8 = 0x43;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            ip: ip_from_wire(invert(params[0]))?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.ip.saturating_sub(1)));
        Ok(())
    }
}

/// Down limit, the only setting ILT2 motors report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostMotorSettings {
    /// Down limit in pulses
    pub limit: u16,
}

impl Payload for PostMotorSettings {
    const MSG: u8 = 0x62;
    const PARAMS_LENGTH: Option<usize> = Some(3);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            limit: number(&params[1..3]) as u16,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(0));
        out.extend(encode_number(u32::from(self.limit), 2)?);
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
}

impl Payload for PostMotorIP {
    const MSG: u8 = 0x63;
    const PARAMS_LENGTH: Option<usize> = Some(3);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            ip: ip_from_wire(invert(params[0]))?,
            position_pulses: nillable(&params[1..3]).map(|v| v as u16),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.ip.saturating_sub(1)));
        out.extend(encode_nillable(self.position_pulses.map(u32::from), 2)?);
        Ok(())
    }
}

/// Current position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostMotorPosition {
    /// Position in pulses
    pub position_pulses: u16,
    /// Position in percent, rounded from the 0..=255 wire value
    pub position_percent: u8,
}

impl Payload for PostMotorPosition {
    const MSG: u8 = 0x64;
    const PARAMS_LENGTH: Option<usize> = Some(3);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            position_pulses: number(&params[0..2]) as u16,
            position_percent: percent_from_wire(number(&params[2..3])) as u8,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend(encode_number(u32::from(self.position_pulses), 2)?);
        out.extend(encode_number(percent_to_wire(self.position_percent.into()), 1)?);
        Ok(())
    }
}

/// Infrared channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostIRConfig {
    /// Channel bitmap
    pub channels: u8,
}

impl Payload for PostIRConfig {
    const MSG: u8 = 0x69;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            channels: invert(params[0]),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.channels));
        Ok(())
    }
}

/// Lock status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostLockStatus {
    /// Priority of the active lock, 0 when unlocked
    pub priority: u8,
}

impl Payload for PostLockStatus {
    const MSG: u8 = 0x6b;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            priority: invert(params[0]),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.priority));
        Ok(())
    }
}

/// Change the infrared channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetIRConfig {
    /// Channel bitmap
    pub channels: u8,
}

impl Payload for SetIRConfig {
    const MSG: u8 = 0x59;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            channels: invert(params[0]),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.channels));
        Ok(())
    }
}

/// Lock or unlock the motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLockStatus {
    /// What to lock to
    pub target_type: Ilt2LockTarget,
    /// IP number or other target value
    pub target: u8,
    /// Lock priority, 1..=100
    pub priority: u8,
}

impl SetLockStatus {
    /// A lock request with a validated priority
    pub fn new(target_type: Ilt2LockTarget, target: u8, priority: u8) -> Result<Self> {
        if !(1..=100).contains(&priority) {
            return Err(DeviceError::invalid_value(format!(
                "lock priority {} is outside 1..=100",
                priority
            )));
        }
        Ok(Self {
            target_type,
            target,
            priority,
        })
    }
}

impl Payload for SetLockStatus {
    const MSG: u8 = 0x5b;
    const PARAMS_LENGTH: Option<usize> = Some(3);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let target_type = number(&params[0..1]);
        Ok(Self {
            target_type: required(Ilt2LockTarget::from_wire(target_type), "lock target", target_type)?,
            target: invert(params[1]),
            priority: invert(params[2]),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.target_type.to_wire()));
        out.push(invert(self.target));
        out.push(invert(self.priority));
        Ok(())
    }
}

/// Change an intermediate position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMotorIP {
    /// IP number, 1..=16
    pub ip: u8,
    /// Position in pulses; `None` deletes the IP
    pub value: Option<u16>,
}

impl Payload for SetMotorIP {
    const MSG: u8 = 0x53;
    const PARAMS_LENGTH: Option<usize> = Some(3);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            ip: ip_from_wire(invert(params[0]))?,
            value: nillable(&params[1..3]).map(|v| v as u16),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.ip.saturating_sub(1)));
        out.extend(encode_nillable(self.value.map(u32::from), 2)?);
        Ok(())
    }
}

/// Move, or stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMotorPosition {
    /// What `target` means
    pub target_type: Ilt2PositionTarget,
    /// Pulses, ms, percent (0..=100) or 1-based IP, depending on the type
    pub target: u16,
}

impl SetMotorPosition {
    /// A move with no target value (limits, stop, next IP)
    pub fn to(target_type: Ilt2PositionTarget) -> Self {
        Self {
            target_type,
            target: 0,
        }
    }

    /// A move with a target value
    pub fn new(target_type: Ilt2PositionTarget, target: u16) -> Self {
        Self {
            target_type,
            target,
        }
    }
}

impl Payload for SetMotorPosition {
    const MSG: u8 = 0x54;
    const PARAMS_LENGTH: Option<usize> = Some(3);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let raw_type = number(&params[0..1]);
        let target_type = required(Ilt2PositionTarget::from_wire(raw_type), "target type", raw_type)?;
        let raw = number(&params[1..3]);
        let target = match target_type {
            Ilt2PositionTarget::PositionPercent => percent_from_wire(raw),
            Ilt2PositionTarget::Ip => (raw as u16).saturating_add(1),
            _ => raw as u16,
        };
        Ok(Self {
            target_type,
            target,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let raw = match self.target_type {
            Ilt2PositionTarget::PositionPercent => percent_to_wire(self.target),
            Ilt2PositionTarget::Ip => u32::from(self.target.saturating_sub(1)),
            _ => u32::from(self.target),
        };
        out.push(invert(self.target_type.to_wire()));
        out.extend(encode_number(raw, 2)?);
        Ok(())
    }
}

/// Write motor settings directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMotorSettings {
    /// Settings flags
    pub flags: u8,
    /// Down limit in pulses
    pub down_limit: u16,
    /// Current position in pulses
    pub position_pulses: u16,
}

impl Payload for SetMotorSettings {
    const MSG: u8 = 0x52;
    const PARAMS_LENGTH: Option<usize> = Some(5);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Self {
            flags: invert(params[0]),
            down_limit: number(&params[1..3]) as u16,
            position_pulses: number(&params[3..5]) as u16,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.flags));
        out.extend(encode_number(u32::from(self.down_limit), 2)?);
        out.extend(encode_number(u32::from(self.position_pulses), 2)?);
        Ok(())
    }
}
