//! First-generation motion commands.

use super::types::{required, LockTarget, MoveDirection, MoveOfTarget, MoveToTarget, Speed};
use super::Payload;
use crate::codec::{encode_nillable, encode_number, invert, nillable, number};
use crate::error::{DeviceError, Result};

/// Open-ended movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    /// Direction
    pub direction: MoveDirection,
    /// Seconds to run; `None` runs to the limit
    pub duration: Option<u8>,
    /// Speed selector
    pub speed: Speed,
}

impl Move {
    /// A timed or untimed move. Timed moves must last 10..=255 s.
    pub fn new(direction: MoveDirection, duration: Option<u8>, speed: Speed) -> Result<Self> {
        if matches!(duration, Some(d) if d < 10) {
            return Err(DeviceError::invalid_value("move duration must be at least 10"));
        }
        Ok(Self {
            direction,
            duration,
            speed,
        })
    }
}

impl Payload for Move {
    const MSG: u8 = 0x01;
    const PARAMS_LENGTH: Option<usize> = Some(3);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let direction = number(&params[0..1]);
        let speed = number(&params[2..3]);
        Ok(Self {
            direction: required(MoveDirection::from_wire(direction), "direction", direction)?,
            duration: match number(&params[1..2]) {
                0 => None,
                d => Some(d as u8),
            },
            speed: required(Speed::from_wire(speed), "speed", speed)?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.direction.to_wire()));
        out.push(invert(self.duration.unwrap_or(0)));
        out.push(invert(self.speed.to_wire()));
        Ok(())
    }
}

/// Stop immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stop;

impl Payload for Stop {
    const MSG: u8 = 0x02;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(_params: &[u8]) -> Result<Self> {
        Ok(Stop)
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(0));
        Ok(())
    }
}

/// Move to an absolute target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTo {
    /// What `target` means
    pub target_type: MoveToTarget,
    /// Position, IP number or percent; unused for limits
    pub target: Option<u16>,
    /// Speed selector
    pub speed: Speed,
}

impl MoveTo {
    /// Move to a limit
    pub fn limit(up: bool) -> Self {
        Self {
            target_type: if up {
                MoveToTarget::UpLimit
            } else {
                MoveToTarget::DownLimit
            },
            target: None,
            speed: Speed::Up,
        }
    }

    /// Move to a target of the given type
    pub fn new(target_type: MoveToTarget, target: u16) -> Self {
        Self {
            target_type,
            target: Some(target),
            speed: Speed::Up,
        }
    }
}

impl Payload for MoveTo {
    const MSG: u8 = 0x03;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let target_type = number(&params[0..1]);
        let speed = number(&params[3..4]);
        Ok(Self {
            target_type: required(MoveToTarget::from_wire(target_type), "target type", target_type)?,
            target: nillable(&params[1..3]).map(|t| t as u16),
            speed: required(Speed::from_wire(speed), "speed", speed)?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.target_type.to_wire()));
        out.extend(encode_nillable(self.target.map(u32::from), 2)?);
        out.push(invert(self.speed.to_wire()));
        Ok(())
    }
}

/// Move relative to the current position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOf {
    /// What `target` means
    pub target_type: MoveOfTarget,
    /// Pulses or milliseconds; durations travel in 10 ms units
    pub target: Option<u32>,
}

impl Payload for MoveOf {
    const MSG: u8 = 0x04;
    const PARAMS_LENGTH: Option<usize> = Some(4);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let raw = number(&params[0..1]);
        let target_type = required(MoveOfTarget::from_wire(raw), "target type", raw)?;
        let target = nillable(&params[1..3]).map(|t| if target_type.is_duration() { t * 10 } else { t });
        Ok(Self {
            target_type,
            target,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let target = self.target.map(|t| {
            if self.target_type.is_duration() {
                t / 10
            } else {
                t
            }
        });
        out.push(invert(self.target_type.to_wire()));
        out.extend(encode_nillable(target, 2)?);
        out.push(invert(0));
        Ok(())
    }
}

empty_message! {
    /// Make the motor jog briefly so it can be identified
    Wink = 0x05
}

/// Lock the motor against other controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    /// What to lock to
    pub target_type: LockTarget,
    /// Position, IP number or percent where the target type needs one
    pub target: Option<u16>,
    /// Lock priority
    pub priority: u8,
}

impl Payload for Lock {
    const MSG: u8 = 0x06;
    const PARAMS_LENGTH: Option<usize> = Some(5);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        let target_type = number(&params[0..1]);
        Ok(Self {
            target_type: required(LockTarget::from_wire(target_type), "lock target", target_type)?,
            target: nillable(&params[1..3]).map(|t| t as u16),
            priority: invert(params[3]),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.target_type.to_wire()));
        out.extend(encode_nillable(self.target.map(u32::from), 2)?);
        out.push(invert(self.priority));
        out.push(invert(0));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<P: Payload + std::fmt::Debug + PartialEq>(payload: P) -> Result<()> {
        let mut out = Vec::new();
        payload.encode(&mut out)?;
        assert_eq!(Some(out.len()), P::PARAMS_LENGTH);
        assert_eq!(P::decode(&out)?, payload);
        Ok(())
    }

    #[test]
    fn test_round_trips() -> Result<()> {
        round_trip(Move::new(MoveDirection::Up, None, Speed::Slow)?)?;
        round_trip(Move::new(MoveDirection::Down, Some(30), Speed::Down)?)?;
        round_trip(Stop)?;
        round_trip(MoveTo::limit(true))?;
        round_trip(MoveTo::new(MoveToTarget::PositionPercent, 75))?;
        round_trip(MoveOf {
            target_type: MoveOfTarget::JogUpMs,
            target: Some(1_500),
        })?;
        round_trip(MoveOf {
            target_type: MoveOfTarget::NextIp,
            target: None,
        })?;
        round_trip(Lock {
            target_type: LockTarget::Ip,
            target: Some(3),
            priority: 20,
        })?;
        Ok(())
    }

    #[test]
    fn test_move_duration_bounds() {
        assert!(Move::new(MoveDirection::Up, Some(9), Speed::Up).is_err());
        assert!(Move::new(MoveDirection::Up, Some(10), Speed::Up).is_ok());
    }

    #[test]
    fn test_speed_is_third_parameter() -> Result<()> {
        let decoded = Move::decode(&[invert(1), invert(0), invert(2)])?;
        assert_eq!(decoded.speed, Speed::Slow);
        assert_eq!(decoded.duration, None);
        Ok(())
    }

    #[test]
    fn test_jog_duration_wire_units() -> Result<()> {
        let mut out = Vec::new();
        MoveOf {
            target_type: MoveOfTarget::JogDownMs,
            target: Some(250),
        }
        .encode(&mut out)?;
        assert_eq!(number(&out[1..3]), 25);
        Ok(())
    }

    #[test]
    fn test_jog_beyond_field_is_rejected() {
        let too_far = MoveOf {
            target_type: MoveOfTarget::JogDownPulses,
            target: Some(70_000),
        };
        assert!(matches!(too_far.encode(&mut Vec::new()), Err(DeviceError::InvalidValue(_))));

        let sentinel = MoveOf {
            target_type: MoveOfTarget::JogDownPulses,
            target: Some(0xffff),
        };
        let message = crate::message::Message::new(crate::Address::new([1, 2, 3]), sentinel);
        assert!(matches!(message.encode(), Err(DeviceError::InvalidValue(_))));

        let longest = MoveOf {
            target_type: MoveOfTarget::JogUpMs,
            target: Some(655_340),
        };
        assert!(round_trip(longest).is_ok());
    }

    #[test]
    fn test_unknown_direction_is_malformed() {
        assert!(matches!(
            Move::decode(&[invert(7), invert(0), invert(0)]),
            Err(DeviceError::Malformed(_))
        ));
    }
}
