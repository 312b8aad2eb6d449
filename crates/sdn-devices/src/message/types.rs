/*!
 * Enumerated parameter values.
 */
use std::fmt;

use sdn_core::types::Value;

use crate::error::{DeviceError, Result};

/// Declares a fieldless enum carried as a single byte on the wire, with its
/// textual name as used on the attribute bus.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every value, in wire order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Look up a decoded wire value
            pub fn from_wire(value: u32) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// The decoded wire value
            pub fn to_wire(self) -> u8 {
                match self {
                    $($name::$variant => $value),+
                }
            }

            /// Name used in logs and published attributes
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DeviceError;

            fn from_str(s: &str) -> Result<Self> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| DeviceError::invalid_value(
                        format!("{:?} is not a valid {}", s, stringify!($name)),
                    ))
            }
        }

        impl From<$name> for Value {
            fn from(value: $name) -> Self {
                Value::Text(value.as_str().to_string())
            }
        }
    };
}

/// Decode a required enumerated parameter
pub(crate) fn required<T>(value: Option<T>, field: &str, raw: u32) -> Result<T> {
    value.ok_or_else(|| DeviceError::malformed(format!("unrecognized {} 0x{:02x}", field, raw)))
}

wire_enum! {
    /// Direction of an open-ended Move
    MoveDirection {
        /// Toward the down limit
        Down = 0 => "down",
        /// Toward the up limit
        Up = 1 => "up",
        /// Stop a running Move
        Cancel = 2 => "cancel",
    }
}

wire_enum! {
    /// Rolling speed selector
    Speed {
        /// Configured up speed
        Up = 0 => "up",
        /// Configured down speed
        Down = 1 => "down",
        /// Configured slow speed
        Slow = 2 => "slow",
    }
}

wire_enum! {
    /// Target of a MoveTo
    MoveToTarget {
        /// The down limit
        DownLimit = 0 => "down_limit",
        /// The up limit
        UpLimit = 1 => "up_limit",
        /// An intermediate position, 1-based
        Ip = 2 => "ip",
        /// Absolute position in pulses
        PositionPulses = 3 => "position_pulses",
        /// Absolute position in percent
        PositionPercent = 4 => "position_percent",
    }
}

wire_enum! {
    /// Target of a relative MoveOf
    MoveOfTarget {
        /// The next intermediate position down
        NextIp = 0 => "next_ip",
        /// The previous intermediate position up
        PreviousIp = 1 => "previous_ip",
        /// Jog down by a pulse count
        JogDownPulses = 2 => "jog_down_pulses",
        /// Jog up by a pulse count
        JogUpPulses = 3 => "jog_up_pulses",
        /// Jog down for a duration in ms
        JogDownMs = 4 => "jog_down_ms",
        /// Jog up for a duration in ms
        JogUpMs = 5 => "jog_up_ms",
    }
}

impl MoveOfTarget {
    /// Whether the target value is a duration (carried in 10 ms units)
    pub fn is_duration(self) -> bool {
        matches!(self, MoveOfTarget::JogDownMs | MoveOfTarget::JogUpMs)
    }
}

wire_enum! {
    /// What a Lock pins the motor to
    LockTarget {
        /// The current position
        Current = 0 => "current",
        /// The up limit
        UpLimit = 1 => "up_limit",
        /// The down limit
        DownLimit = 2 => "down_limit",
        /// An intermediate position
        Ip = 4 => "ip",
        /// Release the lock
        Unlock = 5 => "unlock",
        /// A position in percent
        PositionPercent = 7 => "position_percent",
    }
}

wire_enum! {
    /// Motor run state
    MotorState {
        /// Not moving
        Stopped = 0 => "stopped",
        /// Moving
        Running = 1 => "running",
        /// Stopped by an obstacle or protection
        Blocked = 2 => "blocked",
        /// Locked out by the network
        Locked = 3 => "locked",
    }
}

wire_enum! {
    /// Direction of the last movement
    MotionDirection {
        /// Moved down
        Down = 0 => "down",
        /// Moved up
        Up = 1 => "up",
    }
}

wire_enum! {
    /// Origin of the last action
    ActionSource {
        /// Motor-internal
        Internal = 0 => "internal",
        /// A network command
        Network = 1 => "network",
        /// A dry contact input
        Dct = 2 => "dct",
    }
}

wire_enum! {
    /// Why the last action ended
    ActionCause {
        /// Reached its target
        TargetReached = 0x00 => "target_reached",
        /// Stopped by an explicit command
        ExplicitCommand = 0x01 => "explicit_command",
        /// Wink finished
        Wink = 0x02 => "wink",
        /// Limits are not configured
        LimitsNotSet = 0x10 => "limits_not_set",
        /// The requested IP is not configured
        IpNotSet = 0x11 => "ip_not_set",
        /// Rotation polarity not checked
        PolarityNotChecked = 0x12 => "polarity_not_checked",
        /// Motor is in configuration mode
        InConfigurationMode = 0x13 => "in_configuration_mode",
        /// Obstacle detected
        ObstacleDetection = 0x20 => "obstacle_detection",
        /// Over-current protection tripped
        OverCurrentProtection = 0x21 => "over_current_protection",
        /// Thermal protection tripped
        ThermalProtection = 0x22 => "thermal_protection",
    }
}

wire_enum! {
    /// Rotation direction of the motor shaft
    RotationDirection {
        /// Factory rotation
        Standard = 0 => "standard",
        /// Reversed rotation
        Reversed = 1 => "reversed",
    }
}

wire_enum! {
    /// How SetMotorLimits changes a limit
    LimitAction {
        /// Remove the limit
        Delete = 0 => "delete",
        /// Use the current position
        CurrentPosition = 1 => "current_position",
        /// Use the given position in pulses
        SpecifiedPosition = 2 => "specified_position",
        /// Move the limit by a duration in ms
        JogMs = 4 => "jog_ms",
        /// Move the limit by a pulse count
        JogPulses = 5 => "jog_pulses",
    }
}

wire_enum! {
    /// Which limit SetMotorLimits changes
    LimitTarget {
        /// The down limit
        Down = 0 => "down",
        /// The up limit
        Up = 1 => "up",
    }
}

wire_enum! {
    /// How SetMotorIP changes an intermediate position
    IpAction {
        /// Remove the IP
        Delete = 0 => "delete",
        /// Use the current position
        CurrentPosition = 1 => "current_position",
        /// Use the given position in pulses
        PositionPulses = 2 => "position_pulses",
        /// Use the given position in percent
        PositionPercent = 3 => "position_percent",
        /// Spread the given number of IPs evenly between the limits
        Distribute = 4 => "distribute",
    }
}

wire_enum! {
    /// Which settings a factory reset clears
    FactoryReset {
        /// Everything
        AllSettings = 0x00 => "all_settings",
        /// Group memberships
        GroupAddresses = 0x01 => "group_addresses",
        /// Limits
        Limits = 0x11 => "limits",
        /// Rotation direction
        Rotation = 0x12 => "rotation",
        /// Rolling speeds
        RollingSpeed = 0x13 => "rolling_speed",
        /// Intermediate positions
        Ips = 0x15 => "ips",
        /// Network locks
        Locks = 0x17 => "locks",
    }
}

wire_enum! {
    /// Reasons a device gives in a Nack
    NackReason {
        /// Parameters could not be parsed
        DataError = 0x01 => "data_error",
        /// Opcode not supported
        UnknownMessage = 0x10 => "unknown_message",
        /// Node is locked
        NodeIsLocked = 0x20 => "node_is_locked",
        /// Position is not reachable
        WrongPosition = 0x21 => "wrong_position",
        /// Limits are not configured
        LimitsNotSet = 0x22 => "limits_not_set",
        /// The IP is not configured
        IpNotSet = 0x23 => "ip_not_set",
        /// A value is out of range
        OutOfRange = 0x24 => "out_of_range",
        /// Node is busy
        Busy = 0xff => "busy",
    }
}

wire_enum! {
    /// What an ILT2 SetLockStatus pins the motor to
    Ilt2LockTarget {
        /// The current position
        Current = 0 => "current",
        /// The up limit
        UpLimit = 1 => "up_limit",
        /// The down limit
        DownLimit = 2 => "down_limit",
        /// An intermediate position
        Ip = 4 => "ip",
        /// Release the lock
        Unlock = 5 => "unlock",
    }
}

wire_enum! {
    /// Target of an ILT2 SetMotorPosition
    Ilt2PositionTarget {
        /// The up limit
        UpLimit = 1 => "up_limit",
        /// The down limit
        DownLimit = 2 => "down_limit",
        /// Stop moving
        Stop = 3 => "stop",
        /// An intermediate position, 1-based
        Ip = 4 => "ip",
        /// The next IP going up
        NextIpUp = 5 => "next_ip_up",
        /// The next IP going down
        NextIpDown = 6 => "next_ip_down",
        /// Absolute position in pulses
        PositionPulses = 8 => "position_pulses",
        /// Jog up for a duration in ms
        JogUpMs = 10 => "jog_up_ms",
        /// Jog down for a duration in ms
        JogDownMs = 11 => "jog_down_ms",
        /// Jog up by a pulse count
        JogUpPulses = 12 => "jog_up_pulses",
        /// Jog down by a pulse count
        JogDownPulses = 13 => "jog_down_pulses",
        /// Absolute position in percent
        PositionPercent = 16 => "position_percent",
    }
}

/// A Nack reason code, kept raw when unrecognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NackCode {
    /// A documented reason
    Known(NackReason),
    /// Anything else the device sent
    Other(u8),
}

impl NackCode {
    /// Classify a raw code
    pub fn from_wire(code: u8) -> Self {
        NackReason::from_wire(u32::from(code)).map_or(NackCode::Other(code), NackCode::Known)
    }

    /// The raw code
    pub fn to_wire(self) -> u8 {
        match self {
            NackCode::Known(reason) => reason.to_wire(),
            NackCode::Other(code) => code,
        }
    }
}

impl fmt::Display for NackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NackCode::Known(reason) => write!(f, "{}", reason),
            NackCode::Other(code) => write!(f, "0x{:02x}", code),
        }
    }
}

/// Device model reported in every frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeType {
    /// Sonesse 50 ILT2, the second-generation family
    St50Ilt2,
    /// Sonesse 30
    St30,
    /// Glydea drapery motor
    Glydea,
    /// Sonesse 50 AC
    St50Ac,
    /// Sonesse 50 DC
    St50Dc,
    /// LT50
    Lt50,
    /// Any other model code
    Other(u8),
    /// Unspecified, as sent by the bridge
    #[default]
    Unspecified,
}

impl NodeType {
    /// Classify a decoded node-type byte
    pub fn from_wire(code: u8) -> Self {
        match code {
            0x00 => NodeType::Unspecified,
            0x01 => NodeType::St50Ilt2,
            0x02 => NodeType::St30,
            0x06 => NodeType::Glydea,
            0x07 => NodeType::St50Ac,
            0x08 => NodeType::St50Dc,
            0x70 => NodeType::Lt50,
            other => NodeType::Other(other),
        }
    }

    /// The decoded node-type byte
    pub fn to_wire(self) -> u8 {
        match self {
            NodeType::Unspecified => 0x00,
            NodeType::St50Ilt2 => 0x01,
            NodeType::St30 => 0x02,
            NodeType::Glydea => 0x06,
            NodeType::St50Ac => 0x07,
            NodeType::St50Dc => 0x08,
            NodeType::Lt50 => 0x70,
            NodeType::Other(code) => code,
        }
    }

    /// Whether the node speaks the second-generation message family
    pub fn is_ilt2(self) -> bool {
        self == NodeType::St50Ilt2
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::St50Ilt2 => f.write_str("st50ilt2"),
            NodeType::St30 => f.write_str("st30"),
            NodeType::Glydea => f.write_str("glydea"),
            NodeType::St50Ac => f.write_str("st50ac"),
            NodeType::St50Dc => f.write_str("st50dc"),
            NodeType::Lt50 => f.write_str("lt50"),
            NodeType::Other(code) => write!(f, "{:02x}h", code),
            NodeType::Unspecified => f.write_str("00h"),
        }
    }
}

impl From<NodeType> for Value {
    fn from(value: NodeType) -> Self {
        Value::Text(value.to_string())
    }
}
