/*!
 * The SDN message model.
 *
 * A frame on the wire is
 * `[opcode][length|ack][node type][src 3][dest 3][params][checksum 2]`
 * where everything but the checksum is complemented (see [`crate::codec`]).
 * Each opcode has one payload type implementing [`Payload`]; [`Body`] is the
 * closed union of all of them, and [`Message`] adds the common header.
 *
 * Two motor generations share the bus. Second-generation (ILT2) payloads
 * live in [`ilt2`] and are distinct kinds even where they mirror a
 * first-generation message, because their parameter encodings differ.
 */
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::address::Address;
use crate::codec::{checksum, invert};
use crate::error::{DeviceError, Result};

/// A parameterless message
macro_rules! empty_message {
    ($(#[$meta:meta])* $name:ident = $msg:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl $crate::message::Payload for $name {
            const MSG: u8 = $msg;
            const PARAMS_LENGTH: Option<usize> = Some(0);

            fn decode_exact(_params: &[u8]) -> $crate::error::Result<Self> {
                Ok($name)
            }

            fn encode(&self, _out: &mut Vec<u8>) -> $crate::error::Result<()> {
                Ok(())
            }
        }
    };
}

pub mod ilt2;
mod motion;
mod query;
mod report;
mod settings;
mod types;

pub use motion::{Lock, Move, MoveOf, MoveTo, Stop, Wink};
pub use query::{
    GetGroupAddr, GetMotorDirection, GetMotorIP, GetMotorLimits, GetMotorPosition,
    GetMotorRollingSpeed, GetMotorStatus, GetNetworkLock, GetNodeAddr, GetNodeAppVersion,
    GetNodeLabel, GetNodeSerialNumber, GetNodeStackVersion,
};
pub use report::{
    NodeVersion, PostGroupAddr, PostMotorDirection, PostMotorIP, PostMotorLimits,
    PostMotorPosition, PostMotorRollingSpeed, PostMotorStatus, PostNetworkLock, PostNodeAddr,
    PostNodeAppVersion, PostNodeLabel, PostNodeSerialNumber, PostNodeStackVersion,
};
pub use settings::{
    SetFactoryDefault, SetGroupAddr, SetMotorDirection, SetMotorIP, SetMotorLimits,
    SetMotorRollingSpeed, SetNetworkLock, SetNodeLabel,
};
pub use types::*;

/// Shortest possible frame: header, addresses and checksum
pub const MIN_FRAME_LENGTH: usize = 11;
/// Longest frame the length byte may announce
pub const MAX_FRAME_LENGTH: usize = 43;

/// Opcode-specific parameters of one message kind
pub trait Payload: Sized {
    /// Opcode
    const MSG: u8;
    /// Exact parameter length, or `None` when it varies
    const PARAMS_LENGTH: Option<usize>;

    /// Decode the (still complemented) parameter bytes, rejecting a block
    /// whose length differs from [`Payload::PARAMS_LENGTH`]
    fn decode(params: &[u8]) -> Result<Self> {
        if let Some(expected) = Self::PARAMS_LENGTH {
            if params.len() != expected {
                return Err(DeviceError::malformed(format!(
                    "{} expects {} parameter bytes, got {}",
                    std::any::type_name::<Self>().rsplit("::").next().unwrap_or("message"),
                    expected,
                    params.len()
                )));
            }
        }
        Self::decode_exact(params)
    }

    /// Decode parameter bytes already known to have the declared length
    fn decode_exact(params: &[u8]) -> Result<Self>;

    /// Append the wire form of the parameters. Fails on values that do
    /// not fit their field.
    fn encode(&self, out: &mut Vec<u8>) -> Result<()>;
}

/// Acknowledges a command sent with the ack flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack;

impl Payload for Ack {
    const MSG: u8 = 0x7f;
    const PARAMS_LENGTH: Option<usize> = Some(0);

    fn decode_exact(_params: &[u8]) -> Result<Self> {
        Ok(Ack)
    }

    fn encode(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

/// Rejects a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nack {
    /// Why the command was rejected
    pub error_code: NackCode,
}

impl Payload for Nack {
    const MSG: u8 = 0x6f;
    const PARAMS_LENGTH: Option<usize> = Some(1);

    fn decode_exact(params: &[u8]) -> Result<Self> {
        Ok(Nack {
            error_code: NackCode::from_wire(invert(params[0])),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(invert(self.error_code.to_wire()));
        Ok(())
    }
}

/// A frame with an opcode this crate does not know. It can be logged and
/// inspected but is never written back to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessage {
    /// Decoded opcode
    pub msg: u8,
    /// Raw parameter bytes as received
    pub params: Vec<u8>,
}

/// The 5-byte master control frame some remotes simulcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterControl {
    /// All up
    Up,
    /// All down
    Down,
    /// All stop
    Stop,
}

impl MasterControl {
    /// Total frame length
    pub const FRAME_LENGTH: usize = 5;
    const PREFIX: [u8; 2] = [0xfa, 0x7a];

    /// Recognize a master control frame at the start of `data`
    pub fn parse(data: &[u8]) -> Option<Self> {
        let frame = data.get(..Self::FRAME_LENGTH)?;
        if frame[..2] != Self::PREFIX || checksum(&frame[..3]) != frame[3..5] {
            return None;
        }
        match frame[2] {
            0xfa => Some(MasterControl::Up),
            0xff => Some(MasterControl::Stop),
            0x00 => Some(MasterControl::Down),
            _ => None,
        }
    }

    /// The complete frame
    pub fn encode(self) -> Vec<u8> {
        let code = match self {
            MasterControl::Up => 0xfa,
            MasterControl::Stop => 0xff,
            MasterControl::Down => 0x00,
        };
        let mut frame = vec![Self::PREFIX[0], Self::PREFIX[1], code];
        let sum = checksum(&frame);
        frame.extend_from_slice(&sum);
        frame
    }
}

struct Registration {
    kind: Kind,
    decode: fn(&[u8]) -> Result<Body>,
}

/// Declares every registered message kind: generates [`Body`], [`Kind`],
/// `From<Payload> for Body` and the opcode registry.
macro_rules! messages {
    ($($(#[$meta:meta])* $variant:ident($ty:ty),)+) => {
        /// Decoded parameters, one variant per message kind
        #[derive(Debug, Clone, PartialEq)]
        pub enum Body {
            $($(#[$meta])* $variant($ty),)+
            /// Master control micro-frame
            MasterControl(MasterControl),
            /// Unregistered opcode
            Unknown(UnknownMessage),
        }

        /// The kind of a message, without its parameters
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Kind {
            $($(#[$meta])* $variant,)+
            /// Master control micro-frame
            MasterControl,
            /// Unregistered opcode
            Unknown,
        }

        impl Body {
            /// The kind of this body
            pub fn kind(&self) -> Kind {
                match self {
                    $(Body::$variant(_) => Kind::$variant,)+
                    Body::MasterControl(_) => Kind::MasterControl,
                    Body::Unknown(_) => Kind::Unknown,
                }
            }

            /// The opcode, if the body is carried in a regular frame
            pub fn opcode(&self) -> Option<u8> {
                match self {
                    $(Body::$variant(_) => Some(<$ty as Payload>::MSG),)+
                    Body::MasterControl(_) => None,
                    Body::Unknown(unknown) => Some(unknown.msg),
                }
            }

            fn encode_params(&self, out: &mut Vec<u8>) -> Result<()> {
                match self {
                    $(Body::$variant(payload) => payload.encode(out),)+
                    Body::MasterControl(_) => Err(DeviceError::NotSerializable(
                        "master control frames have no parameters".to_string(),
                    )),
                    Body::Unknown(unknown) => Err(DeviceError::NotSerializable(
                        format!("unknown opcode 0x{:02x}", unknown.msg),
                    )),
                }
            }

            fn payload(&self) -> &dyn fmt::Debug {
                match self {
                    $(Body::$variant(payload) => payload,)+
                    Body::MasterControl(control) => control,
                    Body::Unknown(unknown) => unknown,
                }
            }
        }

        $(
            impl From<$ty> for Body {
                fn from(payload: $ty) -> Self {
                    Body::$variant(payload)
                }
            }
        )+

        fn registry() -> &'static HashMap<u8, Registration> {
            static REGISTRY: OnceLock<HashMap<u8, Registration>> = OnceLock::new();
            REGISTRY.get_or_init(|| {
                let mut map = HashMap::new();
                $(
                    map.insert(<$ty as Payload>::MSG, Registration {
                        kind: Kind::$variant,
                        decode: |params| <$ty as Payload>::decode(params).map(Body::$variant),
                    });
                )+
                map
            })
        }
    };
}

messages! {
    // Motion
    /// 0x01
    Move(Move),
    /// 0x02
    Stop(Stop),
    /// 0x03
    MoveTo(MoveTo),
    /// 0x04
    MoveOf(MoveOf),
    /// 0x05
    Wink(Wink),
    /// 0x06
    Lock(Lock),

    // Queries
    /// 0x0c
    GetMotorPosition(GetMotorPosition),
    /// 0x0e
    GetMotorStatus(GetMotorStatus),
    /// 0x21
    GetMotorLimits(GetMotorLimits),
    /// 0x22
    GetMotorDirection(GetMotorDirection),
    /// 0x23
    GetMotorRollingSpeed(GetMotorRollingSpeed),
    /// 0x25
    GetMotorIP(GetMotorIP),
    /// 0x26
    GetNetworkLock(GetNetworkLock),
    /// 0x40
    GetNodeAddr(GetNodeAddr),
    /// 0x41
    GetGroupAddr(GetGroupAddr),
    /// 0x45
    GetNodeLabel(GetNodeLabel),
    /// 0x4c
    GetNodeSerialNumber(GetNodeSerialNumber),
    /// 0x70
    GetNodeStackVersion(GetNodeStackVersion),
    /// 0x74
    GetNodeAppVersion(GetNodeAppVersion),

    // Reports
    /// 0x0d
    PostMotorPosition(PostMotorPosition),
    /// 0x0f
    PostMotorStatus(PostMotorStatus),
    /// 0x31
    PostMotorLimits(PostMotorLimits),
    /// 0x32
    PostMotorDirection(PostMotorDirection),
    /// 0x33
    PostMotorRollingSpeed(PostMotorRollingSpeed),
    /// 0x35
    PostMotorIP(PostMotorIP),
    /// 0x36
    PostNetworkLock(PostNetworkLock),
    /// 0x60
    PostNodeAddr(PostNodeAddr),
    /// 0x61
    PostGroupAddr(PostGroupAddr),
    /// 0x65
    PostNodeLabel(PostNodeLabel),
    /// 0x6c
    PostNodeSerialNumber(PostNodeSerialNumber),
    /// 0x71
    PostNodeStackVersion(PostNodeStackVersion),
    /// 0x75
    PostNodeAppVersion(PostNodeAppVersion),

    // Settings
    /// 0x11
    SetMotorLimits(SetMotorLimits),
    /// 0x12
    SetMotorDirection(SetMotorDirection),
    /// 0x13
    SetMotorRollingSpeed(SetMotorRollingSpeed),
    /// 0x15
    SetMotorIP(SetMotorIP),
    /// 0x16
    SetNetworkLock(SetNetworkLock),
    /// 0x1f
    SetFactoryDefault(SetFactoryDefault),
    /// 0x51
    SetGroupAddr(SetGroupAddr),
    /// 0x55
    SetNodeLabel(SetNodeLabel),

    // Acknowledgement
    /// 0x7f
    Ack(Ack),
    /// 0x6f
    Nack(Nack),

    // Second generation
    /// 0x42
    Ilt2GetMotorSettings(ilt2::GetMotorSettings),
    /// 0x43
    Ilt2GetMotorIP(ilt2::GetMotorIP),
    /// 0x44
    Ilt2GetMotorPosition(ilt2::GetMotorPosition),
    /// 0x49
    Ilt2GetIRConfig(ilt2::GetIRConfig),
    /// 0x4b
    Ilt2GetLockStatus(ilt2::GetLockStatus),
    /// 0x62
    Ilt2PostMotorSettings(ilt2::PostMotorSettings),
    /// 0x63
    Ilt2PostMotorIP(ilt2::PostMotorIP),
    /// 0x64
    Ilt2PostMotorPosition(ilt2::PostMotorPosition),
    /// 0x69
    Ilt2PostIRConfig(ilt2::PostIRConfig),
    /// 0x6b
    Ilt2PostLockStatus(ilt2::PostLockStatus),
    /// 0x52
    Ilt2SetMotorSettings(ilt2::SetMotorSettings),
    /// 0x53
    Ilt2SetMotorIP(ilt2::SetMotorIP),
    /// 0x54
    Ilt2SetMotorPosition(ilt2::SetMotorPosition),
    /// 0x59
    Ilt2SetIRConfig(ilt2::SetIRConfig),
    /// 0x5b
    Ilt2SetLockStatus(ilt2::SetLockStatus),
}

impl Body {
    /// Decode the parameters of a frame with the given opcode
    pub fn decode(msg: u8, params: &[u8]) -> Result<Body> {
        match registry().get(&msg) {
            Some(registration) => (registration.decode)(params),
            None => Ok(Body::Unknown(UnknownMessage {
                msg,
                params: params.to_vec(),
            })),
        }
    }
}

impl From<MasterControl> for Body {
    fn from(control: MasterControl) -> Self {
        Body::MasterControl(control)
    }
}

impl Kind {
    /// The kind registered for an opcode
    pub fn from_opcode(msg: u8) -> Option<Kind> {
        registry().get(&msg).map(|registration| registration.kind)
    }

    /// The report a query is answered with; `None` for everything that is
    /// answered with Ack or Nack instead
    pub fn expected_response(self) -> Option<Kind> {
        let response = match self {
            Kind::GetMotorPosition => Kind::PostMotorPosition,
            Kind::GetMotorStatus => Kind::PostMotorStatus,
            Kind::GetMotorLimits => Kind::PostMotorLimits,
            Kind::GetMotorDirection => Kind::PostMotorDirection,
            Kind::GetMotorRollingSpeed => Kind::PostMotorRollingSpeed,
            Kind::GetMotorIP => Kind::PostMotorIP,
            Kind::GetNetworkLock => Kind::PostNetworkLock,
            Kind::GetNodeAddr => Kind::PostNodeAddr,
            Kind::GetGroupAddr => Kind::PostGroupAddr,
            Kind::GetNodeLabel => Kind::PostNodeLabel,
            Kind::GetNodeSerialNumber => Kind::PostNodeSerialNumber,
            Kind::GetNodeStackVersion => Kind::PostNodeStackVersion,
            Kind::GetNodeAppVersion => Kind::PostNodeAppVersion,
            Kind::Ilt2GetMotorSettings => Kind::Ilt2PostMotorSettings,
            Kind::Ilt2GetMotorIP => Kind::Ilt2PostMotorIP,
            Kind::Ilt2GetMotorPosition => Kind::Ilt2PostMotorPosition,
            Kind::Ilt2GetIRConfig => Kind::Ilt2PostIRConfig,
            Kind::Ilt2GetLockStatus => Kind::Ilt2PostLockStatus,
            _ => return None,
        };
        Some(response)
    }

    /// Whether this kind is a query
    pub fn is_request(self) -> bool {
        self.expected_response().is_some()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One SDN message: header fields plus a typed body
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Model of the sending node; unspecified for frames from the bridge
    pub node_type: NodeType,
    /// Whether the sender wants an Ack
    pub ack_requested: bool,
    /// Source address
    pub src: Address,
    /// Destination address
    pub dest: Address,
    /// Parameters
    pub body: Body,
}

impl Message {
    /// A message from the bridge to `dest`.
    ///
    /// Group commands carry the group in the source field and a zero
    /// destination, so a group `dest` is moved there.
    pub fn new(dest: Address, body: impl Into<Body>) -> Self {
        let (src, dest) = if dest.is_group() {
            (dest, Address::NONE)
        } else {
            (Address::BRIDGE, dest)
        };
        Self::from_parts(NodeType::default(), false, src, dest, body)
    }

    /// A message to every node
    pub fn broadcast(body: impl Into<Body>) -> Self {
        Self::new(Address::BROADCAST, body)
    }

    /// A message with every header field given explicitly
    pub fn from_parts(
        node_type: NodeType,
        ack_requested: bool,
        src: Address,
        dest: Address,
        body: impl Into<Body>,
    ) -> Self {
        Self {
            node_type,
            ack_requested,
            src,
            dest,
            body: body.into(),
        }
    }

    /// Request an Ack
    pub fn with_ack(mut self) -> Self {
        self.ack_requested = true;
        self
    }

    /// Set the node type
    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }

    /// The message kind
    pub fn kind(&self) -> Kind {
        self.body.kind()
    }

    /// Whether this is a group command
    pub fn is_group_sourced(&self) -> bool {
        self.src.is_group()
    }

    /// The motor or group this message is about
    pub fn target(&self) -> Address {
        if self.is_group_sourced() {
            self.src
        } else {
            self.dest
        }
    }

    /// Whether the sender waits for some reply to this message
    pub fn requires_response(&self) -> bool {
        self.ack_requested || self.kind().is_request()
    }

    /// Whether `response` is the kind of reply this message asks for:
    /// the matching report for queries, Ack or Nack for everything else
    pub fn expects(&self, response: &Message) -> bool {
        match self.kind().expected_response() {
            Some(kind) => response.kind() == kind,
            None => matches!(response.kind(), Kind::Ack | Kind::Nack),
        }
    }

    /// A copy of this message sent by the bridge to `dest`
    pub fn retarget(&self, dest: Address) -> Message {
        Message {
            src: Address::BRIDGE,
            dest,
            ..self.clone()
        }
    }

    /// Serialize to a complete frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        if let Body::MasterControl(control) = &self.body {
            return Ok(control.encode());
        }
        let msg = self.body.opcode().ok_or_else(|| {
            DeviceError::NotSerializable(format!("{} has no opcode", self.kind()))
        })?;

        let mut body = Vec::with_capacity(MAX_FRAME_LENGTH);
        body.push(invert(self.node_type.to_wire()));
        body.extend(self.src.to_wire());
        body.extend(self.dest.to_wire());
        self.body.encode_params(&mut body)?;

        let length = body.len() + 4;
        if length > MAX_FRAME_LENGTH {
            return Err(DeviceError::invalid_value(format!(
                "{} frame would be {} bytes long",
                self.kind(),
                length
            )));
        }
        let mut length = length as u8;
        if self.ack_requested {
            length |= 0x80;
        }

        let mut frame = Vec::with_capacity(length as usize & 0x7f);
        frame.push(invert(msg));
        frame.push(invert(length));
        frame.extend(body);
        let sum = checksum(&frame);
        frame.extend_from_slice(&sum);
        Ok(frame)
    }

    /// Decode a frame whose length and checksum were already validated
    pub(crate) fn decode_frame(frame: &[u8]) -> Result<Message> {
        let msg = invert(frame[0]);
        let ack_requested = invert(frame[1]) & 0x80 != 0;
        let node_type = NodeType::from_wire(invert(frame[2]));
        let src = Address::from_wire(&frame[3..6]);
        let dest = Address::from_wire(&frame[6..9]);
        let body = Body::decode(msg, &frame[9..frame.len() - 2])?;
        Ok(Message::from_parts(node_type, ack_requested, src, dest, body))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        if self.node_type != NodeType::Unspecified {
            write!(f, " [{}]", self.node_type)?;
        }
        write!(f, " {} -> {}", self.src, self.dest)?;
        if self.ack_requested {
            f.write_str(" (ack)")?;
        }
        write!(f, " {:?}", self.body.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(message: &Message) -> Result<Message> {
        let frame = message.encode()?;
        assert_eq!(frame.len(), (invert(frame[1]) & 0x7f) as usize);
        let (body, sum) = frame.split_at(frame.len() - 2);
        assert_eq!(checksum(body), sum);
        Message::decode_frame(&frame)
    }

    #[test]
    fn test_get_motor_position_frame() -> Result<()> {
        let message = Message::new(Address::new([0x01, 0x02, 0x03]), GetMotorPosition);
        let frame = message.encode()?;
        assert_eq!(
            frame,
            vec![0xf3, 0xf4, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0xfd, 0xfe, 0x08, 0xd9]
        );
        assert_eq!(round_trip(&message)?, message);
        Ok(())
    }

    #[test]
    fn test_ack_flag_in_length() -> Result<()> {
        let message = Message::new(Address::new([1, 2, 3]), Wink).with_ack();
        let frame = message.encode()?;
        assert_eq!(invert(frame[1]), 0x80 | 11);
        assert!(round_trip(&message)?.ack_requested);
        Ok(())
    }

    #[test]
    fn test_group_destination_moves_to_source() {
        let message = Message::new(Address::group(4), Stop);
        assert_eq!(message.src, Address::group(4));
        assert_eq!(message.dest, Address::NONE);
        assert!(message.is_group_sourced());
        assert_eq!(message.target(), Address::group(4));

        let member = message.retarget(Address::new([9, 9, 9]));
        assert_eq!(member.src, Address::BRIDGE);
        assert_eq!(member.dest, Address::new([9, 9, 9]));
        assert_eq!(member.body, message.body);
        assert!(message.is_group_sourced());
    }

    #[test]
    fn test_response_pairing() {
        let motor = Address::new([1, 2, 3]);
        let query = Message::new(motor, GetMotorPosition);
        let report = Message::new(motor, PostMotorPosition::default());
        let ack = Message::new(motor, Ack);
        assert!(query.expects(&report));
        assert!(!query.expects(&ack));

        let command = Message::new(motor, Wink).with_ack();
        assert!(command.expects(&ack));
        assert!(command.expects(&Message::new(motor, Nack { error_code: NackCode::Other(0) })));
        assert!(!command.expects(&report));

        let ilt2_query = Message::new(motor, ilt2::GetMotorPosition);
        assert!(!ilt2_query.expects(&report));
        assert!(ilt2_query.expects(&Message::new(motor, ilt2::PostMotorPosition::default())));

        assert!(Kind::GetNodeAddr.is_request());
        assert!(!Kind::SetGroupAddr.is_request());
        assert!(query.requires_response());
        assert!(!Message::new(motor, Stop).requires_response());
    }

    #[test]
    fn test_registry_covers_every_kind_once() {
        assert_eq!(registry().len(), 57);
        assert_eq!(Kind::from_opcode(0x0d), Some(Kind::PostMotorPosition));
        assert_eq!(Kind::from_opcode(0x64), Some(Kind::Ilt2PostMotorPosition));
        assert_eq!(Kind::from_opcode(0x5c), None);
    }

    #[test]
    fn test_unknown_opcode_is_not_serializable() -> Result<()> {
        let body = Body::decode(0x5c, &[0xfe, 0xfd])?;
        assert_eq!(
            body,
            Body::Unknown(UnknownMessage {
                msg: 0x5c,
                params: vec![0xfe, 0xfd]
            })
        );
        let message = Message::new(Address::new([1, 2, 3]), body);
        assert!(matches!(message.encode(), Err(DeviceError::NotSerializable(_))));
        Ok(())
    }

    #[test]
    fn test_wrong_parameter_length_is_malformed() {
        assert!(matches!(
            Body::decode(PostMotorPosition::MSG, &[0xff; 4]),
            Err(DeviceError::Malformed(_))
        ));
        assert!(matches!(
            Body::decode(Ack::MSG, &[0xff]),
            Err(DeviceError::Malformed(_))
        ));
    }

    #[test]
    fn test_payload_decode_checks_length() {
        assert!(matches!(Nack::decode(&[]), Err(DeviceError::Malformed(_))));
        assert!(matches!(GetMotorIP::decode(&[]), Err(DeviceError::Malformed(_))));
        assert!(matches!(ilt2::GetMotorIP::decode(&[]), Err(DeviceError::Malformed(_))));
        assert!(matches!(PostMotorPosition::decode(&[0xff; 2]), Err(DeviceError::Malformed(_))));
        assert!(matches!(
            Nack::decode(&[invert(0x33)]),
            Ok(Nack {
                error_code: NackCode::Other(0x33)
            })
        ));
    }

    #[test]
    fn test_nack_round_trip() -> Result<()> {
        for code in [NackCode::Known(NackReason::OutOfRange), NackCode::Other(0x33)] {
            let message = Message::new(Address::new([1, 2, 3]), Nack { error_code: code });
            assert_eq!(round_trip(&message)?, message);
        }
        Ok(())
    }

    #[test]
    fn test_master_control() {
        for control in [MasterControl::Up, MasterControl::Down, MasterControl::Stop] {
            assert_eq!(MasterControl::parse(&control.encode()), Some(control));
        }
        assert_eq!(MasterControl::parse(&[0xfa, 0x7a, 0xfa, 0x02]), None);
        assert_eq!(MasterControl::parse(&[0xfa, 0x7a, 0xfa, 0x02, 0x6f]), None);
        assert_eq!(MasterControl::parse(&[0xfa, 0x7a, 0x10, 0x01, 0x84]), None);
    }

    #[test]
    fn test_display() {
        let message = Message::new(Address::new([1, 2, 3]), GetMotorIP { ip: 2 });
        assert_eq!(
            message.to_string(),
            "GetMotorIP 00.00.01 -> 01.02.03 GetMotorIP { ip: 2 }"
        );
    }
}
