/*!
 * Motor and group state.
 *
 * A [`Motor`] caches the last value reported for each attribute; a
 * [`Group`] caches values aggregated over its members. Every change goes
 * through [`Publisher::set`], which stores the new value and emits one
 * [`AttributeChange`] to the [`AttributeSink`] only if the value differs.
 */
use std::fmt::{self, Debug};

use chrono::{DateTime, Utc};

use sdn_core::event::SharedEventBus;
use sdn_core::types::Value;

use crate::address::Address;
use crate::message::{
    ActionCause, ActionSource, Kind, MotionDirection, MotorState, NodeType, RotationDirection,
};

/// Number of intermediate positions and of group slots per motor
pub const SLOTS: usize = 16;

/// One published attribute change
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    /// `<compact address>/<attribute>`, e.g. `0A0B0C/position-percent`
    pub path: String,
    /// New value
    pub value: Value,
    /// When the change was observed
    pub timestamp: DateTime<Utc>,
}

impl AttributeChange {
    /// A change observed now
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
            timestamp: Utc::now(),
        }
    }
}

/// Receives attribute changes, e.g. to forward them to a pub-sub bus
pub trait AttributeSink: Send + Sync + Debug {
    /// Called once per actual change
    fn publish(&self, change: AttributeChange);
}

impl AttributeSink for SharedEventBus<AttributeChange> {
    fn publish(&self, change: AttributeChange) {
        self.get().publish(change);
    }
}

/// Discards every change
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AttributeSink for NullSink {
    fn publish(&self, _change: AttributeChange) {}
}

/// Stores attribute values for one entity, publishing the ones that change
pub struct Publisher<'a> {
    sink: &'a dyn AttributeSink,
    prefix: String,
}

impl<'a> Publisher<'a> {
    /// Publish under `address`
    pub fn new(sink: &'a dyn AttributeSink, address: Address) -> Self {
        Self {
            sink,
            prefix: address.compact(),
        }
    }

    /// Store `value` in `slot`; publish it as `attribute` if it changed.
    /// Returns whether it changed.
    pub fn set<T>(&self, slot: &mut T, attribute: &str, value: T) -> bool
    where
        T: PartialEq + Clone + Into<Value>,
    {
        if *slot == value {
            return false;
        }
        *slot = value.clone();
        self.sink.publish(AttributeChange::new(
            format!("{}/{}", self.prefix, attribute),
            value.into(),
        ));
        true
    }
}

/// Pulses and percent of one intermediate position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpPosition {
    /// Position in pulses
    pub pulses: Option<u16>,
    /// Position in percent
    pub percent: Option<u8>,
}

/// Last known state of one motor
#[derive(Debug, Clone, PartialEq)]
pub struct Motor {
    /// Unicast address
    pub address: Address,
    /// Model, from the frames it sends
    pub node_type: NodeType,
    /// Node label
    pub label: Option<String>,
    /// Position in pulses
    pub position_pulses: Option<u16>,
    /// Position in percent
    pub position_percent: Option<u8>,
    /// Intermediate position the motor is at
    pub ip: Option<u8>,
    /// Run state
    pub state: Option<MotorState>,
    /// Direction of the last movement
    pub last_direction: Option<MotionDirection>,
    /// Origin of the last action
    pub last_action_source: Option<ActionSource>,
    /// Why the last action ended
    pub last_action_cause: Option<ActionCause>,
    /// Up limit in pulses
    pub up_limit: Option<u16>,
    /// Down limit in pulses
    pub down_limit: Option<u16>,
    /// Rotation direction
    pub direction: Option<RotationDirection>,
    /// Up speed
    pub up_speed: Option<u8>,
    /// Down speed
    pub down_speed: Option<u8>,
    /// Slow speed
    pub slow_speed: Option<u8>,
    /// Intermediate positions 1..=16
    pub ip_positions: [IpPosition; SLOTS],
    /// Group membership slots 1..=16
    pub groups: [Option<Address>; SLOTS],
    /// The `groups` attribute as last published
    pub groups_text: String,
    /// Kind of the last motion command the bridge sent it
    pub last_action: Option<Kind>,
    /// Position before the previous report; used to tell when an ILT2
    /// motor has stopped
    pub last_position_pulses: Option<u16>,
}

impl Motor {
    /// A motor nothing is known about yet
    pub fn new(address: Address, node_type: NodeType) -> Self {
        Self {
            address,
            node_type,
            label: None,
            position_pulses: None,
            position_percent: None,
            ip: None,
            state: None,
            last_direction: None,
            last_action_source: None,
            last_action_cause: None,
            up_limit: None,
            down_limit: None,
            direction: None,
            up_speed: None,
            down_speed: None,
            slow_speed: None,
            ip_positions: [IpPosition::default(); SLOTS],
            groups: [None; SLOTS],
            groups_text: String::new(),
            last_action: None,
            last_position_pulses: None,
        }
    }

    /// Whether it speaks the second-generation messages
    pub fn is_ilt2(&self) -> bool {
        self.node_type.is_ilt2()
    }

    /// Groups it belongs to, sorted and without duplicates
    pub fn group_addresses(&self) -> Vec<Address> {
        let mut groups: Vec<Address> = self.groups.iter().flatten().copied().collect();
        groups.sort();
        groups.dedup();
        groups
    }

    /// Whether any slot holds `group`
    pub fn in_group(&self, group: Address) -> bool {
        self.groups.contains(&Some(group))
    }

    /// The `groups` attribute: member groups as `XX.XX.XX`, comma-joined
    pub fn groups_string(&self) -> String {
        join(self.group_addresses())
    }

    /// The intermediate position whose pulses match `pulses` to within the
    /// 5 pulse resolution motors report at
    pub fn ip_at(&self, pulses: u16) -> Option<u8> {
        self.ip_positions
            .iter()
            .position(|ip| ip.pulses.map_or(false, |p| p / 5 == pulses / 5))
            .map(|index| index as u8 + 1)
    }
}

/// Aggregate of a per-member attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Summary<T> {
    /// Every member agrees
    Uniform(T),
    /// Members disagree
    Mixed,
}

impl<T: PartialEq> Summary<T> {
    /// Summarize member values: `None` for no members or when all of them
    /// are unknown
    pub fn of<I>(values: I) -> Option<Summary<T>>
    where
        I: IntoIterator<Item = Option<T>>,
    {
        let mut values = values.into_iter();
        let first = values.next()?;
        if values.all(|v| v == first) {
            first.map(Summary::Uniform)
        } else {
            Some(Summary::Mixed)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Summary<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Summary::Uniform(value) => value.fmt(f),
            Summary::Mixed => f.write_str("mixed"),
        }
    }
}

impl<T: Into<Value>> From<Summary<T>> for Value {
    fn from(summary: Summary<T>) -> Self {
        match summary {
            Summary::Uniform(value) => value.into(),
            Summary::Mixed => Value::from("mixed"),
        }
    }
}

/// Aggregated state of one group
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Group address
    pub address: Address,
    /// Mean member position in percent, when every member's is known
    pub position_percent: Option<u8>,
    /// Mean member position in pulses, when every member's is known
    pub position_pulses: Option<u16>,
    /// Intermediate position, when all members are at the same one
    pub ip: Option<u8>,
    /// Member run states
    pub state: Option<Summary<MotorState>>,
    /// Member directions
    pub last_direction: Option<Summary<MotionDirection>>,
    /// The `motors` attribute as last published
    pub motors: String,
}

impl Group {
    /// A group with no known members
    pub fn new(address: Address) -> Self {
        Self {
            address,
            position_percent: None,
            position_pulses: None,
            ip: None,
            state: None,
            last_direction: None,
            motors: String::new(),
        }
    }
}

/// Integer mean, only when every value is known
pub(crate) fn mean<I>(values: I) -> Option<u32>
where
    I: IntoIterator<Item = Option<u32>>,
{
    let (mut sum, mut count) = (0u32, 0u32);
    for value in values {
        sum += value?;
        count += 1;
    }
    (count > 0).then(|| sum / count)
}

pub(crate) fn join(addresses: impl IntoIterator<Item = Address>) -> String {
    addresses
        .into_iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
