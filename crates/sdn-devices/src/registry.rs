/*!
 * Device registry.
 *
 * Holds every [`Motor`] and [`Group`] seen on the bus, applies inbound
 * reports to them, and builds the commands the bridge sends on behalf of
 * callers. Reports that leave a motor in motion yield follow-up polls so the
 * caller can keep tracking it until it stops.
 */
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::address::Address;
use crate::device::{join, mean, AttributeSink, Group, Motor, NullSink, Publisher, Summary, SLOTS};
use crate::error::{DeviceError, Result};
use crate::message::{
    ilt2, ActionCause, Body, GetGroupAddr, GetMotorDirection, GetMotorIP, GetMotorLimits,
    GetMotorPosition, GetMotorRollingSpeed, GetMotorStatus, GetNodeLabel, Ilt2PositionTarget,
    Kind, Message, MotionDirection, MotorState, MoveOf, MoveOfTarget, MoveTo, NodeType,
    SetGroupAddr, Stop, Wink,
};

/// What applying one inbound message produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateUpdate {
    /// Polls to send because the motor is still changing
    pub follow_ups: Vec<Message>,
    /// Set when the message came from a motor not seen before
    pub discovered: Option<Address>,
}

/// A high-level motor or group command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Move to the up limit
    Up,
    /// Move to the down limit
    Down,
    /// Stop
    Stop,
    /// Move to the next intermediate position down
    NextIp,
    /// Move to the previous intermediate position up
    PreviousIp,
    /// Jog briefly
    Wink,
    /// Poll the current state
    Refresh,
}

impl FromStr for ControlAction {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(ControlAction::Up),
            "down" => Ok(ControlAction::Down),
            "stop" => Ok(ControlAction::Stop),
            "next_ip" => Ok(ControlAction::NextIp),
            "previous_ip" => Ok(ControlAction::PreviousIp),
            "wink" => Ok(ControlAction::Wink),
            "refresh" => Ok(ControlAction::Refresh),
            other => Err(DeviceError::invalid_value(format!("unknown control action {:?}", other))),
        }
    }
}

/// A command and the poll that should trail it
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Message to send
    pub message: Message,
    /// Poll to send after it, if any
    pub follow_up: Option<Message>,
}

/// All known motors and groups
pub struct DeviceRegistry {
    motors: BTreeMap<Address, Motor>,
    groups: BTreeMap<Address, Group>,
    sink: Arc<dyn AttributeSink>,
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("motors", &self.motors.len())
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(Arc::new(NullSink))
    }
}

impl DeviceRegistry {
    /// An empty registry publishing changes to `sink`
    pub fn new(sink: Arc<dyn AttributeSink>) -> Self {
        Self {
            motors: BTreeMap::new(),
            groups: BTreeMap::new(),
            sink,
        }
    }

    /// Look up a motor
    pub fn motor(&self, address: Address) -> Option<&Motor> {
        self.motors.get(&address)
    }

    /// Look up a group
    pub fn group(&self, address: Address) -> Option<&Group> {
        self.groups.get(&address)
    }

    /// All motors, by address
    pub fn motors(&self) -> impl Iterator<Item = &Motor> {
        self.motors.values()
    }

    /// All groups, by address
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Addresses of the motors with `group` in any membership slot
    pub fn group_members(&self, group: Address) -> Vec<Address> {
        self.motors
            .values()
            .filter(|motor| motor.in_group(group))
            .map(|motor| motor.address)
            .collect()
    }

    /// Track `address` as a motor; returns whether it was new
    pub fn ensure_motor(&mut self, address: Address, node_type: NodeType) -> bool {
        if self.motors.contains_key(&address) {
            return false;
        }
        info!("Found new motor {} ({})", address, node_type);
        self.motors.insert(address, Motor::new(address, node_type));
        true
    }

    /// Track `address` as a group
    pub fn ensure_group(&mut self, address: Address) {
        if !self.groups.contains_key(&address) {
            debug!("Tracking group {}", address);
            self.groups.insert(address, Group::new(address));
            self.refresh_members(address);
        }
    }

    /// Apply an inbound message to the motor that sent it
    pub fn apply(&mut self, message: &Message) -> StateUpdate {
        let mut update = StateUpdate::default();
        let address = message.src;
        if !address.is_motor() {
            return update;
        }
        if self.ensure_motor(address, message.node_type) {
            update.discovered = Some(address);
        }

        let sink = Arc::clone(&self.sink);
        let Some(motor) = self.motors.get_mut(&address) else {
            return update;
        };
        if message.node_type != NodeType::Unspecified {
            motor.node_type = message.node_type;
        }
        let publisher = Publisher::new(sink.as_ref(), address);

        match &message.body {
            Body::PostNodeLabel(report) => {
                publisher.set(&mut motor.label, "label", Some(report.label.clone()));
            }
            Body::PostMotorPosition(report) => {
                publisher.set(&mut motor.position_percent, "position-percent", report.position_percent);
                publisher.set(&mut motor.position_pulses, "position-pulses", report.position_pulses);
                publisher.set(&mut motor.ip, "ip", report.ip);
                self.refresh_groups(address);
            }
            Body::Ilt2PostMotorPosition(report) => {
                let pulses = report.position_pulses;
                if motor.position_pulses == Some(pulses) && motor.last_position_pulses == Some(pulses) {
                    publisher.set(&mut motor.state, "state", Some(MotorState::Stopped));
                } else {
                    publisher.set(&mut motor.state, "state", Some(MotorState::Running));
                    if let Some(previous) = motor.position_pulses.filter(|&p| p != pulses) {
                        let direction = if previous < pulses {
                            MotionDirection::Down
                        } else {
                            MotionDirection::Up
                        };
                        publisher.set(&mut motor.last_direction, "last-direction", Some(direction));
                    }
                    update.follow_ups.push(Message::new(address, ilt2::GetMotorPosition));
                }
                motor.last_position_pulses = motor.position_pulses;
                let ip = motor.ip_at(pulses);
                publisher.set(&mut motor.ip, "ip", ip);
                publisher.set(&mut motor.position_percent, "position-percent", Some(report.position_percent));
                publisher.set(&mut motor.position_pulses, "position-pulses", Some(pulses));
                self.refresh_groups(address);
            }
            Body::PostMotorStatus(report) => {
                let explicitly_stopped = report.state == Some(MotorState::Stopped)
                    && report.last_action_cause == Some(ActionCause::ExplicitCommand)
                    && !matches!(motor.last_action, None | Some(Kind::Stop));
                if report.state == Some(MotorState::Running)
                    || motor.state == Some(MotorState::Running)
                    || explicitly_stopped
                {
                    update.follow_ups.push(Message::new(address, GetMotorStatus));
                }
                // One more position poll once it settles
                update.follow_ups.push(Message::new(address, GetMotorPosition));

                publisher.set(&mut motor.state, "state", report.state);
                publisher.set(&mut motor.last_direction, "last-direction", report.last_direction);
                publisher.set(&mut motor.last_action_source, "last-action-source", report.last_action_source);
                publisher.set(&mut motor.last_action_cause, "last-action-cause", report.last_action_cause);
                self.refresh_groups(address);
            }
            Body::PostMotorLimits(report) => {
                publisher.set(&mut motor.up_limit, "up-limit", report.up_limit);
                publisher.set(&mut motor.down_limit, "down-limit", report.down_limit);
            }
            Body::Ilt2PostMotorSettings(report) => {
                publisher.set(&mut motor.down_limit, "down-limit", Some(report.limit));
            }
            Body::PostMotorDirection(report) => {
                publisher.set(&mut motor.direction, "direction", report.direction);
            }
            Body::PostMotorRollingSpeed(report) => {
                publisher.set(&mut motor.up_speed, "up-speed", Some(report.up_speed));
                publisher.set(&mut motor.down_speed, "down-speed", Some(report.down_speed));
                publisher.set(&mut motor.slow_speed, "slow-speed", Some(report.slow_speed));
            }
            Body::PostMotorIP(report) => {
                if let Some(slot) = ip_slot(report.ip) {
                    let position = &mut motor.ip_positions[slot];
                    publisher.set(&mut position.pulses, &format!("ip{}-pulses", report.ip), report.position_pulses);
                    publisher.set(&mut position.percent, &format!("ip{}-percent", report.ip), report.position_percent);
                }
            }
            Body::Ilt2PostMotorIP(report) => {
                if let Some(slot) = ip_slot(report.ip) {
                    let percent = match (report.position_pulses, motor.down_limit) {
                        (Some(pulses), Some(limit)) if limit > 0 => {
                            Some((u32::from(pulses) * 100 / u32::from(limit)).min(100) as u8)
                        }
                        _ => None,
                    };
                    let position = &mut motor.ip_positions[slot];
                    publisher.set(&mut position.pulses, &format!("ip{}-pulses", report.ip), report.position_pulses);
                    publisher.set(&mut position.percent, &format!("ip{}-percent", report.ip), percent);
                }
            }
            Body::PostGroupAddr(report) => {
                self.set_group_slot(address, report.group_index, report.group_address);
            }
            _ => {}
        }
        update
    }

    /// Point membership slot `index` (1..=16) of a motor at `group`, or
    /// clear it, and republish the affected membership lists
    pub fn set_group_slot(&mut self, motor: Address, index: u8, group: Option<Address>) {
        let Some(slot) = ip_slot(index) else {
            return;
        };
        let Some(entry) = self.motors.get_mut(&motor) else {
            return;
        };
        let previous = std::mem::replace(&mut entry.groups[slot], group);

        let groups = entry.groups_string();
        Publisher::new(self.sink.as_ref(), motor).set(&mut entry.groups_text, "groups", groups);

        if let Some(group) = group {
            self.ensure_group(group);
            self.refresh_members(group);
        }
        if let Some(previous) = previous.filter(|p| Some(*p) != group) {
            self.refresh_members(previous);
            self.refresh_group(previous);
        }
        self.refresh_groups(motor);
    }

    /// Record the last motion command sent to a motor, so a later
    /// "stopped by explicit command" status can be told apart from a stop
    /// the bridge asked for
    pub fn record_action(&mut self, message: &Message) {
        let kind = message.kind();
        if !matches!(kind, Kind::Move | Kind::MoveTo | Kind::Wink | Kind::Stop) {
            return;
        }
        if let Some(motor) = self.motors.get_mut(&message.target()) {
            motor.last_action = Some(kind);
        }
    }

    /// Build the command for `action` on a motor or group, and the poll
    /// that tracks its effect
    pub fn control(&self, address: Address, action: ControlAction) -> Command {
        let ilt2 = self.motors.get(&address).map_or(false, Motor::is_ilt2);
        let status_poll = if ilt2 {
            Message::new(address, ilt2::GetMotorPosition)
        } else {
            Message::new(address, GetMotorStatus)
        };

        let body: Body = match (action, ilt2) {
            (ControlAction::Refresh, _) => {
                return Command {
                    message: status_poll,
                    follow_up: None,
                }
            }
            (ControlAction::Wink, _) => Wink.into(),
            (ControlAction::Up, true) => ilt2::SetMotorPosition::to(Ilt2PositionTarget::UpLimit).into(),
            (ControlAction::Down, true) => ilt2::SetMotorPosition::to(Ilt2PositionTarget::DownLimit).into(),
            (ControlAction::Stop, true) => ilt2::SetMotorPosition::to(Ilt2PositionTarget::Stop).into(),
            (ControlAction::NextIp, true) => ilt2::SetMotorPosition::to(Ilt2PositionTarget::NextIpDown).into(),
            (ControlAction::PreviousIp, true) => ilt2::SetMotorPosition::to(Ilt2PositionTarget::NextIpUp).into(),
            (ControlAction::Up, false) => MoveTo::limit(true).into(),
            (ControlAction::Down, false) => MoveTo::limit(false).into(),
            (ControlAction::Stop, false) => Stop.into(),
            (ControlAction::NextIp, false) => MoveOf {
                target_type: MoveOfTarget::NextIp,
                target: None,
            }
            .into(),
            (ControlAction::PreviousIp, false) => MoveOf {
                target_type: MoveOfTarget::PreviousIp,
                target: None,
            }
            .into(),
        };
        Command {
            message: Message::new(address, body).with_ack(),
            follow_up: Some(status_poll),
        }
    }

    /// Messages that move a motor's membership slots to exactly `groups`
    /// (sorted, deduplicated, non-group addresses ignored). Each changed
    /// slot gets an acknowledged SetGroupAddr and a GetGroupAddr to confirm.
    pub fn group_assignment(&self, motor: Address, groups: &[Address]) -> Vec<Message> {
        let Some(entry) = self.motors.get(&motor) else {
            return Vec::new();
        };
        let mut wanted: Vec<Address> = groups.iter().copied().filter(Address::is_group).collect();
        wanted.sort();
        wanted.dedup();
        wanted.truncate(SLOTS);

        let mut messages = Vec::new();
        for (slot, current) in entry.groups.iter().enumerate() {
            let target = wanted.get(slot).copied();
            if *current == target {
                continue;
            }
            let index = slot as u8 + 1;
            messages.push(
                Message::new(
                    motor,
                    SetGroupAddr {
                        group_index: index,
                        group_address: target,
                    },
                )
                .with_ack(),
            );
            messages.push(Message::new(motor, GetGroupAddr { group_index: index }));
        }
        messages
    }

    /// Polls that fill in everything about a newly found motor, with the
    /// priority each should be queued at. Labels, limits and the first IPs
    /// and groups come first; discovery sits at 50 so this all runs before it.
    pub fn interrogation(address: Address, node_type: NodeType) -> Vec<(Message, u8)> {
        let mut polls = vec![(Message::new(address, GetNodeLabel), 3)];
        match node_type {
            NodeType::St50Ilt2 => {
                polls.push((Message::new(address, ilt2::GetMotorPosition), 2));
                polls.push((Message::new(address, ilt2::GetMotorSettings), 3));
                for ip in 1..=SLOTS as u8 {
                    polls.push((Message::new(address, ilt2::GetMotorIP { ip }), 2 * ip + 3));
                }
            }
            _ => {
                polls.push((Message::new(address, GetMotorLimits), 2));
                polls.push((Message::new(address, GetMotorStatus), 3));
                polls.push((Message::new(address, GetMotorDirection), 3));
                polls.push((Message::new(address, GetMotorRollingSpeed), 3));
                for ip in 1..=SLOTS as u8 {
                    polls.push((Message::new(address, GetMotorIP { ip }), 2 * ip + 3));
                }
            }
        }
        for group_index in 1..=SLOTS as u8 {
            polls.push((Message::new(address, GetGroupAddr { group_index }), 2 * group_index + 2));
        }
        polls
    }

    fn refresh_members(&mut self, group: Address) {
        let members = join(self.group_members(group));
        if let Some(entry) = self.groups.get_mut(&group) {
            Publisher::new(self.sink.as_ref(), group).set(&mut entry.motors, "motors", members);
        }
    }

    /// Recompute the aggregates of every group `motor` belongs to
    fn refresh_groups(&mut self, motor: Address) {
        let Some(groups) = self.motors.get(&motor).map(Motor::group_addresses) else {
            return;
        };
        for group in groups {
            self.refresh_group(group);
        }
    }

    /// Recompute one group's position, IP, state and direction from its
    /// current members. A group left empty has all of them cleared.
    fn refresh_group(&mut self, group: Address) {
        let members: Vec<&Motor> = self.motors.values().filter(|m| m.in_group(group)).collect();
        let percent = mean(members.iter().map(|m| m.position_percent.map(u32::from)));
        let pulses = mean(members.iter().map(|m| m.position_pulses.map(u32::from)));
        let ip = match Summary::of(members.iter().map(|m| m.ip)) {
            Some(Summary::Uniform(ip)) => Some(ip),
            _ => None,
        };
        let state = Summary::of(members.iter().map(|m| m.state));
        let direction = Summary::of(members.iter().map(|m| m.last_direction));

        let Some(entry) = self.groups.get_mut(&group) else {
            return;
        };
        let publisher = Publisher::new(self.sink.as_ref(), group);
        publisher.set(&mut entry.position_percent, "position-percent", percent.map(|p| p as u8));
        publisher.set(&mut entry.position_pulses, "position-pulses", pulses.map(|p| p as u16));
        publisher.set(&mut entry.ip, "ip", ip);
        publisher.set(&mut entry.state, "state", state);
        publisher.set(&mut entry.last_direction, "last-direction", direction);
    }
}

fn ip_slot(index: u8) -> Option<usize> {
    (1..=SLOTS).contains(&usize::from(index)).then(|| usize::from(index) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::AttributeChange;
    use crate::message::{PostGroupAddr, PostMotorPosition, PostMotorStatus};
    use sdn_core::event::SharedEventBus;
    use sdn_core::types::Value;
    use tokio::sync::broadcast::Receiver;

    fn motor(n: u8) -> Address {
        Address::new([0x10, 0x20, n])
    }

    fn report(src: Address, node_type: NodeType, body: impl Into<Body>) -> Message {
        Message::from_parts(node_type, false, src, Address::BRIDGE, body)
    }

    fn position(src: Address, percent: Option<u8>) -> Message {
        report(
            src,
            NodeType::St30,
            PostMotorPosition {
                position_pulses: percent.map(|p| u16::from(p) * 10),
                position_percent: percent,
                ip: None,
            },
        )
    }

    fn registry() -> (DeviceRegistry, Receiver<AttributeChange>) {
        let bus = SharedEventBus::new();
        let rx = bus.get().subscribe();
        (DeviceRegistry::new(Arc::new(bus)), rx)
    }

    fn drain(rx: &mut Receiver<AttributeChange>) -> Vec<(String, Value)> {
        let mut changes = Vec::new();
        while let Ok(change) = rx.try_recv() {
            changes.push((change.path, change.value));
        }
        changes
    }

    fn join_group(registry: &mut DeviceRegistry, member: Address, group: Address) {
        registry.apply(&report(
            member,
            NodeType::St30,
            PostGroupAddr {
                group_index: 1,
                group_address: Some(group),
            },
        ));
    }

    #[test]
    fn test_new_motor_is_discovered_once() {
        let (mut registry, _rx) = registry();
        let first = registry.apply(&position(motor(1), Some(10)));
        let second = registry.apply(&position(motor(1), Some(10)));
        assert_eq!(first.discovered, Some(motor(1)));
        assert_eq!(second.discovered, None);
        assert_eq!(registry.motor(motor(1)).map(|m| m.node_type), Some(NodeType::St30));
    }

    #[test]
    fn test_non_motor_sources_are_ignored() {
        let (mut registry, _rx) = registry();
        for src in [Address::BRIDGE, Address::UAI_PLUS, Address::group(1), Address::BROADCAST] {
            assert_eq!(registry.apply(&position(src, Some(5))), StateUpdate::default());
        }
        assert_eq!(registry.motors().count(), 0);
    }

    #[test]
    fn test_position_published_once() {
        let (mut registry, mut rx) = registry();
        registry.apply(&position(motor(1), Some(50)));
        registry.apply(&position(motor(1), Some(50)));
        let changes = drain(&mut rx);
        let percent: Vec<_> = changes
            .iter()
            .filter(|(path, _)| path == "102001/position-percent")
            .collect();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].1, Value::Integer(50));
    }

    #[test]
    fn test_group_mean_needs_every_member() {
        let (mut registry, mut rx) = registry();
        let group = Address::group(7);
        for (n, percent) in [(1, Some(20)), (2, Some(40)), (3, Some(60))] {
            registry.apply(&position(motor(n), percent));
            join_group(&mut registry, motor(n), group);
        }
        assert_eq!(registry.group(group).and_then(|g| g.position_percent), Some(40));
        assert_eq!(registry.group(group).map(|g| g.motors.as_str()), Some("10.20.01,10.20.02,10.20.03"));

        drain(&mut rx);
        registry.apply(&position(motor(2), None));
        assert_eq!(registry.group(group).and_then(|g| g.position_percent), None);
        assert!(drain(&mut rx).contains(&("010107/position-percent".to_string(), Value::Null)));
    }

    #[test]
    fn test_group_state_mixed() {
        let (mut registry, _rx) = registry();
        let group = Address::group(3);
        for n in [1, 2] {
            join_group(&mut registry, motor(n), group);
        }
        let status = |state| PostMotorStatus {
            state: Some(state),
            ..Default::default()
        };
        registry.apply(&report(motor(1), NodeType::St30, status(MotorState::Stopped)));
        registry.apply(&report(motor(2), NodeType::St30, status(MotorState::Stopped)));
        assert_eq!(
            registry.group(group).and_then(|g| g.state),
            Some(Summary::Uniform(MotorState::Stopped))
        );
        registry.apply(&report(motor(2), NodeType::St30, status(MotorState::Running)));
        assert_eq!(registry.group(group).and_then(|g| g.state), Some(Summary::Mixed));
    }

    #[test]
    fn test_moving_membership_republishes_both_groups() {
        let (mut registry, mut rx) = registry();
        join_group(&mut registry, motor(1), Address::group(1));
        drain(&mut rx);
        join_group(&mut registry, motor(1), Address::group(2));

        let changes = drain(&mut rx);
        assert!(changes.contains(&("102001/groups".to_string(), Value::from("01.01.02"))));
        assert!(changes.contains(&("010102/motors".to_string(), Value::from("10.20.01"))));
        assert!(changes.contains(&("010101/motors".to_string(), Value::from(""))));
        assert!(registry.group_members(Address::group(1)).is_empty());
    }

    #[test]
    fn test_leaving_member_updates_old_group_aggregates() {
        let (mut registry, _rx) = registry();
        let group = Address::group(1);
        for (n, percent) in [(1, 20), (2, 40), (3, 60)] {
            join_group(&mut registry, motor(n), group);
            registry.apply(&position(motor(n), Some(percent)));
        }
        let status = |state| PostMotorStatus {
            state: Some(state),
            ..Default::default()
        };
        registry.apply(&report(motor(1), NodeType::St30, status(MotorState::Stopped)));
        registry.apply(&report(motor(2), NodeType::St30, status(MotorState::Stopped)));
        registry.apply(&report(motor(3), NodeType::St30, status(MotorState::Running)));
        assert_eq!(registry.group(group).and_then(|g| g.position_percent), Some(40));
        assert_eq!(registry.group(group).and_then(|g| g.state), Some(Summary::Mixed));

        join_group(&mut registry, motor(3), Address::group(8));
        let old = registry.group(group);
        assert_eq!(old.and_then(|g| g.position_percent), Some(30));
        assert_eq!(old.and_then(|g| g.position_pulses), Some(300));
        assert_eq!(old.and_then(|g| g.state), Some(Summary::Uniform(MotorState::Stopped)));
        assert_eq!(
            registry.group(Address::group(8)).and_then(|g| g.position_percent),
            Some(60)
        );

        registry.set_group_slot(motor(1), 1, None);
        registry.set_group_slot(motor(2), 1, None);
        let emptied = registry.group(group);
        assert_eq!(emptied.and_then(|g| g.position_percent), None);
        assert_eq!(emptied.and_then(|g| g.state), None);
    }

    #[test]
    fn test_status_follow_ups() {
        let (mut registry, _rx) = registry();
        let addr = motor(1);
        let status = |state, cause| {
            report(
                addr,
                NodeType::St30,
                PostMotorStatus {
                    state: Some(state),
                    last_action_cause: Some(cause),
                    ..Default::default()
                },
            )
        };
        let kinds = |update: StateUpdate| update.follow_ups.iter().map(Message::kind).collect::<Vec<_>>();

        let running = registry.apply(&status(MotorState::Running, ActionCause::TargetReached));
        assert_eq!(kinds(running), vec![Kind::GetMotorStatus, Kind::GetMotorPosition]);

        // Previously running, now stopped: one more status poll
        let settled = registry.apply(&status(MotorState::Stopped, ActionCause::TargetReached));
        assert_eq!(kinds(settled), vec![Kind::GetMotorStatus, Kind::GetMotorPosition]);

        let quiet = registry.apply(&status(MotorState::Stopped, ActionCause::TargetReached));
        assert_eq!(kinds(quiet), vec![Kind::GetMotorPosition]);

        // Stopped by someone else while we had it moving: keep polling
        registry.record_action(&Message::new(addr, MoveTo::limit(true)));
        let reversing = registry.apply(&status(MotorState::Stopped, ActionCause::ExplicitCommand));
        assert_eq!(kinds(reversing), vec![Kind::GetMotorStatus, Kind::GetMotorPosition]);

        registry.record_action(&Message::new(addr, Stop));
        let stopped = registry.apply(&status(MotorState::Stopped, ActionCause::ExplicitCommand));
        assert_eq!(kinds(stopped), vec![Kind::GetMotorPosition]);
    }

    #[test]
    fn test_ilt2_position_tracking() {
        let (mut registry, _rx) = registry();
        let addr = motor(9);
        let at = |pulses| {
            report(
                addr,
                NodeType::St50Ilt2,
                ilt2::PostMotorPosition {
                    position_pulses: pulses,
                    position_percent: 0,
                },
            )
        };
        registry.apply(&report(
            addr,
            NodeType::St50Ilt2,
            ilt2::PostMotorIP {
                ip: 2,
                position_pulses: Some(800),
            },
        ));
        registry.apply(&report(addr, NodeType::St50Ilt2, ilt2::PostMotorSettings { limit: 1_600 }));
        registry.apply(&report(
            addr,
            NodeType::St50Ilt2,
            ilt2::PostMotorIP {
                ip: 3,
                position_pulses: Some(400),
            },
        ));
        assert_eq!(registry.motor(addr).map(|m| m.ip_positions[2].percent), Some(Some(25)));

        assert_eq!(registry.apply(&at(100)).follow_ups.len(), 1);
        assert_eq!(registry.apply(&at(500)).follow_ups.len(), 1);
        assert_eq!(registry.motor(addr).and_then(|m| m.last_direction), Some(MotionDirection::Down));
        assert_eq!(registry.apply(&at(802)).follow_ups.len(), 1);
        assert_eq!(registry.motor(addr).and_then(|m| m.ip), Some(2));
        // Unchanged once is not enough; unchanged twice means stopped
        assert_eq!(registry.apply(&at(802)).follow_ups.len(), 1);
        assert!(registry.apply(&at(802)).follow_ups.is_empty());
        assert_eq!(registry.motor(addr).and_then(|m| m.state), Some(MotorState::Stopped));
    }

    #[test]
    fn test_control_per_family() {
        let (mut registry, _rx) = registry();
        let st30 = motor(1);
        let st50 = motor(2);
        registry.ensure_motor(st30, NodeType::St30);
        registry.ensure_motor(st50, NodeType::St50Ilt2);

        let up = registry.control(st30, ControlAction::Up);
        assert_eq!(up.message.body, Body::MoveTo(MoveTo::limit(true)));
        assert!(up.message.ack_requested);
        assert_eq!(up.follow_up.map(|m| m.kind()), Some(Kind::GetMotorStatus));

        let next = registry.control(st50, ControlAction::NextIp);
        assert_eq!(
            next.message.body,
            Body::Ilt2SetMotorPosition(ilt2::SetMotorPosition::to(Ilt2PositionTarget::NextIpDown))
        );
        assert_eq!(next.follow_up.map(|m| m.kind()), Some(Kind::Ilt2GetMotorPosition));

        let refresh = registry.control(st30, ControlAction::Refresh);
        assert_eq!(refresh.message.kind(), Kind::GetMotorStatus);
        assert!(!refresh.message.ack_requested);
        assert_eq!(refresh.follow_up, None);

        let group_stop = registry.control(Address::group(4), ControlAction::Stop);
        assert_eq!(group_stop.message.src, Address::group(4));
        assert_eq!(group_stop.message.kind(), Kind::Stop);

        assert!("sideways".parse::<ControlAction>().is_err());
        assert_eq!("next_ip".parse::<ControlAction>().ok(), Some(ControlAction::NextIp));
    }

    #[test]
    fn test_group_assignment() {
        let (mut registry, _rx) = registry();
        let addr = motor(1);
        join_group(&mut registry, addr, Address::group(5));

        let messages = registry.group_assignment(
            addr,
            &[Address::group(9), Address::group(5), Address::group(9), motor(4)],
        );
        let sets: Vec<(u8, Option<Address>)> = messages
            .iter()
            .filter_map(|m| match &m.body {
                Body::SetGroupAddr(set) => Some((set.group_index, set.group_address)),
                _ => None,
            })
            .collect();
        // Slot 1 already holds 01.01.05
        assert_eq!(sets, vec![(2, Some(Address::group(9)))]);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].ack_requested);
        assert_eq!(messages[1].kind(), Kind::GetGroupAddr);

        let cleared = registry.group_assignment(addr, &[]);
        assert_eq!(cleared.len(), 2);
        assert!(registry.group_assignment(motor(8), &[]).is_empty());
    }

    #[test]
    fn test_interrogation_priorities() {
        let polls = DeviceRegistry::interrogation(motor(1), NodeType::St30);
        assert_eq!(polls.len(), 5 + 16 + 16);
        assert!(polls.iter().all(|(_, priority)| *priority < 50));

        let ilt2_polls = DeviceRegistry::interrogation(motor(1), NodeType::St50Ilt2);
        assert!(ilt2_polls.iter().any(|(m, _)| m.kind() == Kind::Ilt2GetMotorSettings));
    }
}
