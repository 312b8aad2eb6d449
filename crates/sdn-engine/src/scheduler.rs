/*!
 * Command scheduling.
 *
 * One request is in flight at a time. The writer takes the best ranked
 * command from the queue, sends it, and when it needs a reply holds the
 * line until the reply arrives or the response window closes. Unanswered
 * commands are retried until their attempts run out; an unanswered group
 * command is split into one copy per group member that stayed silent.
 *
 * The reader feeds every inbound message through the device registry,
 * queues the polls that implies, and releases the writer once the awaited
 * reply is in.
 *
 * [`SchedulerState`] holds all of this and is driven with explicit
 * instants, so it can be tested without a clock. [`Scheduler`] shares it
 * between the reader and writer tasks and the callers queueing commands.
 */
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use sdn_core::config::SchedulerConfig;
use sdn_devices::message::{GetMotorPosition, GetNodeAddr};
use sdn_devices::{Address, ControlAction, DeviceRegistry, Kind, Message, MessageSink, MessageSource};

use crate::error::{Error, Result};
use crate::queue::{CommandQueue, ScheduledCommand};

/// Attempts per command unless configured otherwise
pub const DEFAULT_RETRIES: u32 = 5;
/// Rank of caller commands
pub const COMMAND_PRIORITY: u8 = 0;
/// Rank of follow-up polls
pub const FOLLOW_UP_PRIORITY: u8 = 1;
/// Rank of discovery requests; below everything else
pub const DISCOVERY_PRIORITY: u8 = 50;

/// What the writer should do next
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Put this message on the wire
    Send(Message),
    /// Wait for a wake-up, or until the instant passes if one is given
    Wait(Option<Instant>),
}

/// Timing of the response windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// How long a reply may take
    pub response_timeout: Duration,
    /// How long to listen after a broadcast or group discovery request
    pub broadcast_timeout: Duration,
    /// Least time between two frames
    pub min_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for Timing {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            response_timeout: config.response_timeout(),
            broadcast_timeout: config.broadcast_timeout(),
            min_interval: config.min_interval(),
        }
    }
}

/// Queue, outstanding request and device state
#[derive(Debug)]
pub struct SchedulerState {
    queue: CommandQueue,
    registry: DeviceRegistry,
    prior: Option<ScheduledCommand>,
    response_deadline: Option<Instant>,
    broadcast_deadline: Option<Instant>,
    pending_members: BTreeSet<Address>,
    devices_found: bool,
    auto_discover: bool,
    retries: u32,
    timing: Timing,
}

impl SchedulerState {
    /// Fresh state around `registry`. Discovery, when enabled, runs the
    /// first time the writer goes idle.
    pub fn new(registry: DeviceRegistry, timing: Timing, auto_discover: bool) -> Self {
        Self {
            queue: CommandQueue::new(),
            registry,
            prior: None,
            response_deadline: None,
            broadcast_deadline: None,
            pending_members: BTreeSet::new(),
            devices_found: true,
            auto_discover,
            retries: DEFAULT_RETRIES,
            timing,
        }
    }

    /// Give follow-up polls and interrogation `retries` attempts each
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Attempts given to commands the scheduler queues by itself
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// The device registry
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The device registry, for changes that bypass the queue
    pub fn registry_mut(&mut self) -> &mut DeviceRegistry {
        &mut self.registry
    }

    /// The queue
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Queue a command unless the same message is already queued. A group
    /// command starts tracking its group.
    pub fn push(&mut self, command: ScheduledCommand) -> bool {
        if command.message.is_group_sourced() {
            self.registry.ensure_group(command.message.src);
        }
        self.queue.push(command)
    }

    /// Whether a reply is being waited for
    pub fn awaiting_response(&self) -> bool {
        self.response_deadline.is_some()
    }

    /// The command sent last that expects a reply
    pub fn prior(&self) -> Option<&ScheduledCommand> {
        self.prior.as_ref()
    }

    /// Decide the writer's next step at `now`
    pub fn next_step(&mut self, now: Instant) -> Step {
        loop {
            if let Some(deadline) = self.response_deadline {
                if now < deadline {
                    return Step::Wait(Some(deadline));
                }
                debug!("Timed out waiting on response");
                self.response_deadline = None;
                self.broadcast_deadline = None;
                self.expire_prior();
            }

            if let Some(command) = self.queue.pop() {
                if let Err(e) = command.message.encode() {
                    warn!("Dropping {} for {}: {}", command.message.kind(), command.message.target(), e);
                    continue;
                }
                return Step::Send(self.dispatch(command, now));
            }

            if self.auto_discover && self.devices_found {
                self.devices_found = false;
                debug!("Probing for new motors");
                self.queue.push(ScheduledCommand::new(
                    Message::broadcast(GetNodeAddr),
                    1,
                    DISCOVERY_PRIORITY,
                ));
                continue;
            }

            return Step::Wait(None);
        }
    }

    fn dispatch(&mut self, mut command: ScheduledCommand, now: Instant) -> Message {
        let message = command.message.clone();
        self.pending_members.clear();
        if !message.requires_response() {
            self.prior = None;
            return message;
        }

        let mut deadline = now + self.timing.response_timeout;
        if message.is_group_sourced() {
            self.pending_members = self.registry.group_members(message.src).into_iter().collect();
        }
        if message.dest.is_broadcast() || (message.is_group_sourced() && message.kind() == Kind::GetNodeAddr) {
            deadline = now + self.timing.broadcast_timeout;
            self.broadcast_deadline = Some(deadline);
        }
        self.response_deadline = Some(deadline);
        command.retries = command.retries.saturating_sub(1);
        self.prior = Some(command);
        message
    }

    fn expire_prior(&mut self) {
        let Some(prior) = self.prior.take() else {
            return;
        };
        if prior.retries == 0 {
            warn!("No response to {} for {}, giving up", prior.message.kind(), prior.message.target());
            self.pending_members.clear();
            return;
        }
        debug!("Retrying {} more times", prior.retries);
        if prior.message.is_group_sourced() && !self.pending_members.is_empty() {
            debug!("Re-targeting group message to individual motors");
            for member in std::mem::take(&mut self.pending_members) {
                self.queue.push(ScheduledCommand::new(
                    prior.message.retarget(member),
                    prior.retries,
                    prior.priority,
                ));
            }
        } else {
            self.queue.push(prior);
        }
    }

    /// Apply an inbound message. Returns whether the writer should wake.
    pub fn on_inbound(&mut self, message: &Message) -> bool {
        let update = self.registry.apply(message);

        if let Some(address) = update.discovered {
            self.devices_found = true;
            for (poll, priority) in DeviceRegistry::interrogation(address, message.node_type) {
                self.queue.push(ScheduledCommand::new(poll, self.retries, priority));
            }
        }

        let satisfied = self.is_awaited_response(message);
        if satisfied {
            self.response_deadline = self.broadcast_deadline;
            self.prior = None;
        }

        let followed = !update.follow_ups.is_empty();
        for follow_up in update.follow_ups {
            self.queue
                .push(ScheduledCommand::new(follow_up, self.retries, FOLLOW_UP_PRIORITY));
        }
        satisfied || followed || update.discovered.is_some()
    }

    fn is_awaited_response(&mut self, message: &Message) -> bool {
        if self.response_deadline.is_none() || message.kind() == Kind::Nack {
            return false;
        }
        let Some(prior) = &self.prior else {
            return false;
        };
        if !prior.message.expects(message) {
            return false;
        }
        if !prior.message.is_group_sourced() {
            return message.src == prior.message.dest;
        }
        if message.dest != prior.message.src {
            return false;
        }
        self.pending_members.remove(&message.src);
        self.pending_members.is_empty()
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    wake: Notify,
    timing: Timing,
    retries: u32,
}

/// Shared handle to the scheduler; cheap to clone
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("timing", &self.shared.timing).finish()
    }
}

impl Scheduler {
    /// A scheduler over `registry`, configured by `config`
    pub fn new(config: &SchedulerConfig, registry: DeviceRegistry) -> Self {
        let timing = Timing::from(config);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(
                    SchedulerState::new(registry, timing, config.auto_discover)
                        .with_retries(config.default_retries),
                ),
                wake: Notify::new(),
                timing,
                retries: config.default_retries,
            }),
        }
    }

    /// Queue a command and wake the writer. Returns false if the same
    /// message was already queued.
    pub async fn enqueue(&self, command: ScheduledCommand) -> bool {
        let queued = self.shared.state.lock().await.push(command);
        if queued {
            self.shared.wake.notify_one();
        }
        queued
    }

    /// Queue `message` at `priority` with the configured number of attempts
    pub async fn push(&self, message: Message, priority: u8) -> bool {
        self.enqueue(ScheduledCommand::new(message, self.shared.retries, priority))
            .await
    }

    /// Send a control action to a motor or group, followed by the poll that
    /// tracks its effect
    pub async fn control(&self, address: Address, action: ControlAction) {
        let mut state = self.shared.state.lock().await;
        if address.is_group() {
            state.registry_mut().ensure_group(address);
        }
        let command = state.registry().control(address, action);
        state.registry_mut().record_action(&command.message);
        debug!("Control {:?} on {}", action, address);

        state.push(ScheduledCommand::new(command.message, self.shared.retries, COMMAND_PRIORITY));
        if let Some(follow_up) = command.follow_up {
            state.push(ScheduledCommand::new(follow_up, self.shared.retries, FOLLOW_UP_PRIORITY));
        }
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Move a motor's group memberships to `groups`. Returns the number of
    /// messages queued.
    pub async fn assign_groups(&self, motor: Address, groups: &[Address]) -> usize {
        let mut state = self.shared.state.lock().await;
        let messages = state.registry().group_assignment(motor, groups);
        let count = messages.len();
        for message in messages {
            state.push(ScheduledCommand::new(message, self.shared.retries, COMMAND_PRIORITY));
        }
        drop(state);
        if count > 0 {
            self.shared.wake.notify_one();
        }
        count
    }

    /// Ask `address`, or everyone when `None`, to report its node address
    pub async fn discover(&self, address: Option<Address>) -> bool {
        let message = Message::new(address.unwrap_or(Address::BROADCAST), GetNodeAddr);
        self.enqueue(ScheduledCommand::new(message, 1, DISCOVERY_PRIORITY)).await
    }

    /// Poll the position of motors known ahead of time
    pub async fn poll_known(&self, motors: &[Address]) {
        for &motor in motors {
            info!("Polling known motor {}", motor);
            self.enqueue(ScheduledCommand::new(
                Message::new(motor, GetMotorPosition),
                self.shared.retries,
                COMMAND_PRIORITY,
            ))
            .await;
        }
    }

    /// Run `f` against the device registry
    pub async fn with_registry<R>(&self, f: impl FnOnce(&DeviceRegistry) -> R) -> R {
        f(self.shared.state.lock().await.registry())
    }

    /// Run `f` against the whole scheduler state
    pub async fn with_state<R>(&self, f: impl FnOnce(&mut SchedulerState) -> R) -> R {
        f(&mut *self.shared.state.lock().await)
    }

    /// Drain the queue into `sink`, pacing and retrying, until writing fails
    pub async fn run_writer<S: MessageSink>(&self, sink: &mut S) -> Result<()> {
        let mut last_write: Option<Instant> = None;
        loop {
            if let Some(last) = last_write {
                let ready = last + self.shared.timing.min_interval;
                if Instant::now() < ready {
                    sleep_until(ready).await;
                }
            }

            let step = self.shared.state.lock().await.next_step(Instant::now());
            match step {
                Step::Send(message) => {
                    if let Err(e) = sink.send(&message).await {
                        error!("Failure writing: {}", e);
                        return Err(Error::Write(e));
                    }
                    last_write = Some(Instant::now());
                }
                Step::Wait(Some(deadline)) => {
                    tokio::select! {
                        _ = self.shared.wake.notified() => {}
                        _ = sleep_until(deadline) => {}
                    }
                }
                Step::Wait(None) => self.shared.wake.notified().await,
            }
        }
    }

    /// Apply everything `source` yields until reading fails. Malformed
    /// frames are logged and skipped.
    pub async fn run_reader<S: MessageSource>(&self, source: &mut S) -> Result<()> {
        loop {
            match source.recv().await {
                Ok(message) => {
                    debug!("Read {:?}", message);
                    if self.shared.state.lock().await.on_inbound(&message) {
                        self.shared.wake.notify_one();
                    }
                }
                Err(e) if e.is_recoverable() => warn!("Ignoring malformed message: {}", e),
                Err(e) => {
                    error!("Failure reading: {}", e);
                    return Err(Error::Read(e));
                }
            }
        }
    }
}
