/*!
 * Priority queue of outbound commands.
 */
use std::collections::VecDeque;

use sdn_devices::Message;

/// A message waiting to be sent, with its remaining attempts
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCommand {
    /// Message to send
    pub message: Message,
    /// Sends left; decremented each time it goes out expecting a reply
    pub retries: u32,
    /// Rank; 0 is served first
    pub priority: u8,
}

impl ScheduledCommand {
    /// Schedule `message`
    pub fn new(message: Message, retries: u32, priority: u8) -> Self {
        Self {
            message,
            retries,
            priority,
        }
    }
}

/// Commands ordered by ascending priority, first in first out within a rank
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<ScheduledCommand>,
}

impl CommandQueue {
    /// An empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert before the first entry of strictly lower rank. Returns false,
    /// leaving the queue untouched, if the same message is already queued.
    pub fn push(&mut self, command: ScheduledCommand) -> bool {
        if self.contains(&command.message) {
            return false;
        }
        let at = self
            .entries
            .iter()
            .position(|entry| entry.priority > command.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, command);
        true
    }

    /// Take the highest ranked command
    pub fn pop(&mut self) -> Option<ScheduledCommand> {
        self.entries.pop_front()
    }

    /// Whether an equal message is queued
    pub fn contains(&self, message: &Message) -> bool {
        self.entries.iter().any(|entry| entry.message == *message)
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued commands in send order
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledCommand> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdn_devices::message::{GetMotorIP, GetMotorPosition};
    use sdn_devices::Address;

    fn poll(ip: u8) -> Message {
        Message::new(Address::new([1, 2, 3]), GetMotorIP { ip })
    }

    #[test]
    fn test_priority_order_is_stable() {
        let mut queue = CommandQueue::new();
        for (ip, priority) in [(1, 5), (2, 0), (3, 3), (4, 0)] {
            assert!(queue.push(ScheduledCommand::new(poll(ip), 5, priority)));
        }
        let order: Vec<(u8, u8)> = std::iter::from_fn(|| queue.pop())
            .map(|command| match command.message.body {
                sdn_devices::Body::GetMotorIP(get) => (get.ip, command.priority),
                _ => (0, command.priority),
            })
            .collect();
        assert_eq!(order, vec![(2, 0), (4, 0), (3, 3), (1, 5)]);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut queue = CommandQueue::new();
        let message = Message::new(Address::new([1, 2, 3]), GetMotorPosition);
        assert!(queue.push(ScheduledCommand::new(message.clone(), 5, 1)));
        assert!(!queue.push(ScheduledCommand::new(message.clone(), 2, 0)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().map(|c| c.priority), Some(1));

        // Same kind, different target is not a duplicate
        assert!(queue.push(ScheduledCommand::new(Message::new(Address::new([1, 2, 4]), GetMotorPosition), 5, 1)));
        assert_eq!(queue.len(), 2);
    }
}
