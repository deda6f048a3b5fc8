//! Queueing loopback channel
//!
//! Outbound traffic is buffered in order until something drains it into
//! the other side - the same shape as a real transport's pending-command
//! queue before a connection exists.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tether_core::InstanceId;
use tether_sync::Channel;

/// In-memory channel half: everything sent is queued, in order
#[derive(Default)]
pub struct LoopbackChannel {
    commands: Mutex<VecDeque<String>>,
    messages: Mutex<VecDeque<String>>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        LoopbackChannel::default()
    }

    /// Take all queued command texts, oldest first.
    pub fn drain_commands(&self) -> Vec<String> {
        self.commands.lock().drain(..).collect()
    }

    /// Take all queued message texts, oldest first.
    pub fn drain_messages(&self) -> Vec<String> {
        self.messages.lock().drain(..).collect()
    }

    /// Peek without draining.
    pub fn pending_commands(&self) -> Vec<String> {
        self.commands.lock().iter().cloned().collect()
    }

    pub fn is_quiet(&self) -> bool {
        self.commands.lock().is_empty() && self.messages.lock().is_empty()
    }
}

impl Channel for LoopbackChannel {
    fn execute_remote(&self, _id: &InstanceId, command: &str) {
        self.commands.lock().push_back(command.to_owned());
    }

    fn send_message(&self, text: &str) {
        self.messages.lock().push_back(text.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let channel = LoopbackChannel::new();
        let id = InstanceId::from_wire("X1");
        channel.execute_remote(&id, "first");
        channel.execute_remote(&id, "second");
        channel.send_message("third");

        assert_eq!(channel.pending_commands(), vec!["first", "second"]);
        assert_eq!(channel.drain_commands(), vec!["first", "second"]);
        assert_eq!(channel.drain_messages(), vec!["third"]);
        assert!(channel.is_quiet());
    }
}
