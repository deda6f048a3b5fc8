//! Channel boundary
//!
//! The transport/connection manager is an external collaborator. This
//! layer only requires two fire-and-forget calls and never blocks on a
//! remote reply. Message ordering is a contract placed on the transport,
//! not provided here.

use tether_core::InstanceId;

/// Transport seam between the two sides of a pair
pub trait Channel: Send + Sync {
    /// Submit a command for execution by the remote runtime, addressed to
    /// an instance. Fire-and-forget; no acknowledgment is awaited.
    fn execute_remote(&self, id: &InstanceId, command: &str);

    /// Send a raw text message over the message channel (the guest -> host
    /// `SIGNAL` path). Fire-and-forget.
    fn send_message(&self, text: &str);
}

/// Channel that discards all traffic. Useful for one-sided setups (e.g.
/// exporting the generated companion source without a live connection).
#[derive(Debug, Default)]
pub struct NullChannel;

impl Channel for NullChannel {
    fn execute_remote(&self, _id: &InstanceId, _command: &str) {}

    fn send_message(&self, _text: &str) {}
}
