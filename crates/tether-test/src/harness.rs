//! Twin harness: a host and a guest runtime wired back to back
//!
//! Each side writes into its own loopback channel; `pump` moves the
//! queued texts into the opposite side's dispatch, in order, until both
//! directions are quiescent. Delivery is synchronous and ordered - the
//! ordering guarantee the layer expects from a real transport.

use std::sync::Arc;

use tether_core::TetherResult;
use tether_sync::{Channel, ClassRegistry, Runtime, Side};

use crate::LoopbackChannel;

/// Two runtimes and the channels between them
pub struct TwinHarness {
    pub host: Runtime,
    pub guest: Runtime,
    pub host_out: Arc<LoopbackChannel>,
    pub guest_out: Arc<LoopbackChannel>,
}

impl TwinHarness {
    /// Build both sides over a shared class registry (the guest side of a
    /// real deployment learns classes from the generated source blob; here
    /// both halves read the same descriptors).
    pub fn new(classes: Arc<ClassRegistry>) -> Self {
        let host_out = Arc::new(LoopbackChannel::new());
        let guest_out = Arc::new(LoopbackChannel::new());

        let host = Runtime::new(
            Side::Host,
            Arc::clone(&classes),
            Arc::clone(&host_out) as Arc<dyn Channel>,
        );
        let guest = Runtime::new(
            Side::Guest,
            classes,
            Arc::clone(&guest_out) as Arc<dyn Channel>,
        );

        TwinHarness {
            host,
            guest,
            host_out,
            guest_out,
        }
    }

    /// Deliver queued traffic in both directions until quiescent.
    /// Returns the number of texts delivered.
    pub fn pump(&self) -> TetherResult<usize> {
        let mut delivered = 0;
        loop {
            let mut moved = false;

            for command in self.host_out.drain_commands() {
                self.guest.execute(&command)?;
                delivered += 1;
                moved = true;
            }
            for message in self.host_out.drain_messages() {
                self.guest.handle_message(&message)?;
                delivered += 1;
                moved = true;
            }
            for command in self.guest_out.drain_commands() {
                self.host.execute(&command)?;
                delivered += 1;
                moved = true;
            }
            for message in self.guest_out.drain_messages() {
                self.host.handle_message(&message)?;
                delivered += 1;
                moved = true;
            }

            if !moved {
                return Ok(delivered);
            }
        }
    }

    /// Both directions idle?
    pub fn is_quiescent(&self) -> bool {
        self.host_out.is_quiet() && self.guest_out.is_quiet()
    }
}
