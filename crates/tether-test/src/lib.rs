//! Tether Test Harness - loopback transport and end-to-end validation
//!
//! This crate provides:
//! - A queueing loopback channel (the pending-command behavior of a real
//!   transport, without the transport)
//! - A twin harness wiring a host and a guest runtime back to back
//! - End-to-end synchronization scenarios

pub mod harness;
pub mod loopback;

#[cfg(test)]
mod integration;

pub use harness::*;
pub use loopback::*;
