//! Tether Sync - the pair synchronization layer
//!
//! One logical object (a "Pair") lives as two cooperating runtime
//! instances, one per side of a message channel. Signals written on one
//! side propagate to the other automatically, with echo suppression and
//! lazy partial linking. This crate owns:
//! - The weak instance registry
//! - Class mirroring (companion descriptor construction, proxy synthesis)
//! - Pair instance lifecycle and the propagation protocol
//! - The per-side runtime with inbound command/message dispatch

pub mod channel;
pub mod mirror;
pub mod pair;
pub mod registry;
pub mod runtime;

pub use channel::*;
pub use mirror::*;
pub use pair::*;
pub use registry::*;
pub use runtime::*;
