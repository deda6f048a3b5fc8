//! Tether Core - Fundamental types for the pair synchronization layer
//!
//! This crate defines the types shared by the rest of the workspace:
//! - Identifiers (InstanceId, InstanceCounter, SubscriptionId)
//! - The wire-expressible value domain (Value)
//! - The signal model (SignalKind, SignalSpec, SignalCell, EchoState)
//! - Class declarations (ClassSpec, MemberSpec)
//! - Error taxonomy

pub mod class;
pub mod error;
pub mod id;
pub mod signal;
pub mod value;

pub use class::*;
pub use error::*;
pub use id::*;
pub use signal::*;
pub use value::*;
