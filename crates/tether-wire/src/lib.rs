//! Tether Wire - command vocabulary and value serialization
//!
//! This crate provides:
//! - The textual remote command vocabulary (construct, apply-value,
//!   link-toggle, arbitrary call, destroy), rendered and parsed
//! - The `SIGNAL` push-message framing for the guest -> host return path
//! - The JSON value serializer with an extensible reviver registry

pub mod command;
pub mod serial;

pub use command::*;
pub use serial::*;
