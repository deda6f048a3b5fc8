//! Error types for the pair synchronization layer

use thiserror::Error;

use crate::InstanceId;

/// Tether errors
///
/// Most inbound failure modes are not errors at all: a message addressed to
/// a collected instance is silently dropped, an unknown signal name is
/// logged and dropped. The variants here cover the paths where a caller has
/// to decide (decode failures) or where an API was used wrongly (duplicate
/// class registration, unknown base).
#[derive(Error, Debug)]
pub enum TetherError {
    // Codec errors
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error("Malformed push message: {0}")]
    MalformedMessage(String),

    // Class registration errors
    #[error("Class already registered: {0}")]
    DuplicateClass(String),

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Unknown base {base} for class {class}")]
    UnknownBase { class: String, base: String },

    // Instance errors
    #[error("Unknown instance: {0}")]
    UnknownInstance(InstanceId),

    #[error("Unknown signal {signal} on instance {id}")]
    UnknownSignal { id: InstanceId, signal: String },

    #[error("Signal {signal} on instance {id} does not accept direct assignment")]
    NotAnInput { id: InstanceId, signal: String },
}

/// Result type for tether operations
pub type TetherResult<T> = Result<T, TetherError>;
