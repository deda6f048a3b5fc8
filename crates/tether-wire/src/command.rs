//! Remote command vocabulary
//!
//! Commands cross the channel as text and address instances by id:
//!
//! ```text
//! instances["Counter1"] = new Counter("Counter1")
//! instances["Counter1"]._set_signal_from_py("count", "5")
//! instances["Counter1"]._link_js_signal("count", true)
//! instances["Counter1"].reset()
//! delete instances["Counter1"]
//! ```
//!
//! Push messages travel the opposite direction over the message channel:
//!
//! ```text
//! SIGNAL Counter1 count 5
//! ```
//!
//! Rendering and parsing are strict inverses for everything except `Call`,
//! whose expression is carried opaquely.

use tether_core::{InstanceId, TetherError, TetherResult};

const SET_SIGNAL_METHOD: &str = "_set_signal_from_py";
const LINK_SIGNAL_METHOD: &str = "_link_js_signal";

/// A command for the remote runtime
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Instantiate the mirror object under the given id
    Construct { id: InstanceId, class: String },
    /// Assign an encoded value to the named signal, echo-suppressed
    ApplyValue {
        id: InstanceId,
        signal: String,
        encoded: String,
    },
    /// Toggle linked bookkeeping for the named signal
    LinkToggle {
        id: InstanceId,
        signal: String,
        link: bool,
    },
    /// Arbitrary method call, carried as an opaque expression
    Call { id: InstanceId, expression: String },
    /// Drop the mirror object (explicit teardown notification)
    Destroy { id: InstanceId },
}

impl Command {
    /// The instance this command is addressed to.
    pub fn target(&self) -> &InstanceId {
        match self {
            Command::Construct { id, .. }
            | Command::ApplyValue { id, .. }
            | Command::LinkToggle { id, .. }
            | Command::Call { id, .. }
            | Command::Destroy { id } => id,
        }
    }

    /// Render to command text.
    pub fn render(&self) -> String {
        match self {
            Command::Construct { id, class } => {
                format!("instances[\"{id}\"] = new {class}(\"{id}\")")
            }
            Command::ApplyValue {
                id,
                signal,
                encoded,
            } => {
                // The encoded value is embedded as a JSON string literal so
                // arbitrary payload text survives the framing.
                let literal = serde_json::to_string(encoded).expect("string literal");
                format!("instances[\"{id}\"].{SET_SIGNAL_METHOD}(\"{signal}\", {literal})")
            }
            Command::LinkToggle { id, signal, link } => {
                format!("instances[\"{id}\"].{LINK_SIGNAL_METHOD}(\"{signal}\", {link})")
            }
            Command::Call { id, expression } => {
                format!("instances[\"{id}\"].{expression}")
            }
            Command::Destroy { id } => format!("delete instances[\"{id}\"]"),
        }
    }

    /// Parse command text.
    pub fn parse(text: &str) -> TetherResult<Command> {
        let malformed = |what: &str| TetherError::MalformedCommand(format!("{what}: {text}"));

        if let Some(rest) = text.strip_prefix("delete instances[\"") {
            let id = rest
                .strip_suffix("\"]")
                .ok_or_else(|| malformed("unterminated delete target"))?;
            return Ok(Command::Destroy {
                id: InstanceId::from_wire(id),
            });
        }

        let rest = text
            .strip_prefix("instances[\"")
            .ok_or_else(|| malformed("unknown command shape"))?;
        let (id, rest) = rest
            .split_once("\"]")
            .ok_or_else(|| malformed("unterminated instance id"))?;
        let id = InstanceId::from_wire(id);

        if let Some(rest) = rest.strip_prefix(" = new ") {
            let (class, args) = rest
                .split_once('(')
                .ok_or_else(|| malformed("constructor without arguments"))?;
            let ctor_id = args
                .strip_prefix('"')
                .and_then(|a| a.strip_suffix("\")"))
                .ok_or_else(|| malformed("bad constructor argument"))?;
            if ctor_id != id.as_str() {
                return Err(malformed("constructor id mismatch"));
            }
            return Ok(Command::Construct {
                id,
                class: class.to_owned(),
            });
        }

        let expression = rest
            .strip_prefix('.')
            .ok_or_else(|| malformed("missing member access"))?;

        if let Some(args) = expression
            .strip_prefix(SET_SIGNAL_METHOD)
            .and_then(|e| e.strip_prefix('('))
        {
            let (signal, literal) = parse_signal_arg(args).ok_or_else(|| malformed("bad apply arguments"))?;
            let literal = literal
                .strip_suffix(')')
                .ok_or_else(|| malformed("unterminated apply"))?;
            let encoded: String = serde_json::from_str(literal)
                .map_err(|e| malformed(&format!("bad payload literal ({e})")))?;
            return Ok(Command::ApplyValue {
                id,
                signal,
                encoded,
            });
        }

        if let Some(args) = expression
            .strip_prefix(LINK_SIGNAL_METHOD)
            .and_then(|e| e.strip_prefix('('))
        {
            let (signal, flag) = parse_signal_arg(args).ok_or_else(|| malformed("bad link arguments"))?;
            let link = match flag {
                "true)" => true,
                "false)" => false,
                _ => return Err(malformed("bad link flag")),
            };
            return Ok(Command::LinkToggle { id, signal, link });
        }

        // Anything else is an arbitrary method call; carried verbatim.
        Ok(Command::Call {
            id,
            expression: expression.to_owned(),
        })
    }
}

/// Split `"<signal>", <rest>` into the signal name and the remainder.
/// Signal names are identifiers, so scanning to the closing quote is safe.
fn parse_signal_arg(args: &str) -> Option<(String, &str)> {
    let args = args.strip_prefix('"')?;
    let (signal, rest) = args.split_once('"')?;
    let rest = rest.strip_prefix(", ")?;
    Some((signal.to_owned(), rest))
}

/// Guest -> host push message: a mirrored signal changed on the guest side
#[derive(Clone, Debug, PartialEq)]
pub struct PushMessage {
    pub id: InstanceId,
    pub signal: String,
    pub encoded: String,
}

impl PushMessage {
    pub fn new(id: InstanceId, signal: impl Into<String>, encoded: impl Into<String>) -> Self {
        PushMessage {
            id,
            signal: signal.into(),
            encoded: encoded.into(),
        }
    }

    /// Render to message text: `SIGNAL <id> <signal> <encoded>`.
    pub fn render(&self) -> String {
        format!("SIGNAL {} {} {}", self.id, self.signal, self.encoded)
    }

    /// Parse message text. The encoded value may itself contain spaces, so
    /// only the first three tokens are split off.
    pub fn parse(text: &str) -> TetherResult<PushMessage> {
        let malformed = |what: &str| TetherError::MalformedMessage(format!("{what}: {text}"));

        let rest = text
            .strip_prefix("SIGNAL ")
            .ok_or_else(|| malformed("unknown message kind"))?;
        let mut parts = rest.splitn(3, ' ');
        let id = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| malformed("missing id"))?;
        let signal = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("missing signal name"))?;
        let encoded = parts.next().ok_or_else(|| malformed("missing payload"))?;

        Ok(PushMessage {
            id: InstanceId::from_wire(id),
            signal: signal.to_owned(),
            encoded: encoded.to_owned(),
        })
    }
}
