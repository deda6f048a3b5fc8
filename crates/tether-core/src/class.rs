//! Class declarations
//!
//! A Pair class is declared as plain data: the signals and members of its
//! host-side body, the signals and members of its companion (guest-side)
//! body, and the names of its base classes. Companion descriptors are
//! derived from these declarations at registration time - there is no
//! metaclass magic, just an explicit registration step.

use crate::{SignalSpec, Value};

/// Role of a non-signal class member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberRole {
    /// Ordinary method
    Method,
    /// Constructor - always carried over during companion composition
    Constructor,
    /// Serialization hook (value -> wire) - always carried over
    ToWire,
    /// Serialization hook (wire -> value) - always carried over
    FromWire,
}

impl MemberRole {
    /// Hooks that companion composition must inherit explicitly, regardless
    /// of the naming convention that otherwise excludes magic members.
    #[inline]
    pub fn always_carried(self) -> bool {
        !matches!(self, MemberRole::Method)
    }
}

/// A named non-signal member of a class body
///
/// Members participate in collision detection (a member shadows any proxy
/// signal of the same name) and in companion source generation.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberSpec {
    pub name: String,
    pub role: MemberRole,
    /// Source text reified into the companion blob; None for host members.
    pub body: Option<String>,
}

impl MemberSpec {
    pub fn method(name: impl Into<String>) -> Self {
        MemberSpec {
            name: name.into(),
            role: MemberRole::Method,
            body: None,
        }
    }

    pub fn with_body(name: impl Into<String>, role: MemberRole, body: impl Into<String>) -> Self {
        MemberSpec {
            name: name.into(),
            role,
            body: Some(body.into()),
        }
    }

    /// Magic-member convention: double-underscore names are skipped during
    /// companion overlay unless the role is always-carried.
    #[inline]
    pub fn is_magic(&self) -> bool {
        self.name.starts_with("__")
    }
}

/// Declaration of a Pair class, registered once per class
#[derive(Clone, Debug, Default)]
pub struct ClassSpec {
    pub name: String,
    /// Base class names, in declaration order (multiple inheritance allowed).
    pub bases: Vec<String>,
    /// Signals declared in the host-side body.
    pub host_signals: Vec<SignalSpec>,
    /// Non-signal members of the host-side body.
    pub host_members: Vec<MemberSpec>,
    /// Signals declared in the companion (guest-side) body.
    pub companion_signals: Vec<SignalSpec>,
    /// Non-signal members of the companion body.
    pub companion_members: Vec<MemberSpec>,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> Self {
        ClassSpec {
            name: name.into(),
            ..ClassSpec::default()
        }
    }

    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.bases.push(name.into());
        self
    }

    pub fn signal(mut self, name: impl Into<String>, initial: Value) -> Self {
        self.host_signals.push(SignalSpec::plain(name, initial));
        self
    }

    pub fn input(mut self, name: impl Into<String>, initial: Value) -> Self {
        self.host_signals.push(SignalSpec::input(name, initial));
        self
    }

    pub fn member(mut self, member: MemberSpec) -> Self {
        self.host_members.push(member);
        self
    }

    pub fn companion_signal(mut self, name: impl Into<String>, initial: Value) -> Self {
        self.companion_signals.push(SignalSpec::plain(name, initial));
        self
    }

    pub fn companion_member(mut self, member: MemberSpec) -> Self {
        self.companion_members.push(member);
        self
    }

    /// Look up a host-side signal declaration by name.
    pub fn host_signal(&self, name: &str) -> Option<&SignalSpec> {
        self.host_signals.iter().find(|s| s.name == name)
    }

    /// Look up a companion-side signal declaration by name.
    pub fn companion_signal_named(&self, name: &str) -> Option<&SignalSpec> {
        self.companion_signals.iter().find(|s| s.name == name)
    }
}
