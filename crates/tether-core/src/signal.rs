//! Signal model
//!
//! A signal is a named reactive value cell with a current value and a
//! monotonically increasing update timestamp. The kind decides which side
//! of the channel is authoritative and how changes route:
//! - `Plain`/`Input` are authoritative where they are declared.
//! - `RemoteSourced` is a host-side proxy for a guest signal; it carries a
//!   linked flag and only syncs while something local subscribes to it.
//! - `LocalMirror`/`LocalMirrorInput` are guest-side proxies mirroring a
//!   host signal; the Input variant may also be driven directly on the
//!   guest side (best effort, no validation against the host).

use crate::Value;

/// Signal flavor - decides authority and propagation behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Authoritative where declared; changes propagate outward
    Plain,
    /// Plain signal that also accepts external assignment
    Input,
    /// Host-side proxy for a guest signal; lazily linked
    RemoteSourced,
    /// Guest-side proxy mirroring a host plain signal
    LocalMirror,
    /// Guest-side proxy mirroring a host input signal; guest may drive it too
    LocalMirrorInput,
}

impl SignalKind {
    /// Is this a proxy for a signal owned by the other side?
    #[inline]
    pub fn is_proxy(self) -> bool {
        matches!(
            self,
            SignalKind::RemoteSourced | SignalKind::LocalMirror | SignalKind::LocalMirrorInput
        )
    }

    /// Does this kind accept direct external assignment?
    #[inline]
    pub fn is_input(self) -> bool {
        matches!(self, SignalKind::Input | SignalKind::LocalMirrorInput)
    }

    /// The proxy kind the companion side gets for this signal, if any.
    pub fn companion_proxy(self) -> Option<SignalKind> {
        match self {
            SignalKind::Plain => Some(SignalKind::LocalMirror),
            SignalKind::Input => Some(SignalKind::LocalMirrorInput),
            _ => None,
        }
    }
}

/// Signal declaration - the unit class descriptors are built from
#[derive(Clone, Debug, PartialEq)]
pub struct SignalSpec {
    pub name: String,
    pub kind: SignalKind,
    pub initial: Value,
}

impl SignalSpec {
    pub fn new(name: impl Into<String>, kind: SignalKind, initial: Value) -> Self {
        SignalSpec {
            name: name.into(),
            kind,
            initial,
        }
    }

    /// Plain signal with an initial value.
    pub fn plain(name: impl Into<String>, initial: Value) -> Self {
        SignalSpec::new(name, SignalKind::Plain, initial)
    }

    /// Input signal with an initial value.
    pub fn input(name: impl Into<String>, initial: Value) -> Self {
        SignalSpec::new(name, SignalKind::Input, initial)
    }

    /// The private naming convention: leading-underscore signals never sync.
    #[inline]
    pub fn is_private(&self) -> bool {
        self.name.starts_with('_')
    }

    /// Derive the proxy spec the companion side gets, if this kind mirrors.
    pub fn companion_proxy(&self) -> Option<SignalSpec> {
        self.kind.companion_proxy().map(|kind| SignalSpec {
            name: self.name.clone(),
            kind,
            initial: self.initial.clone(),
        })
    }
}

/// Runtime signal cell
///
/// Timestamp semantics: 0 = never set, 1 = construction-time initial value,
/// >= 2 = explicitly written since construction. The catch-up emission on
/// link only fires for timestamps above 1, so a freshly constructed default
/// never produces one.
#[derive(Clone, Debug)]
pub struct SignalCell {
    pub name: String,
    pub kind: SignalKind,
    value: Value,
    timestamp: u64,
    subscribers: u64,
    linked: bool,
}

/// Subscriber-count transition reported by subscribe/unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeEdge {
    /// Count moved 0 -> 1
    First,
    /// Count moved 1 -> 0
    Last,
    /// No boundary crossed
    Interior,
}

impl SignalCell {
    pub fn new(spec: &SignalSpec) -> Self {
        SignalCell {
            name: spec.name.clone(),
            kind: spec.kind,
            value: Value::Null,
            timestamp: 0,
            subscribers: 0,
            linked: false,
        }
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    #[inline]
    pub fn subscriber_count(&self) -> u64 {
        self.subscribers
    }

    /// Has this cell been written since construction-time initialization?
    #[inline]
    pub fn explicitly_set(&self) -> bool {
        self.timestamp > 1
    }

    /// Assign a value, bumping the timestamp.
    pub fn set(&mut self, value: Value) {
        self.value = value;
        self.timestamp += 1;
    }

    /// Construction-time initialization (timestamp lands at exactly 1).
    pub fn init(&mut self, value: Value) {
        self.value = value;
        self.timestamp = 1;
    }

    /// Record a subscriber; reports whether the 0 -> 1 edge was crossed.
    pub fn subscribe(&mut self) -> SubscribeEdge {
        self.subscribers += 1;
        if self.subscribers == 1 {
            SubscribeEdge::First
        } else {
            SubscribeEdge::Interior
        }
    }

    /// Remove a subscriber; reports whether the 1 -> 0 edge was crossed.
    pub fn unsubscribe(&mut self) -> SubscribeEdge {
        self.subscribers = self.subscribers.saturating_sub(1);
        if self.subscribers == 0 {
            SubscribeEdge::Last
        } else {
            SubscribeEdge::Interior
        }
    }

    /// Toggle the linked flag; returns the previous state.
    pub fn set_linked(&mut self, linked: bool) -> bool {
        std::mem::replace(&mut self.linked, linked)
    }
}

/// Per-instance echo suppression slot
///
/// Single-slot by contract: at most one "ignore next local emit" at a time,
/// consumed exactly once. Overlapping updates to the same signal from both
/// directions within one turn are outside the supported model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EchoState {
    #[default]
    Idle,
    SuppressNext,
}

impl EchoState {
    /// Arm the slot: the next local emit will be swallowed.
    pub fn engage(&mut self) {
        *self = EchoState::SuppressNext;
    }

    /// Consume the slot. Returns true if an emit should be suppressed.
    pub fn consume(&mut self) -> bool {
        match *self {
            EchoState::SuppressNext => {
                *self = EchoState::Idle;
                true
            }
            EchoState::Idle => false,
        }
    }

    /// Disarm without consuming (e.g. the guarded assignment never happened).
    pub fn release(&mut self) {
        *self = EchoState::Idle;
    }
}
