//! Pair instance - lifecycle and propagation
//!
//! A pair instance is one half of a logical object. It owns its identity,
//! its signal cells, a handle to the channel, and the single-slot echo
//! suppression state. Lifecycle: Unbound -> Constructing -> Live, then
//! implicit collection (the registry holds it weakly).
//!
//! Propagation rules:
//! - A change to a proxy for the other side's signal never propagates
//!   back out (it is a mirror; it did not originate the change).
//! - Host-side changes go out as apply-value commands; guest-side changes
//!   go out as `SIGNAL` push messages. Guest signals with a leading
//!   underscore are private and never sync.
//! - An inbound apply engages the suppression slot before assigning, so
//!   the just-applied value is not re-sent to its origin.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tether_core::{
    EchoState, InstanceId, SignalCell, SignalKind, SubscribeEdge, SubscriptionId, TetherError,
    TetherResult, Value,
};
use tether_wire::{Command, PushMessage, Serializer};

use crate::{Channel, MirroredClass};

/// Which half of the pair this runtime hosts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Creates instances and drives the remote runtime via commands
    Host,
    /// The mirrored runtime; answers with `SIGNAL` push messages
    Guest,
}

/// Pair lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifeState {
    /// Created, id assigned, not yet announced to the other side
    Unbound,
    /// Construct command sent, signals not yet initialized
    Constructing,
    /// Steady state: propagating and accepting inbound mutations
    Live,
}

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// One half of a logical pair object
pub struct Pair {
    id: InstanceId,
    class: Arc<MirroredClass>,
    side: Side,
    channel: Arc<dyn Channel>,
    serializer: Arc<Serializer>,
    state: Mutex<PairState>,
}

struct PairState {
    life: LifeState,
    cells: HashMap<String, SignalCell>,
    subscribers: HashMap<String, Vec<(SubscriptionId, Callback)>>,
    echo: EchoState,
    next_sub: u64,
}

impl Pair {
    pub(crate) fn new(
        id: InstanceId,
        class: Arc<MirroredClass>,
        side: Side,
        channel: Arc<dyn Channel>,
        serializer: Arc<Serializer>,
    ) -> Arc<Pair> {
        let cells = class
            .signals_for(side)
            .iter()
            .map(|spec| (spec.name.clone(), SignalCell::new(spec)))
            .collect();
        Arc::new(Pair {
            id,
            class,
            side,
            channel,
            serializer,
            state: Mutex::new(PairState {
                life: LifeState::Unbound,
                cells,
                subscribers: HashMap::new(),
                echo: EchoState::Idle,
                next_sub: 0,
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    #[inline]
    pub fn class(&self) -> &Arc<MirroredClass> {
        &self.class
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn life(&self) -> LifeState {
        self.state.lock().life
    }

    /// Current value of a named signal.
    pub fn value(&self, signal: &str) -> TetherResult<Value> {
        let state = self.state.lock();
        state
            .cells
            .get(signal)
            .map(|cell| cell.value().clone())
            .ok_or_else(|| self.unknown_signal(signal))
    }

    /// Update timestamp of a named signal (0 = never set).
    pub fn timestamp(&self, signal: &str) -> TetherResult<u64> {
        let state = self.state.lock();
        state
            .cells
            .get(signal)
            .map(|cell| cell.timestamp())
            .ok_or_else(|| self.unknown_signal(signal))
    }

    /// Is the named signal currently linked?
    pub fn is_linked(&self, signal: &str) -> bool {
        self.state
            .lock()
            .cells
            .get(signal)
            .is_some_and(|cell| cell.is_linked())
    }

    /// Assign a value to a signal this side is allowed to drive.
    ///
    /// Proxies whose authoritative value lives on the other side reject
    /// direct assignment, except the drivable input mirror (best effort,
    /// not validated against the authoritative side).
    pub fn set(&self, signal: &str, value: Value) -> TetherResult<()> {
        {
            let state = self.state.lock();
            let cell = state
                .cells
                .get(signal)
                .ok_or_else(|| self.unknown_signal(signal))?;
            let rejected = match self.side {
                Side::Host => cell.kind == SignalKind::RemoteSourced,
                Side::Guest => cell.kind == SignalKind::LocalMirror,
            };
            if rejected {
                return Err(TetherError::NotAnInput {
                    id: self.id.clone(),
                    signal: signal.to_owned(),
                });
            }
        }
        self.commit(signal, value);
        Ok(())
    }

    /// Attach a subscriber callback to a signal.
    ///
    /// On a remote-sourced signal, the 0 -> 1 subscriber transition sends
    /// a link notification to the other side (lazy activation); interior
    /// subscriptions never re-notify.
    pub fn subscribe(
        &self,
        signal: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> TetherResult<SubscriptionId> {
        let (sub, link_edge) = {
            let mut state = self.state.lock();
            let cell = state
                .cells
                .get_mut(signal)
                .ok_or_else(|| self.unknown_signal(signal))?;
            let edge = cell.subscribe();
            let link = cell.kind == SignalKind::RemoteSourced
                && edge == SubscribeEdge::First
                && !cell.is_linked();
            if link {
                cell.set_linked(true);
            }
            state.next_sub += 1;
            let sub = SubscriptionId(state.next_sub);
            state
                .subscribers
                .entry(signal.to_owned())
                .or_default()
                .push((sub, Arc::new(callback)));
            (sub, link)
        };
        if link_edge {
            self.send_link(signal, true);
        }
        Ok(sub)
    }

    /// Detach a subscriber. The 1 -> 0 transition on a linked
    /// remote-sourced signal sends the unlink notification.
    pub fn unsubscribe(&self, signal: &str, sub: SubscriptionId) -> TetherResult<bool> {
        let (removed, unlink_edge) = {
            let mut state = self.state.lock();
            if !state.cells.contains_key(signal) {
                return Err(self.unknown_signal(signal));
            }
            let removed = match state.subscribers.get_mut(signal) {
                Some(subs) => {
                    let before = subs.len();
                    subs.retain(|(s, _)| *s != sub);
                    subs.len() < before
                }
                None => false,
            };
            let mut unlink = false;
            if removed {
                let cell = state.cells.get_mut(signal).expect("checked above");
                let edge = cell.unsubscribe();
                if cell.kind == SignalKind::RemoteSourced
                    && edge == SubscribeEdge::Last
                    && cell.is_linked()
                {
                    cell.set_linked(false);
                    unlink = true;
                }
            }
            (removed, unlink)
        };
        if unlink_edge {
            self.send_link(signal, false);
        }
        Ok(removed)
    }

    /// Announce-phase transition, driven by the runtime.
    pub(crate) fn mark_constructing(&self) {
        self.state.lock().life = LifeState::Constructing;
    }

    /// Initialize every signal cell with its declared initial value
    /// (timestamp lands at 1). Fires local subscriber callbacks but never
    /// produces outbound traffic. Transitions to Live.
    pub(crate) fn init_signals(&self) {
        let mut fired: Vec<(Value, Vec<Callback>)> = Vec::new();
        {
            let mut state = self.state.lock();
            for spec in self.class.signals_for(self.side) {
                if let Some(cell) = state.cells.get_mut(&spec.name) {
                    cell.init(spec.initial.clone());
                }
                let callbacks: Vec<Callback> = state
                    .subscribers
                    .get(&spec.name)
                    .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                    .unwrap_or_default();
                if !callbacks.is_empty() {
                    fired.push((spec.initial.clone(), callbacks));
                }
            }
            state.life = LifeState::Live;
        }
        for (value, callbacks) in fired {
            for callback in callbacks {
                callback(&value);
            }
        }
    }

    /// Inbound apply: engage echo suppression, then assign. An unknown
    /// signal name is a protocol error: logged, dropped, instance
    /// otherwise unaffected (and the slot stays disarmed).
    pub(crate) fn apply_inbound(&self, signal: &str, value: Value) {
        {
            let mut state = self.state.lock();
            if !state.cells.contains_key(signal) {
                tracing::warn!(
                    id = %self.id,
                    signal,
                    "apply for unknown signal dropped"
                );
                state.echo.release();
                return;
            }
            state.echo.engage();
        }
        self.commit(signal, value);
    }

    /// Inbound link/unlink notification. On a transition to linked with a
    /// value explicitly set before link, emits one catch-up propagation
    /// carrying the current value.
    pub(crate) fn link_toggle(&self, signal: &str, link: bool) {
        let catch_up = {
            let mut state = self.state.lock();
            let Some(cell) = state.cells.get_mut(signal) else {
                tracing::warn!(
                    id = %self.id,
                    signal,
                    "link toggle for unknown signal dropped"
                );
                return;
            };
            let was = cell.set_linked(link);
            if link && !was && cell.explicitly_set() {
                Some((cell.kind, cell.value().clone()))
            } else {
                None
            }
        };
        if let Some((kind, value)) = catch_up {
            if self.propagates(kind, signal) {
                self.send_value(signal, &value);
            }
        }
    }

    /// Shared write path: assign, consume the suppression slot, route
    /// outbound if this change originated here, fire local subscribers.
    fn commit(&self, signal: &str, value: Value) {
        let (suppressed, kind, callbacks) = {
            let mut state = self.state.lock();
            let Some(cell) = state.cells.get_mut(signal) else {
                return;
            };
            cell.set(value.clone());
            let kind = cell.kind;
            let suppressed = state.echo.consume();
            let callbacks: Vec<Callback> = state
                .subscribers
                .get(signal)
                .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default();
            (suppressed, kind, callbacks)
        };

        if !suppressed && self.propagates(kind, signal) {
            self.send_value(signal, &value);
        }
        for callback in callbacks {
            callback(&value);
        }
    }

    /// Does a change to this cell leave the process?
    fn propagates(&self, kind: SignalKind, signal: &str) -> bool {
        match self.side {
            // A remote-sourced proxy is a mirror: it did not originate the
            // change, so there is nothing to propagate.
            Side::Host => kind != SignalKind::RemoteSourced,
            // Plain mirrors never re-send; drivable input mirrors do.
            // Private guest signals stay local.
            Side::Guest => kind != SignalKind::LocalMirror && !signal.starts_with('_'),
        }
    }

    fn send_value(&self, signal: &str, value: &Value) {
        let encoded = self.serializer.encode(value);
        tracing::debug!(id = %self.id, signal, side = ?self.side, "propagating");
        match self.side {
            Side::Host => {
                let command = Command::ApplyValue {
                    id: self.id.clone(),
                    signal: signal.to_owned(),
                    encoded,
                };
                self.channel.execute_remote(&self.id, &command.render());
            }
            Side::Guest => {
                let message = PushMessage::new(self.id.clone(), signal, encoded);
                self.channel.send_message(&message.render());
            }
        }
    }

    fn send_link(&self, signal: &str, link: bool) {
        let command = Command::LinkToggle {
            id: self.id.clone(),
            signal: signal.to_owned(),
            link,
        };
        self.channel.execute_remote(&self.id, &command.render());
    }

    fn unknown_signal(&self, signal: &str) -> TetherError {
        TetherError::UnknownSignal {
            id: self.id.clone(),
            signal: signal.to_owned(),
        }
    }
}
