//! Per-side runtime
//!
//! One `Runtime` per side of the channel. It owns the class registry
//! handle, the weak instance registry, the id counter, the serializer and
//! the channel, and dispatches inbound command/message text. Mirrors
//! constructed on request of the other side are owned strongly here (they
//! have no other local owner); host-created instances are owned by the
//! caller and held weakly.
//!
//! Failure policy: messages for collected instances are dropped silently,
//! unknown signals and classes are logged and dropped, decode failures
//! surface to the caller. Nothing here may take down the channel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tether_core::{InstanceCounter, InstanceId, TetherResult, Value};
use tether_wire::{pair_ref_id, Command, PushMessage, Serializer, PAIR_REF_TAG};

use crate::{Channel, ClassRegistry, InstanceRegistry, Pair, Side};

/// Dispatch counters, cheap bookkeeping in the teacher's runtime style
#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub commands_in: u64,
    pub messages_in: u64,
    pub constructs: u64,
    pub applies: u64,
    pub link_toggles: u64,
    pub calls: u64,
    pub destroys: u64,
    pub dropped_unknown_instance: u64,
}

type CallHandler = Box<dyn Fn(&Arc<Pair>, &str) + Send + Sync>;

/// One side of the synchronization layer
pub struct Runtime {
    side: Side,
    classes: Arc<ClassRegistry>,
    instances: Arc<InstanceRegistry>,
    counter: InstanceCounter,
    channel: Arc<dyn Channel>,
    serializer: Arc<Serializer>,
    /// Strong ownership of mirrors constructed on behalf of the other side.
    owned: Mutex<HashMap<InstanceId, Arc<Pair>>>,
    call_handler: Mutex<Option<CallHandler>>,
    stats: Mutex<RuntimeStats>,
}

impl Runtime {
    pub fn new(side: Side, classes: Arc<ClassRegistry>, channel: Arc<dyn Channel>) -> Self {
        let instances = Arc::new(InstanceRegistry::new());

        let mut serializer = Serializer::new();
        let registry = Arc::clone(&instances);
        serializer.add_reviver(PAIR_REF_TAG, move |fields| {
            // A live instance revives to a reference; a collected one
            // becomes a null tombstone.
            let id = pair_ref_id(fields)?;
            registry.lookup(&id).map(|live| Value::PairRef(live.id().clone()))
        });

        Runtime {
            side,
            classes,
            instances,
            counter: InstanceCounter::new(),
            channel,
            serializer: Arc::new(serializer),
            owned: Mutex::new(HashMap::new()),
            call_handler: Mutex::new(None),
            stats: Mutex::new(RuntimeStats::default()),
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    pub fn instances(&self) -> &Arc<InstanceRegistry> {
        &self.instances
    }

    pub fn serializer(&self) -> &Arc<Serializer> {
        &self.serializer
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.lock().clone()
    }

    /// Install a handler for inbound arbitrary method calls.
    pub fn set_call_handler(&self, handler: impl Fn(&Arc<Pair>, &str) + Send + Sync + 'static) {
        *self.call_handler.lock() = Some(Box::new(handler));
    }

    /// Create a new pair instance of a registered class and announce it to
    /// the other side.
    pub fn create(&self, class_name: &str) -> TetherResult<Arc<Pair>> {
        self.create_with(class_name, |_| {})
    }

    /// Like [`create`](Self::create), with a pre-signal-init hook: it runs
    /// after the construct command is sent but before signal cells are
    /// initialized, so subscriptions made in the hook observe the initial
    /// values when initialization fires.
    pub fn create_with(
        &self,
        class_name: &str,
        hook: impl FnOnce(&Arc<Pair>),
    ) -> TetherResult<Arc<Pair>> {
        let class = self
            .classes
            .get(class_name)
            .ok_or_else(|| tether_core::TetherError::UnknownClass(class_name.to_owned()))?;

        let id = InstanceId::new(class_name, self.counter.next());
        let pair = Pair::new(
            id.clone(),
            class,
            self.side,
            Arc::clone(&self.channel),
            Arc::clone(&self.serializer),
        );
        self.instances.register(&pair);
        pair.mark_constructing();

        let construct = Command::Construct {
            id: id.clone(),
            class: class_name.to_owned(),
        };
        self.channel.execute_remote(&id, &construct.render());

        hook(&pair);
        pair.init_signals();
        Ok(pair)
    }

    /// Send an arbitrary method call to the remote half of an instance.
    pub fn call(&self, pair: &Pair, expression: &str) {
        let command = Command::Call {
            id: pair.id().clone(),
            expression: expression.to_owned(),
        };
        self.channel.execute_remote(pair.id(), &command.render());
    }

    /// Explicit teardown: notify the other side, then drop local
    /// bookkeeping. Plain drops skip the notification and leave a
    /// harmless orphan on the other side.
    pub fn destroy(&self, pair: &Arc<Pair>) {
        let command = Command::Destroy {
            id: pair.id().clone(),
        };
        self.channel.execute_remote(pair.id(), &command.render());
        self.instances.remove(pair.id());
        self.owned.lock().remove(pair.id());
    }

    /// Execute inbound command text from the other side.
    ///
    /// Parse and decode failures surface to the caller; everything else
    /// degrades with a log and leaves the instance in its last valid
    /// state.
    pub fn execute(&self, text: &str) -> TetherResult<()> {
        let command = Command::parse(text)?;
        self.stats.lock().commands_in += 1;

        match command {
            Command::Construct { id, class } => {
                self.stats.lock().constructs += 1;
                let Some(class) = self.classes.get(&class) else {
                    tracing::warn!(%id, "construct for unknown class dropped");
                    return Ok(());
                };
                if self.instances.lookup(&id).is_some() {
                    tracing::warn!(%id, "construct for an existing id, replacing");
                }
                let pair = Pair::new(
                    id.clone(),
                    class,
                    self.side,
                    Arc::clone(&self.channel),
                    Arc::clone(&self.serializer),
                );
                self.instances.register(&pair);
                pair.mark_constructing();
                pair.init_signals();
                self.owned.lock().insert(id, pair);
                Ok(())
            }
            Command::ApplyValue {
                id,
                signal,
                encoded,
            } => {
                self.stats.lock().applies += 1;
                let Some(pair) = self.lookup_or_drop(&id) else {
                    return Ok(());
                };
                let value = self.serializer.decode(&encoded)?;
                pair.apply_inbound(&signal, value);
                Ok(())
            }
            Command::LinkToggle { id, signal, link } => {
                self.stats.lock().link_toggles += 1;
                if let Some(pair) = self.lookup_or_drop(&id) {
                    pair.link_toggle(&signal, link);
                }
                Ok(())
            }
            Command::Call { id, expression } => {
                self.stats.lock().calls += 1;
                if let Some(pair) = self.lookup_or_drop(&id) {
                    match &*self.call_handler.lock() {
                        Some(handler) => handler(&pair, &expression),
                        None => {
                            tracing::debug!(%id, expression, "unhandled call dropped")
                        }
                    }
                }
                Ok(())
            }
            Command::Destroy { id } => {
                self.stats.lock().destroys += 1;
                // Absent id is a no-op: the two sides tear down
                // independently.
                self.owned.lock().remove(&id);
                self.instances.remove(&id);
                Ok(())
            }
        }
    }

    /// Handle inbound push-message text (`SIGNAL <id> <signal> <value>`).
    pub fn handle_message(&self, text: &str) -> TetherResult<()> {
        let message = PushMessage::parse(text)?;
        self.stats.lock().messages_in += 1;

        let Some(pair) = self.lookup_or_drop(&message.id) else {
            return Ok(());
        };
        let value = self.serializer.decode(&message.encoded)?;
        pair.apply_inbound(&message.signal, value);
        Ok(())
    }

    fn lookup_or_drop(&self, id: &InstanceId) -> Option<Arc<Pair>> {
        match self.instances.lookup(id) {
            Some(pair) => Some(pair),
            None => {
                // Expected under independent lifecycles: the target was
                // collected on this side.
                self.stats.lock().dropped_unknown_instance += 1;
                tracing::debug!(%id, "message for unknown instance dropped");
                None
            }
        }
    }
}
