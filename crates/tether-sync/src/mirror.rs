//! Class mirroring
//!
//! Runs once per class, at registration time. For every plain signal
//! declared on the host side, the companion descriptor gains a local-mirror
//! proxy; for every signal declared in the companion body, the host side
//! gains a remote-sourced proxy. Companion descriptors compose up the
//! inheritance chain (multiple bases allowed, later bases override earlier
//! on name conflict), and each registration produces an independent
//! descriptor - sibling subclasses never share one.
//!
//! Collisions with non-signal members never abort registration: the
//! offending proxy is omitted with a warning, and that signal simply will
//! not sync for the class.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tether_core::{
    ClassSpec, MemberSpec, SignalKind, SignalSpec, TetherError, TetherResult,
};
use tether_wire::Serializer;

use crate::Side;

/// Shared runtime prelude, emitted once per registry together with the
/// first root class definition.
const BOOTSTRAP: &str = "\
var tether = tether || {};
tether.classes = {};
tether.instances = {};
tether.serializer = new Serializer();
tether.serializer.add_reviver(\"Pair-Ref\", function (dct) { return tether.instances[dct.id]; });
";

/// The generated shape of the mirrored (guest) side of a class
#[derive(Clone, Debug, Default)]
pub struct CompanionDescriptor {
    pub signals: Vec<SignalSpec>,
    pub members: Vec<MemberSpec>,
}

impl CompanionDescriptor {
    pub fn signal(&self, name: &str) -> Option<&SignalSpec> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn member(&self, name: &str) -> Option<&MemberSpec> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Insert or replace a signal by name, preserving position on replace.
    fn overlay_signal(&mut self, spec: SignalSpec) {
        match self.signals.iter_mut().find(|s| s.name == spec.name) {
            Some(slot) => *slot = spec,
            None => self.signals.push(spec),
        }
    }

    /// Insert or replace a member by name, preserving position on replace.
    fn overlay_member(&mut self, spec: MemberSpec) {
        match self.members.iter_mut().find(|m| m.name == spec.name) {
            Some(slot) => *slot = spec,
            None => self.members.push(spec),
        }
    }
}

/// A registered class: host shape, companion descriptor, cached source
///
/// Immutable after registration.
pub struct MirroredClass {
    pub name: String,
    pub bases: Vec<Arc<MirroredClass>>,
    host_signals: Vec<SignalSpec>,
    host_members: Vec<MemberSpec>,
    companion: CompanionDescriptor,
    source: String,
}

impl MirroredClass {
    /// The signal set an instance carries on the given side.
    pub fn signals_for(&self, side: Side) -> &[SignalSpec] {
        match side {
            Side::Host => &self.host_signals,
            Side::Guest => &self.companion.signals,
        }
    }

    pub fn host_signal(&self, name: &str) -> Option<&SignalSpec> {
        self.host_signals.iter().find(|s| s.name == name)
    }

    pub fn host_member(&self, name: &str) -> Option<&MemberSpec> {
        self.host_members.iter().find(|m| m.name == name)
    }

    pub fn companion(&self) -> &CompanionDescriptor {
        &self.companion
    }

    /// The cached companion source blob (includes the shared bootstrap for
    /// the first root class registered).
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Class registry: explicit registration replaces metaclass hooks
#[derive(Default)]
pub struct ClassRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    classes: HashMap<String, Arc<MirroredClass>>,
    bootstrapped: bool,
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<MirroredClass>> {
        self.inner.lock().classes.get(name).cloned()
    }

    /// Register a class, deriving its companion descriptor and proxies.
    pub fn register(&self, spec: ClassSpec) -> TetherResult<Arc<MirroredClass>> {
        let mut inner = self.inner.lock();

        if inner.classes.contains_key(&spec.name) {
            return Err(TetherError::DuplicateClass(spec.name));
        }

        let mut bases = Vec::with_capacity(spec.bases.len());
        for base in &spec.bases {
            let resolved = inner.classes.get(base).cloned().ok_or_else(|| {
                TetherError::UnknownBase {
                    class: spec.name.clone(),
                    base: base.clone(),
                }
            })?;
            bases.push(resolved);
        }

        // Stage 1: merged companion base, linear composition. Later bases
        // override earlier ones on name conflict.
        let mut companion = CompanionDescriptor::default();
        for base in &bases {
            for signal in &base.companion.signals {
                companion.overlay_signal(signal.clone());
            }
            for member in &base.companion.members {
                companion.overlay_member(member.clone());
            }
        }

        // Stage 2: overlay this class's own companion declarations. Magic
        // members are skipped except the constructor and the two
        // serialization hooks, which are always inherited explicitly.
        for member in &spec.companion_members {
            if member.is_magic() && !member.role.always_carried() {
                continue;
            }
            companion.overlay_member(member.clone());
        }
        for signal in &spec.companion_signals {
            companion.overlay_signal(signal.clone());
        }

        // Host-side composition follows the same linear rule.
        let mut host = CompanionDescriptor::default();
        for base in &bases {
            for signal in &base.host_signals {
                host.overlay_signal(signal.clone());
            }
            for member in &base.host_members {
                host.overlay_member(member.clone());
            }
        }
        for member in &spec.host_members {
            host.overlay_member(member.clone());
        }
        for signal in &spec.host_signals {
            host.overlay_signal(signal.clone());
        }

        // Stage 3: local plain signals get local-mirror proxies on the
        // companion, unless shadowed there.
        for signal in &spec.host_signals {
            let Some(proxy) = signal.companion_proxy() else {
                continue;
            };
            if companion.member(&signal.name).is_some() {
                tracing::warn!(
                    class = %spec.name,
                    signal = %signal.name,
                    "host signal not proxied, it would hide a companion member"
                );
                continue;
            }
            match companion.signal(&signal.name) {
                None => companion.overlay_signal(proxy),
                Some(existing) if existing.kind.is_proxy() => {
                    // Overloaded up the chain; refresh with the override.
                    companion.overlay_signal(proxy);
                }
                Some(_) => {
                    tracing::warn!(
                        class = %spec.name,
                        signal = %signal.name,
                        "host signal not proxied, it would hide a companion signal"
                    );
                }
            }
        }

        // Stage 4: companion signals (as composed so far) get remote-sourced
        // proxies on the host side; symmetric collision rule.
        for signal in &companion.signals {
            if signal.kind.is_proxy() {
                continue;
            }
            if host.member(&signal.name).is_some() {
                tracing::warn!(
                    class = %spec.name,
                    signal = %signal.name,
                    "companion signal not proxied, it would hide a host member"
                );
                continue;
            }
            let proxy = SignalSpec::new(
                signal.name.as_str(),
                SignalKind::RemoteSourced,
                signal.initial.clone(),
            );
            match host.signal(&signal.name) {
                None => host.overlay_signal(proxy),
                Some(existing) if existing.kind == SignalKind::RemoteSourced => {
                    host.overlay_signal(proxy);
                }
                Some(_) => {
                    tracing::warn!(
                        class = %spec.name,
                        signal = %signal.name,
                        "companion signal not proxied, it would hide a host signal"
                    );
                }
            }
        }

        // Stage 5: generate and cache the companion source blob. The first
        // root class carries the shared runtime bootstrap.
        let with_bootstrap = bases.is_empty() && !inner.bootstrapped;
        let source = generate_source(&spec.name, &spec.bases, &companion, with_bootstrap);
        if with_bootstrap {
            inner.bootstrapped = true;
        }

        let class = Arc::new(MirroredClass {
            name: spec.name.clone(),
            bases,
            host_signals: host.signals,
            host_members: host.members,
            companion,
            source,
        });
        inner.classes.insert(spec.name, Arc::clone(&class));
        Ok(class)
    }

    /// Concatenated source for every registered class, bootstrap first.
    pub fn full_source(&self) -> String {
        let inner = self.inner.lock();
        let mut classes: Vec<_> = inner.classes.values().collect();
        // Bases sort before subclasses; the bootstrap-carrying root first.
        classes.sort_by_key(|c| {
            (
                !c.source.starts_with(BOOTSTRAP),
                depth(c),
                c.name.clone(),
            )
        });
        classes
            .iter()
            .map(|c| c.source.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn depth(class: &MirroredClass) -> usize {
    class
        .bases
        .iter()
        .map(|b| depth(b) + 1)
        .max()
        .unwrap_or(0)
}

/// Reify a companion descriptor as declaration text for the remote runtime.
fn generate_source(
    name: &str,
    bases: &[String],
    companion: &CompanionDescriptor,
    with_bootstrap: bool,
) -> String {
    let serializer = Serializer::new();
    let mut out = String::new();
    if with_bootstrap {
        out.push_str(BOOTSTRAP);
        out.push('\n');
    }

    let base_list = bases
        .iter()
        .map(|b| format!("\"{b}\""))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!(
        "tether.classes[\"{name}\"] = tether.define(\"{name}\", [{base_list}], {{\n"
    ));

    out.push_str("  signals: {\n");
    for signal in &companion.signals {
        let kind = match signal.kind {
            SignalKind::Plain => "plain",
            SignalKind::Input => "input",
            SignalKind::RemoteSourced => "remote-sourced",
            SignalKind::LocalMirror => "local-mirror",
            SignalKind::LocalMirrorInput => "local-mirror-input",
        };
        out.push_str(&format!(
            "    \"{}\": {{kind: \"{}\", initial: {}}},\n",
            signal.name,
            kind,
            serializer.encode(&signal.initial)
        ));
    }
    out.push_str("  },\n");

    out.push_str("  members: {\n");
    for member in &companion.members {
        let body = member.body.as_deref().unwrap_or("function () {}");
        out.push_str(&format!("    \"{}\": {},\n", member.name, body));
    }
    out.push_str("  },\n});\n");
    out
}

#[cfg(test)]
mod tests {
    use tether_core::{MemberRole, Value};

    use super::*;

    fn registry() -> ClassRegistry {
        ClassRegistry::new()
    }

    #[test]
    fn test_plain_signal_gets_companion_mirror() {
        let reg = registry();
        let class = reg
            .register(ClassSpec::new("Counter").signal("count", Value::Int(0)))
            .unwrap();

        let proxy = class.companion().signal("count").unwrap();
        assert_eq!(proxy.kind, SignalKind::LocalMirror);
        assert_eq!(proxy.initial, Value::Int(0));
        // Host side keeps the authoritative declaration.
        assert_eq!(class.host_signal("count").unwrap().kind, SignalKind::Plain);
    }

    #[test]
    fn test_input_signal_gets_drivable_mirror() {
        let reg = registry();
        let class = reg
            .register(ClassSpec::new("Slider").input("value", Value::Float(0.0)))
            .unwrap();
        assert_eq!(
            class.companion().signal("value").unwrap().kind,
            SignalKind::LocalMirrorInput
        );
    }

    #[test]
    fn test_companion_signal_gets_remote_sourced_proxy() {
        let reg = registry();
        let class = reg
            .register(ClassSpec::new("Mouse").companion_signal("pos", Value::Null))
            .unwrap();
        assert_eq!(
            class.host_signal("pos").unwrap().kind,
            SignalKind::RemoteSourced
        );
    }

    #[test]
    fn test_member_collision_warns_and_skips() {
        let reg = registry();
        // Companion declares a method named like the host signal: the proxy
        // must be omitted, registration must still succeed.
        let class = reg
            .register(
                ClassSpec::new("Clash")
                    .signal("draw", Value::Int(0))
                    .companion_member(MemberSpec::method("draw")),
            )
            .unwrap();
        assert!(class.companion().signal("draw").is_none());
        assert!(class.companion().member("draw").is_some());
        assert_eq!(class.host_signal("draw").unwrap().kind, SignalKind::Plain);
    }

    #[test]
    fn test_inherited_member_collision_is_tolerated() {
        let reg = registry();
        reg.register(
            ClassSpec::new("Base").companion_member(MemberSpec::method("total")),
        )
        .unwrap();
        let class = reg
            .register(
                ClassSpec::new("Child")
                    .base("Base")
                    .signal("total", Value::Int(0)),
            )
            .unwrap();
        // Still constructible; the colliding signal just does not sync.
        assert!(class.companion().signal("total").is_none());
        assert!(class.host_signal("total").is_some());
    }

    #[test]
    fn test_inheritance_composes_companions() {
        let reg = registry();
        reg.register(ClassSpec::new("Widget").signal("visible", Value::Bool(true)))
            .unwrap();
        let class = reg
            .register(
                ClassSpec::new("Button")
                    .base("Widget")
                    .signal("label", Value::Str("".into())),
            )
            .unwrap();

        assert!(class.companion().signal("visible").is_some());
        assert!(class.companion().signal("label").is_some());
        assert!(class.host_signal("visible").is_some());
    }

    #[test]
    fn test_later_base_overrides_earlier() {
        let reg = registry();
        reg.register(ClassSpec::new("A").signal("x", Value::Int(1)))
            .unwrap();
        reg.register(ClassSpec::new("B").signal("x", Value::Int(2)))
            .unwrap();
        let class = reg
            .register(ClassSpec::new("C").base("A").base("B"))
            .unwrap();
        assert_eq!(class.host_signal("x").unwrap().initial, Value::Int(2));
        assert_eq!(
            class.companion().signal("x").unwrap().initial,
            Value::Int(2)
        );
    }

    #[test]
    fn test_sibling_descriptors_are_independent() {
        let reg = registry();
        reg.register(ClassSpec::new("Base").signal("x", Value::Int(0)))
            .unwrap();
        let a = reg
            .register(ClassSpec::new("A").base("Base").signal("x", Value::Int(10)))
            .unwrap();
        let b = reg
            .register(ClassSpec::new("B").base("Base").signal("x", Value::Int(20)))
            .unwrap();

        assert_eq!(a.companion().signal("x").unwrap().initial, Value::Int(10));
        assert_eq!(b.companion().signal("x").unwrap().initial, Value::Int(20));
        // The base keeps its own.
        let base = reg.get("Base").unwrap();
        assert_eq!(
            base.companion().signal("x").unwrap().initial,
            Value::Int(0)
        );
    }

    #[test]
    fn test_magic_members_skipped_except_carried_hooks() {
        let reg = registry();
        let class = reg
            .register(
                ClassSpec::new("Ser")
                    .companion_member(MemberSpec::with_body(
                        "__init__",
                        MemberRole::Constructor,
                        "function (id) { this.id = id; }",
                    ))
                    .companion_member(MemberSpec::with_body(
                        "__to_wire__",
                        MemberRole::ToWire,
                        "function () { return {}; }",
                    ))
                    .companion_member(MemberSpec::with_body(
                        "__secret__",
                        MemberRole::Method,
                        "function () {}",
                    )),
            )
            .unwrap();
        assert!(class.companion().member("__init__").is_some());
        assert!(class.companion().member("__to_wire__").is_some());
        assert!(class.companion().member("__secret__").is_none());
    }

    #[test]
    fn test_duplicate_and_unknown_base_errors() {
        let reg = registry();
        reg.register(ClassSpec::new("X")).unwrap();
        assert!(matches!(
            reg.register(ClassSpec::new("X")),
            Err(TetherError::DuplicateClass(_))
        ));
        assert!(matches!(
            reg.register(ClassSpec::new("Y").base("Missing")),
            Err(TetherError::UnknownBase { .. })
        ));
    }

    #[test]
    fn test_bootstrap_emitted_once_with_first_root() {
        let reg = registry();
        let first = reg
            .register(ClassSpec::new("Root").signal("a", Value::Int(0)))
            .unwrap();
        let second = reg.register(ClassSpec::new("OtherRoot")).unwrap();
        let child = reg
            .register(ClassSpec::new("Child").base("Root"))
            .unwrap();

        assert!(first.source().contains("tether.serializer = new Serializer()"));
        assert!(!second.source().contains("new Serializer()"));
        assert!(!child.source().contains("new Serializer()"));
        assert!(child.source().contains("tether.classes[\"Child\"]"));

        // Cached: repeated reads are the same blob.
        assert_eq!(first.source(), reg.get("Root").unwrap().source());

        let full = reg.full_source();
        assert!(full.starts_with("var tether"));
        let root_at = full.find("tether.classes[\"Root\"]").unwrap();
        let child_at = full.find("tether.classes[\"Child\"]").unwrap();
        assert!(root_at < child_at);
    }

    #[test]
    fn test_source_blob_carries_signal_kinds_and_initials() {
        let reg = registry();
        let class = reg
            .register(
                ClassSpec::new("Mix")
                    .signal("count", Value::Int(3))
                    .companion_signal("pos", Value::Null),
            )
            .unwrap();
        let source = class.source();
        assert!(source.contains("\"count\": {kind: \"local-mirror\", initial: 3}"));
        assert!(source.contains("\"pos\": {kind: \"plain\", initial: null}"));
    }
}
