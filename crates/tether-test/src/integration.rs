//! End-to-end synchronization scenarios
//!
//! Each test wires a host and a guest runtime through loopback channels
//! and pumps traffic to quiescence between assertions.

use std::sync::Arc;

use parking_lot::Mutex;
use tether_core::{ClassSpec, InstanceId, MemberSpec, Value};
use tether_sync::ClassRegistry;

use crate::TwinHarness;

fn counter_classes() -> Arc<ClassRegistry> {
    let classes = Arc::new(ClassRegistry::new());
    classes
        .register(
            ClassSpec::new("Counter")
                .signal("count", Value::Int(0))
                .companion_signal("mouse_pos", Value::Null),
        )
        .unwrap();
    classes
}

#[test]
fn test_counter_scenario() {
    let twin = TwinHarness::new(counter_classes());

    // Construct: registry lookup resolves, a construct command is queued.
    let c1 = twin.host.create("Counter").unwrap();
    assert!(Arc::ptr_eq(
        &twin.host.instances().lookup(c1.id()).unwrap(),
        &c1
    ));
    assert_eq!(
        twin.host_out.pending_commands(),
        vec![format!(r#"instances["{}"] = new Counter("{}")"#, c1.id(), c1.id())]
    );
    twin.pump().unwrap();

    // Set count = 5: exactly one apply command.
    c1.set("count", Value::Int(5)).unwrap();
    assert_eq!(
        twin.host_out.pending_commands(),
        vec![format!(
            r#"instances["{}"]._set_signal_from_py("count", "5")"#,
            c1.id()
        )]
    );
    twin.pump().unwrap();

    // Mirror converged, and applying it generated no further traffic.
    let mirror = twin.guest.instances().lookup(c1.id()).unwrap();
    assert_eq!(mirror.value("count").unwrap(), Value::Int(5));
    assert!(twin.is_quiescent());
    assert_eq!(twin.guest.stats().applies, 1);
}

#[test]
fn test_echo_suppression_holds_over_cascades() {
    let twin = TwinHarness::new(counter_classes());
    let c1 = twin.host.create("Counter").unwrap();
    twin.pump().unwrap();

    let mirror = twin.guest.instances().lookup(c1.id()).unwrap();
    // A guest-side consumer reacting to the applied value writes ANOTHER
    // signal; that cascade is free to propagate, the applied signal is not.
    let mirror_for_cb = Arc::clone(&mirror);
    mirror
        .subscribe("count", move |v| {
            if let Value::Int(n) = v {
                mirror_for_cb
                    .set("mouse_pos", Value::Int(n * 10))
                    .unwrap();
            }
        })
        .unwrap();

    c1.set("count", Value::Int(3)).unwrap();
    let delivered = twin.pump().unwrap();
    // One apply out, one cascaded push back - and nothing echoed.
    assert_eq!(delivered, 2);
    assert_eq!(mirror.value("count").unwrap(), Value::Int(3));
    assert_eq!(c1.value("mouse_pos").unwrap(), Value::Int(30));
    assert!(twin.is_quiescent());
}

#[test]
fn test_lazy_linking_and_catch_up() {
    let twin = TwinHarness::new(counter_classes());
    let c1 = twin.host.create("Counter").unwrap();
    twin.pump().unwrap();
    let mirror = twin.guest.instances().lookup(c1.id()).unwrap();

    // Nothing subscribes yet: no link notification has ever been sent.
    assert_eq!(twin.host.stats().link_toggles, 0);
    assert!(!mirror.is_linked("mouse_pos"));

    // The guest writes while the host is not linked.
    mirror.set("mouse_pos", Value::Int(42)).unwrap();
    twin.pump().unwrap();
    assert_eq!(c1.value("mouse_pos").unwrap(), Value::Int(42));

    // First subscriber: one link notification; the guest answers with one
    // catch-up emission carrying the current value, not the initial null.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = c1
        .subscribe("mouse_pos", move |v| sink.lock().push(v.clone()))
        .unwrap();
    let delivered = twin.pump().unwrap();
    assert_eq!(delivered, 2); // link toggle out, catch-up back
    assert!(mirror.is_linked("mouse_pos"));
    assert_eq!(*seen.lock(), vec![Value::Int(42)]);

    // Last unsubscriber: exactly one unlink.
    c1.unsubscribe("mouse_pos", sub).unwrap();
    let delivered = twin.pump().unwrap();
    assert_eq!(delivered, 1);
    assert!(!mirror.is_linked("mouse_pos"));
}

#[test]
fn test_colliding_signal_does_not_sync_but_nothing_breaks() {
    let classes = Arc::new(ClassRegistry::new());
    classes
        .register(
            ClassSpec::new("Clash")
                .signal("draw", Value::Int(0))
                .companion_member(MemberSpec::method("draw")),
        )
        .unwrap();
    let twin = TwinHarness::new(classes);

    // Still constructible.
    let pair = twin.host.create("Clash").unwrap();
    twin.pump().unwrap();
    let mirror = twin.guest.instances().lookup(pair.id()).unwrap();
    assert!(mirror.value("draw").is_err(), "collided proxy must not exist");

    // The host-side write goes out, the guest drops it as an unknown
    // signal, and the channel survives.
    pair.set("draw", Value::Int(1)).unwrap();
    twin.pump().unwrap();
    assert!(twin.is_quiescent());
    assert_eq!(pair.value("draw").unwrap(), Value::Int(1));
}

#[test]
fn test_sibling_subclasses_sync_independently() {
    let classes = Arc::new(ClassRegistry::new());
    classes
        .register(ClassSpec::new("Base").signal("x", Value::Int(0)))
        .unwrap();
    classes
        .register(ClassSpec::new("A").base("Base").signal("x", Value::Int(1)))
        .unwrap();
    classes
        .register(ClassSpec::new("B").base("Base").signal("x", Value::Int(2)))
        .unwrap();
    let twin = TwinHarness::new(classes);

    let a = twin.host.create("A").unwrap();
    let b = twin.host.create("B").unwrap();
    twin.pump().unwrap();

    let a_mirror = twin.guest.instances().lookup(a.id()).unwrap();
    let b_mirror = twin.guest.instances().lookup(b.id()).unwrap();
    assert_eq!(a_mirror.value("x").unwrap(), Value::Int(1));
    assert_eq!(b_mirror.value("x").unwrap(), Value::Int(2));

    a.set("x", Value::Int(100)).unwrap();
    twin.pump().unwrap();
    assert_eq!(a_mirror.value("x").unwrap(), Value::Int(100));
    assert_eq!(b_mirror.value("x").unwrap(), Value::Int(2));
}

#[test]
fn test_pair_references_cross_the_wire() {
    let classes = Arc::new(ClassRegistry::new());
    classes
        .register(ClassSpec::new("Node").signal("child", Value::Null))
        .unwrap();
    let twin = TwinHarness::new(classes);

    let parent = twin.host.create("Node").unwrap();
    let child = twin.host.create("Node").unwrap();
    twin.pump().unwrap();

    parent
        .set("child", Value::PairRef(child.id().clone()))
        .unwrap();
    twin.pump().unwrap();

    let parent_mirror = twin.guest.instances().lookup(parent.id()).unwrap();
    assert_eq!(
        parent_mirror.value("child").unwrap(),
        Value::PairRef(child.id().clone())
    );

    // Destroy the referenced pair: a re-sent reference revives to a
    // tombstone on the guest side.
    let child_id = child.id().clone();
    twin.host.destroy(&child);
    twin.pump().unwrap();
    parent.set("child", Value::PairRef(child_id)).unwrap();
    twin.pump().unwrap();
    assert_eq!(parent_mirror.value("child").unwrap(), Value::Null);
}

#[test]
fn test_stale_traffic_after_collection_is_tolerated() {
    let twin = TwinHarness::new(counter_classes());
    let c1 = twin.host.create("Counter").unwrap();
    let id = c1.id().clone();
    twin.pump().unwrap();

    // The host half goes away without any teardown notification; the
    // guest half lives on as an orphan.
    drop(c1);
    assert!(twin.guest.instances().lookup(&id).is_some());

    // Late guest traffic addressed to the collected host half: no-op.
    let mirror = twin.guest.instances().lookup(&id).unwrap();
    mirror.set("mouse_pos", Value::Int(9)).unwrap();
    twin.pump().unwrap();
    assert_eq!(twin.host.stats().dropped_unknown_instance, 1);
}

#[test]
fn test_explicit_destroy_reaches_the_other_side() {
    let twin = TwinHarness::new(counter_classes());
    let c1 = twin.host.create("Counter").unwrap();
    let id = c1.id().clone();
    twin.pump().unwrap();
    assert!(twin.guest.instances().lookup(&id).is_some());

    twin.host.destroy(&c1);
    twin.pump().unwrap();
    assert!(twin.guest.instances().lookup(&id).is_none());
    assert!(twin.host.instances().lookup(&id).is_none());
}

#[test]
fn test_full_source_exports_for_the_guest() {
    let classes = counter_classes();
    let twin = TwinHarness::new(Arc::clone(&classes));
    let _c1 = twin.host.create("Counter").unwrap();

    let source = classes.full_source();
    assert!(source.starts_with("var tether"));
    assert!(source.contains("tether.classes[\"Counter\"]"));
    assert!(source.contains("\"count\": {kind: \"local-mirror\", initial: 0}"));
}
