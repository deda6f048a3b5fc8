//! Identity types for the pair synchronization layer
//!
//! Instance ids are human-readable strings of the form `<ClassName><counter>`
//! so that a command addressed to `Counter3` can be read off the wire directly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pair instance identity - `<ClassName><monotonic counter>`
///
/// Identifies one logical object across both sides of the channel.
/// Immutable once assigned; never reused within a process lifetime.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(String);

impl InstanceId {
    /// Build an id from a class name and a counter value.
    pub fn new(class_name: &str, seq: u64) -> Self {
        InstanceId(format!("{class_name}{seq}"))
    }

    /// Reconstruct an id received off the wire.
    pub fn from_wire(raw: impl Into<String>) -> Self {
        InstanceId(raw.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscription identity - unique per instance, used to detach a subscriber
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Strictly increasing instance counter
///
/// Atomic so that a multithreaded embedder constructing instances in
/// parallel still gets unique, never-reused ids. Explicitly owned by a
/// runtime rather than living in a global static.
#[derive(Debug, Default)]
pub struct InstanceCounter(AtomicU64);

impl InstanceCounter {
    pub fn new() -> Self {
        InstanceCounter(AtomicU64::new(0))
    }

    /// Take the next counter value (first call returns 1).
    #[inline]
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current high-water mark (number of ids issued so far).
    #[inline]
    pub fn issued(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_format() {
        let id = InstanceId::new("Counter", 3);
        assert_eq!(id.as_str(), "Counter3");
        assert_eq!(id.to_string(), "Counter3");
    }

    #[test]
    fn test_instance_id_wire_roundtrip() {
        let id = InstanceId::new("Widget", 12);
        let recovered = InstanceId::from_wire(id.as_str());
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_counter_strictly_increasing() {
        let counter = InstanceCounter::new();
        let a = counter.next();
        let b = counter.next();
        let c = counter.next();
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(counter.issued(), 3);
    }

    #[test]
    fn test_counter_unique_across_threads() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let counter = Arc::new(InstanceCounter::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                (0..100).map(|_| counter.next()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "counter reused a value");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
