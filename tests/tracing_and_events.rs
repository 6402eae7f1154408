//! Integration tests for tracing and event monitoring.
//!
//! The trace callback sees every slow-path registry operation, which is
//! useful for debugging construction races.

use singleton_pool::{BoundedPool, RegistryEvent, SingletonRegistry};
use std::sync::{Arc, Mutex};

fn recording(registry: &SingletonRegistry) -> Arc<Mutex<Vec<RegistryEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    registry.set_trace_callback(move |event| {
        events_clone.lock().unwrap().push(event.clone());
    });
    events
}

#[test]
fn test_basic_tracing() {
    let registry = SingletonRegistry::new();
    let events = recording(&registry);

    registry.get_or_init("pool", BoundedPool::default).unwrap();
    let _ = registry.get::<BoundedPool>(&"pool");
    let _ = registry.contains(&"pool");

    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 4);
    assert!(matches!(captured[0], RegistryEvent::Construct { .. }));
    assert!(matches!(captured[1], RegistryEvent::Publish { .. }));
    assert!(matches!(captured[2], RegistryEvent::Get { found: true, .. }));
    assert!(matches!(captured[3], RegistryEvent::Contains { found: true, .. }));
}

#[test]
fn test_fast_path_is_silent() {
    let registry = SingletonRegistry::new();
    registry.get_or_init("pool", BoundedPool::default).unwrap();

    let events = recording(&registry);
    for _ in 0..10 {
        registry.get_or_init("pool", BoundedPool::default).unwrap();
    }

    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_trace_failed_construction() {
    let registry = SingletonRegistry::new();
    let events = recording(&registry);

    let _ = registry.get_instance("pool", || Err::<BoundedPool, _>("no backend"));

    let captured = events.lock().unwrap();
    assert_eq!(
        *captured,
        vec![
            RegistryEvent::Construct {
                key: "\"pool\"".to_string(),
                type_name: std::any::type_name::<BoundedPool>(),
            },
            RegistryEvent::ConstructionFailed {
                key: "\"pool\"".to_string(),
            },
        ]
    );
}

#[test]
fn test_trace_get_found_and_not_found() {
    let registry = SingletonRegistry::new();
    let events = recording(&registry);

    registry.get_or_init("n", || 1i64).unwrap();
    let _ = registry.get::<i64>(&"n");
    let _ = registry.get::<i64>(&"missing");

    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 4);
    assert_eq!(captured[2].to_string(), "get { key: \"n\", found: true }");
    assert_eq!(captured[3].to_string(), "get { key: \"missing\", found: false }");
}

#[test]
fn test_trace_reentrant_factory() {
    let registry = SingletonRegistry::new();
    let events = recording(&registry);

    let _ = registry.get_instance("self", || registry.get_or_init("self", || 0u8).map(|v| *v));

    let captured = events.lock().unwrap();
    assert!(captured
        .iter()
        .any(|e| matches!(e, RegistryEvent::Reentered { .. })));
    assert!(matches!(
        captured.last(),
        Some(RegistryEvent::ConstructionFailed { .. })
    ));
}

#[test]
fn test_trace_callback_replacement() {
    let registry = SingletonRegistry::new();
    let first = recording(&registry);
    registry.get_or_init("a", || 1u8).unwrap();

    let second = recording(&registry);
    registry.get_or_init("b", || 2u8).unwrap();

    assert_eq!(first.lock().unwrap().len(), 2);
    assert_eq!(second.lock().unwrap().len(), 2);
}

#[test]
fn test_clear_trace_callback() {
    let registry = SingletonRegistry::new();
    let events = recording(&registry);

    registry.get_or_init("a", || 1u8).unwrap();
    registry.clear_trace_callback();
    registry.get_or_init("b", || 2u8).unwrap();
    let _ = registry.contains(&"b");

    assert_eq!(events.lock().unwrap().len(), 2);
}
