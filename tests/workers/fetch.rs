//! Fetch workers

use crate::common::*;
use remreg::FetchWorker;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_fetch_delivers_children_then_values() {
    let registry = MemoryRegistry::new();
    populate(&registry, HKCU, "Environment", 3);
    let s = session(&registry);
    let queue = EventQueue::new();
    let ui = Recorder::new();

    let handle = FetchWorker::spawn(
        Arc::clone(&s),
        key(&s, HKCU, "Environment"),
        Arc::new(queue.notifier(Origin::Fetch)),
    )
    .unwrap();
    let listing = handle.join().unwrap().unwrap();
    assert_eq!(names(&listing.children), expected_names("k", 3));

    assert!(pump_until(&queue, &ui, WAIT, |ui| ui
        .events()
        .iter()
        .any(|e| matches!(e, UiEvent::Values(_)))));
    assert_eq!(ui.listed(), vec!["HKEY_CURRENT_USER\\Environment"]);
    assert!(ui
        .statuses()
        .contains(&"Successfully fetched keys and values of Environment".to_string()));
    assert_eq!(ui.progress().last().copied(), Some(1.0));
}

#[test]
fn test_concurrent_fetches_never_overlap_remote_calls() {
    let registry = MemoryRegistry::new();
    for name in ["A", "B", "C", "D"] {
        populate(&registry, HKLM, name, 4);
    }
    registry.set_page_size(2);
    let s = session(&registry);
    registry.set_call_delay(Duration::from_millis(1));
    registry.reset_accounting();
    let queue = EventQueue::new();

    let handles: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .map(|name| {
            FetchWorker::spawn(
                Arc::clone(&s),
                key(&s, HKLM, name),
                Arc::new(queue.notifier(Origin::Fetch)),
            )
            .unwrap()
        })
        .collect();

    for handle in handles {
        let listing = handle.join().unwrap().unwrap();
        assert_eq!(listing.children.len(), 4);
    }
    let stats = registry.stats();
    assert_eq!(stats.max_in_flight, 1, "{:?}", stats);
    assert_eq!(stats.opens, 4);
    assert_eq!(stats.closes, 4);
    assert_eq!(registry.live_handles(), 0);
}

#[test]
fn test_superseded_fetch_results_are_not_applied() {
    let registry = MemoryRegistry::new();
    populate(&registry, HKLM, "First", 2);
    populate(&registry, HKLM, "Second", 1);
    let s = session(&registry);
    let queue = EventQueue::new();
    let ui = Recorder::new();

    let old = Arc::new(queue.notifier(Origin::Fetch));
    let new = Arc::new(queue.notifier(Origin::Fetch));
    let first = FetchWorker::spawn(Arc::clone(&s), key(&s, HKLM, "First"), old).unwrap();
    let second = FetchWorker::spawn(Arc::clone(&s), key(&s, HKLM, "Second"), new).unwrap();
    assert!(first.join().unwrap().is_some());
    assert!(second.join().unwrap().is_some());

    queue.drain_into(ui.as_ref());
    assert_eq!(ui.listed(), vec!["HKEY_LOCAL_MACHINE\\Second"]);
    let values: Vec<_> = ui
        .events()
        .into_iter()
        .filter(|e| matches!(e, UiEvent::Values(_)))
        .collect();
    assert_eq!(values.len(), 1);
    // status lines of both fetches still reach the UI
    let statuses = ui.statuses();
    assert!(statuses.contains(&"Successfully fetched keys and values of First".to_string()));
    assert!(statuses.contains(&"Successfully fetched keys and values of Second".to_string()));
}

#[test]
fn test_fetch_of_deleted_key_reports_failure() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "Gone");
    let s = session(&registry);
    let gone = key(&s, HKLM, "Gone");
    s.remove_key(&gone).unwrap();
    let queue = EventQueue::new();
    let ui = Recorder::new();

    let handle = FetchWorker::spawn(Arc::clone(&s), gone, Arc::new(queue.notifier(Origin::Fetch))).unwrap();
    assert!(handle.join().unwrap().is_none());

    queue.drain_into(ui.as_ref());
    assert_eq!(
        ui.errors(),
        vec!["Failure in the secondary thread: not found: HKEY_LOCAL_MACHINE\\Gone."]
    );
    assert!(ui.listed().is_empty());
    assert_eq!(registry.live_handles(), 0);
}

#[test]
fn test_fetch_after_disconnect_fails_cleanly() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "A");
    let s = session(&registry);
    let a = key(&s, HKLM, "A");
    s.disconnect().unwrap();
    let queue = EventQueue::new();
    let ui = Recorder::new();

    let handle = FetchWorker::spawn(s, a, Arc::new(queue.notifier(Origin::Fetch))).unwrap();
    assert!(handle.join().unwrap().is_none());

    queue.drain_into(ui.as_ref());
    assert_eq!(ui.errors(), vec!["Failure in the secondary thread: not connected."]);
}
