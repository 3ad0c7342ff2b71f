//! Listings through the enumeration pager

use crate::common::*;
use proptest::prelude::*;

const N: usize = 7;

fn listed(page_size: usize) -> (KeyListing, usize) {
    let registry = MemoryRegistry::new();
    populate(&registry, HKLM, "Software\\Vendor", N);
    registry.set_page_size(page_size);
    let s = session(&registry);
    registry.reset_accounting();

    let listing = s.list_key(&key(&s, HKLM, "Software\\Vendor")).unwrap();
    (listing, registry.stats().round_trips)
}

// ============================================================================
// Page size independence
// ============================================================================

#[test]
fn test_same_listing_for_every_page_size() {
    let mut expected_values = expected_names("v", N);
    expected_values.push("(Default)".to_string());

    for page_size in [1, 2, N, N + 1] {
        let (listing, _) = listed(page_size);
        assert_eq!(names(&listing.children), expected_names("k", N), "page size {}", page_size);
        assert_eq!(value_names(&listing.values), expected_values, "page size {}", page_size);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_listing_independent_of_page_size(n in 0usize..20, page in 1usize..24) {
        let registry = MemoryRegistry::new();
        populate(&registry, HKCU, "P", n);
        registry.set_page_size(page);
        let s = session(&registry);

        let listing = s.list_key(&key(&s, HKCU, "P")).unwrap();
        prop_assert_eq!(names(&listing.children), expected_names("k", n));
        prop_assert_eq!(listing.values.len(), n + 1);
        prop_assert_eq!(registry.live_handles(), 0);
    }
}

#[test]
fn test_small_pages_cost_more_round_trips() {
    let (_, one) = listed(1);
    let (_, all) = listed(N + 1);
    assert!(one > all, "page size 1 took {} round trips, N+1 took {}", one, all);
}

#[test]
fn test_empty_key_lists_only_default() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKCU, "Empty");
    registry.set_page_size(1);
    let s = session(&registry);

    let listing = s.list_key(&key(&s, HKCU, "Empty")).unwrap();
    assert!(listing.children.is_empty());
    assert_eq!(value_names(&listing.values), vec!["(Default)"]);
}

#[test]
fn test_custom_end_of_list_code() {
    let registry = MemoryRegistry::new();
    populate(&registry, HKLM, "K", 3);
    registry.set_end_of_list(StatusCode(0x8000_1234));
    let s = session(&registry);

    let listing = s.list_key(&key(&s, HKLM, "K")).unwrap();
    assert_eq!(names(&listing.children), expected_names("k", 3));
}

// ============================================================================
// Default value and payloads
// ============================================================================

#[test]
fn test_server_default_is_renamed_not_duplicated() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "a", &ValueData::Dword(1));
    registry.insert_value(HKLM, "K", "", &ValueData::String("dflt".into()));
    let s = session(&registry);

    let listing = s.list_key(&key(&s, HKLM, "K")).unwrap();
    assert_eq!(value_names(&listing.values), vec!["a", "(Default)"]);
    let default = &listing.values[1];
    assert!(default.is_default());
    assert_eq!(default.decode().unwrap(), ValueData::String("dflt".into()));
}

#[test]
fn test_missing_default_is_synthesized_empty_string() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "a", &ValueData::Dword(1));
    let s = session(&registry);

    let listing = s.list_key(&key(&s, HKLM, "K")).unwrap();
    let default = listing.values.last().unwrap();
    assert_eq!(default.name(), "(Default)");
    assert_eq!(default.kind(), ValueType::String);
    assert!(default.raw_data().is_empty());
}

#[test]
fn test_literal_default_name_is_not_the_default() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "(Default)", &ValueData::Dword(7));
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let listing = s.list_key(&k).unwrap();
    assert_eq!(listing.values.iter().filter(|v| v.is_default()).count(), 1);
    let mut literal = listing.values.into_iter().find(|v| !v.is_default()).unwrap();
    assert_eq!(literal.name(), "(Default)");

    literal.set_data(&ValueData::Dword(8));
    s.set_value(&literal).unwrap();
    assert_eq!(registry.value_names(HKLM, "K").unwrap(), vec!["(Default)"]);
    assert_eq!(registry.value(HKLM, "K", "(Default)").unwrap().1, 8u32.to_le_bytes().to_vec());
}

#[test]
fn test_padded_payloads_are_truncated() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "n", &ValueData::Qword(42));
    registry.insert_value(HKLM, "K", "s", &ValueData::String("abc".into()));
    registry.set_value_padding(16);
    let s = session(&registry);

    let listing = s.list_key(&key(&s, HKLM, "K")).unwrap();
    assert_eq!(listing.values[0].raw_data().len(), 8);
    assert_eq!(listing.values[0].decode().unwrap(), ValueData::Qword(42));
    assert_eq!(listing.values[1].decode().unwrap(), ValueData::String("abc".into()));
}

// ============================================================================
// Progress
// ============================================================================

#[test]
fn test_progress_is_monotonic_and_ends_at_one() {
    let registry = MemoryRegistry::new();
    populate(&registry, HKLM, "K", 5);
    registry.set_page_size(2);
    let s = session_with(&registry, SessionOptions { progress_estimate: 10 });
    let ui = Recorder::new();

    s.list_key_with(&key(&s, HKLM, "K"), Some(ui.as_ref() as &dyn UiNotifier), Default::default())
        .unwrap();

    let progress = ui.progress();
    assert_eq!(progress.len(), 6);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(1.0));
    assert_eq!(
        ui.statuses().last().map(String::as_str),
        Some("Successfully fetched keys and values of K")
    );
}

#[test]
fn test_progress_capped_by_estimate() {
    let registry = MemoryRegistry::new();
    populate(&registry, HKLM, "K", 6);
    let s = session_with(&registry, SessionOptions { progress_estimate: 3 });
    let ui = Recorder::new();

    s.list_key_with(&key(&s, HKLM, "K"), Some(ui.as_ref() as &dyn UiNotifier), Default::default())
        .unwrap();

    // indices 0..3 fall under the estimate, then the final 1.0
    assert_eq!(ui.progress().len(), 4);
    assert!(ui.progress().iter().all(|p| *p <= 1.0));
    assert_eq!(ui.statuses().iter().filter(|s| s.starts_with("Fetching key: ")).count(), 6);
}
