//! Writes through the session, checked against the registry tree

use crate::common::*;
use remreg::CreateAction;

// ============================================================================
// Keys
// ============================================================================

#[test]
fn test_create_key_then_list_parent() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKCU, "Software");
    let s = session(&registry);
    let software = key(&s, HKCU, "Software");

    let new = Key::child(&software, "Vendor");
    assert_eq!(s.create_key(&new).unwrap(), CreateAction::CreatedNew);
    assert_eq!(s.create_key(&new).unwrap(), CreateAction::OpenedExisting);

    let listing = s.list_key(&software).unwrap();
    assert_eq!(names(&listing.children), vec!["Vendor"]);
    assert!(registry.key_exists(HKCU, "Software\\Vendor"));
}

#[test]
fn test_remove_key_deletes_deepest_first() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "T\\x\\x1\\x11");
    registry.insert_key(HKLM, "T\\x\\x2");
    registry.insert_key(HKLM, "T\\y");
    registry.insert_key(HKLM, "Keep");
    let s = session(&registry);

    let deleted = s.remove_key(&key(&s, HKLM, "T")).unwrap();
    assert_eq!(deleted, 6);
    assert_eq!(
        registry.delete_log(),
        vec![
            "HKEY_LOCAL_MACHINE\\T\\x\\x1\\x11",
            "HKEY_LOCAL_MACHINE\\T\\x\\x1",
            "HKEY_LOCAL_MACHINE\\T\\x\\x2",
            "HKEY_LOCAL_MACHINE\\T\\x",
            "HKEY_LOCAL_MACHINE\\T\\y",
            "HKEY_LOCAL_MACHINE\\T",
        ]
    );
    assert!(!registry.key_exists(HKLM, "T"));
    assert!(registry.key_exists(HKLM, "Keep"));
}

#[test]
fn test_remove_key_stops_at_protected_subkey() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "T\\a");
    registry.insert_key(HKLM, "T\\b");
    registry.inject(Fault::new(Op::DeleteChild, StatusCode::ACCESS_DENIED).on("b"));
    let s = session(&registry);

    let err = s.remove_key(&key(&s, HKLM, "T")).unwrap_err();
    assert!(err.is_access_denied());
    assert!(!registry.key_exists(HKLM, "T\\a"));
    assert!(registry.key_exists(HKLM, "T\\b"));
    assert!(registry.key_exists(HKLM, "T"));
    assert_eq!(registry.live_handles(), 0);
}

#[test]
fn test_rename_key_refuses_then_reports_unsupported() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "P\\a");
    registry.insert_key(HKLM, "P\\b");
    let s = session(&registry);
    let a = key(&s, HKLM, "P\\a");

    assert!(matches!(s.rename_key(&a, "b"), Err(Error::InvalidOperation(_))));
    assert!(matches!(s.rename_key(&a, "c"), Err(Error::Unsupported { .. })));
    assert_eq!(a.name(), "a");
    assert!(s.rename_key(&a, "a").is_ok());
    assert_eq!(registry.child_names(HKLM, "P").unwrap(), vec!["a", "b"]);
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_set_then_list_returns_same_payload() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "K");
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let payloads = vec![
        ("sz", ValueData::String("hello".into())),
        ("expand", ValueData::ExpandString("%PATH%".into())),
        ("multi", ValueData::MultiString(vec!["a".into(), "b".into()])),
        ("dword", ValueData::Dword(0xdead_beef)),
        ("be", ValueData::DwordBigEndian(1)),
        ("qword", ValueData::Qword(u64::MAX)),
        ("bin", ValueData::Binary(vec![0, 1, 2, 255])),
    ];
    for (name, data) in &payloads {
        s.set_value(&Value::from_data(&k, *name, data)).unwrap();
    }

    let listing = s.list_key(&k).unwrap();
    for (name, data) in &payloads {
        let value = listing.values.iter().find(|v| v.name() == *name).unwrap();
        assert_eq!(value.kind(), data.value_type(), "{}", name);
        assert_eq!(&value.decode().unwrap(), data, "{}", name);
    }
}

#[test]
fn test_default_value_written_under_empty_name() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "K");
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let mut default = s.list_key(&k).unwrap().values.pop().unwrap();
    default.set_data(&ValueData::String("set".into()));
    s.set_value(&default).unwrap();

    assert_eq!(registry.value_names(HKLM, "K").unwrap(), vec![""]);
    let listing = s.list_key(&k).unwrap();
    assert_eq!(value_names(&listing.values), vec!["(Default)"]);
    assert_eq!(listing.values[0].data_string().unwrap(), "set");
}

#[test]
fn test_create_value_refuses_existing_name() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "v", &ValueData::Dword(1));
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let err = s.create_value(&Value::from_data(&k, "v", &ValueData::Dword(2))).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
    assert_eq!(registry.value(HKLM, "K", "v").unwrap().1, 1u32.to_le_bytes().to_vec());
}

#[test]
fn test_create_value_refuses_name_differing_in_case() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "dup", &ValueData::Dword(1));
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let err = s.create_value(&Value::from_data(&k, "DUP", &ValueData::Dword(2))).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
    assert_eq!(registry.value_names(HKLM, "K").unwrap(), vec!["dup"]);
    assert_eq!(registry.value(HKLM, "K", "dup").unwrap().1, 1u32.to_le_bytes().to_vec());
}

#[test]
fn test_default_and_literal_default_name_stay_apart() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "", &ValueData::String("real".into()));
    registry.insert_value(HKLM, "K", "(Default)", &ValueData::String("literal".into()));
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let mut values = s.list_key(&k).unwrap().values;
    assert_eq!(values.len(), 2);
    let default = values.iter_mut().find(|v| v.is_default()).unwrap();
    default.set_data(&ValueData::String("changed".into()));
    s.set_value(default).unwrap();

    assert_eq!(
        registry.value(HKLM, "K", "").unwrap().1,
        ValueData::String("changed".into()).encode()
    );
    assert_eq!(
        registry.value(HKLM, "K", "(Default)").unwrap().1,
        ValueData::String("literal".into()).encode()
    );
}

#[test]
fn test_rename_value_moves_payload() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "old", &ValueData::String("payload".into()));
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let mut value = s.list_key(&k).unwrap().values.remove(0);
    s.rename_value(&mut value, "new").unwrap();

    assert_eq!(value.name(), "new");
    assert_eq!(registry.value_names(HKLM, "K").unwrap(), vec!["new"]);
    assert_eq!(value.data_string().unwrap(), "payload");
}

#[test]
fn test_lossy_move_leaves_value_under_neither_name() {
    let registry = MemoryRegistry::new();
    registry.insert_value(HKLM, "K", "old", &ValueData::Dword(5));
    registry.inject(Fault::new(Op::SetValue, StatusCode::ACCESS_DENIED).on("new").once());
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let mut value = s.list_key(&k).unwrap().values.remove(0);
    match s.rename_value(&mut value, "new") {
        Err(Error::PartialMove { old_name, new_name, .. }) => {
            assert_eq!(old_name, "old");
            assert_eq!(new_name, "new");
        }
        other => panic!("expected PartialMove, got {:?}", other),
    }
    assert_eq!(value.name(), "old");
    assert!(registry.value_names(HKLM, "K").unwrap().is_empty());
    assert_eq!(registry.live_handles(), 0);
}

#[test]
fn test_unset_missing_value_is_not_found() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "K");
    let s = session(&registry);
    let k = key(&s, HKLM, "K");

    let err = s.unset_value(&Value::from_data(&k, "ghost", &ValueData::Dword(0))).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
