//! Connection state machine and session lifetime

use crate::common::*;
use remreg::{AuthError, SessionConfig, CONFIG_FILE_NAME};
use std::sync::Arc;

#[test]
fn test_connect_from_config_file() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "Software");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    let config = SessionConfig {
        server: SERVER.to_string(),
        username: ACCOUNT.to_string(),
        progress_estimate: 10,
        ..SessionConfig::default()
    };
    config.write_to_file(&path).unwrap();
    let loaded = SessionConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    init_tracing();
    let connector = MemoryConnector::new(registry.clone(), SERVER).with_account(ACCOUNT, PASSWORD);
    let conn = Connection::new(Arc::new(connector), loaded.session_options());
    let s = conn.connect(&loaded.connect_params(PASSWORD).unwrap()).unwrap();

    assert_eq!(s.server(), SERVER);
    let listing = s.list_key(&s.root(HKLM).unwrap()).unwrap();
    assert_eq!(names(&listing.children), vec!["Software"]);
}

#[test]
fn test_failed_logon_leaves_no_handles() {
    let registry = MemoryRegistry::new();
    let conn = connection(&registry);
    let bad = ConnectParams::new(SERVER, TransportKind::Smb, Credentials::parse(ACCOUNT, "nope"));

    let err = conn.connect(&bad).err().unwrap();
    assert!(matches!(err, Error::Auth(AuthError::LogonFailure)));
    assert_eq!(err.to_string(), "Failed to connect: Invalid username or password.");
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(registry.live_root_handles(), 0);
}

#[test]
fn test_root_open_failure_closes_opened_roots() {
    let registry = MemoryRegistry::new();
    registry.inject(Fault::new(Op::OpenRoot, StatusCode::ACCESS_DENIED).on("HKEY_USERS"));
    let conn = connection(&registry);

    assert!(conn.connect(&params()).is_err());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(registry.live_root_handles(), 0);
    assert_eq!(registry.stats().root_closes, 3);
}

#[test]
fn test_reconnect_invalidates_old_keys() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKCU, "Console");
    let conn = connection(&registry);

    let first = conn.connect(&params()).unwrap();
    let console = key(&first, HKCU, "Console");
    assert!(first.list_key(&console).is_ok());

    let second = conn.connect(&params()).unwrap();
    assert!(matches!(second.list_key(&console), Err(Error::StaleKey { .. })));
    assert!(first.list_key(&console).is_err());
    assert!(second.list_key(&key(&second, HKCU, "Console")).is_ok());
    assert_eq!(registry.live_root_handles(), 5);
}

#[test]
fn test_lost_transport_disconnects() {
    let registry = MemoryRegistry::new();
    registry.insert_key(HKLM, "A");
    let conn = connection(&registry);
    let s = conn.connect(&params()).unwrap();
    let root = s.root(HKLM).unwrap();
    let a = key(&s, HKLM, "A");

    registry.sever();
    let err = s.list_key(&a).unwrap_err();
    assert!(err.is_connection_lost());
    assert!(!s.is_connected());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(matches!(s.list_key(&root), Err(Error::Disconnected)));
    assert!(matches!(s.root(HKLM), Err(Error::Disconnected)));
}

#[test]
fn test_disconnect_then_operations_fail() {
    let registry = MemoryRegistry::new();
    let conn = connection(&registry);
    let s = conn.connect(&params()).unwrap();
    let root = s.root(HKLM).unwrap();

    conn.disconnect().unwrap();
    conn.disconnect().unwrap();
    assert!(matches!(s.list_key(&root), Err(Error::Disconnected)));
    assert!(matches!(conn.session(), Err(Error::Disconnected)));
    assert_eq!(registry.live_root_handles(), 0);
}
