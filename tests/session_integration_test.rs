//! End-to-end scenarios exercising the public `Runtime` API across
//! multiple sessions and users.

use std::sync::Arc;
use std::time::Duration;

use quakedb_core::config::RuntimeConfig;
use quakedb_core::error::QuakeError;
use quakedb_core::ports::InMemoryStorageBackend;
use quakedb_core::registry::RegistryError;
use quakedb_core::session::SessionError;
use quakedb_core::types::ColumnValue;
use quakedb_core::Runtime;

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default(), Arc::new(InMemoryStorageBackend::new()))
}

#[test]
fn scenario_start_session_and_submit_work() {
    let rt = runtime();
    rt.bootstrap_user("adminQkDB", "Quake17", "admin@quakedb.test").unwrap();
    rt.start_session("adminQkDB", "Quake17", None).unwrap();

    assert!(rt.check_user_process("adminQkDB", "Quake17"));

    rt.add_tuple("adminQkDB", "Quake17", 1, vec![ColumnValue::Int(1)], vec![false], None).unwrap();
    rt.add_table(
        "adminQkDB",
        "Quake17",
        vec![1],
        vec![0],
        vec!["col_a".to_string()],
        1,
        None,
    )
    .unwrap();

    rt.wait_for_all_processes_to_finish();
}

#[test]
fn scenario_start_session_with_invalid_user_fails() {
    let rt = runtime();
    rt.bootstrap_user("adminQkDB", "Quake17", "admin@quakedb.test").unwrap();

    let err = rt.start_session("adminQkDB", "wrong-password", None).unwrap_err();
    assert!(matches!(err, QuakeError::Session(SessionError::AuthenticationFailed { .. })));
    assert!(!rt.check_user_process("adminQkDB", "Quake17"));
}

#[test]
fn scenario_multiple_concurrent_sessions() {
    let rt = runtime();
    rt.bootstrap_user("alice", "alice-pass", "alice@quakedb.test").unwrap();
    rt.bootstrap_user("bob", "bob-pass", "bob@quakedb.test").unwrap();

    rt.start_session("alice", "alice-pass", None).unwrap();
    rt.start_session("bob", "bob-pass", None).unwrap();

    rt.add_tuple("alice", "alice-pass", 10, vec![ColumnValue::Text("alice-row".into())], vec![false], None).unwrap();
    rt.add_tuple("bob", "bob-pass", 20, vec![ColumnValue::Text("bob-row".into())], vec![false], None).unwrap();

    assert!(rt.check_user_process("alice", "alice-pass"));
    assert!(rt.check_user_process("bob", "bob-pass"));

    rt.wait_for_all_processes_to_finish();

    assert!(!rt.check_user_process("alice", "alice-pass"));
    assert!(!rt.check_user_process("bob", "bob-pass"));
}

#[test]
fn scenario_wait_for_all_processes_to_finish_retains_registry() {
    let rt = runtime();
    rt.bootstrap_user("adminQkDB", "Quake17", "admin@quakedb.test").unwrap();
    rt.start_session("adminQkDB", "Quake17", None).unwrap();

    rt.wait_for_all_processes_to_finish();

    let sessions = rt.debug_dump_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0], ("adminQkDB".to_string(), false));
}

#[test]
fn scenario_dispatch_against_unknown_session_is_reported() {
    let rt = runtime();
    let err = rt.add_tuple("ghost", "nope", 1, vec![], vec![], None).unwrap_err();
    assert!(matches!(err, QuakeError::Registry(RegistryError::NoMatchingSession { .. })));
}

#[test]
fn scenario_sessions_with_different_ttls_expire_independently() {
    let rt = runtime();
    rt.bootstrap_user("short", "s-pass", "short@quakedb.test").unwrap();
    rt.bootstrap_user("long", "l-pass", "long@quakedb.test").unwrap();

    rt.start_session("short", "s-pass", Some(Duration::from_millis(100))).unwrap();
    rt.start_session("long", "l-pass", Some(Duration::from_secs(3600))).unwrap();

    std::thread::sleep(Duration::from_millis(400));

    assert!(!rt.check_user_process("short", "s-pass"), "short-TTL session should have expired");
    assert!(rt.check_user_process("long", "l-pass"), "long-TTL session should still be running");

    rt.wait_for_all_processes_to_finish();
}

#[test]
fn scenario_dispatch_selects_the_session_matching_credentials() {
    let rt = runtime();
    rt.bootstrap_user("alice", "alice-pass", "alice@quakedb.test").unwrap();
    rt.bootstrap_user("bob", "bob-pass", "bob@quakedb.test").unwrap();

    rt.start_session("alice", "alice-pass", None).unwrap();
    let bob_session = rt.start_session("bob", "bob-pass", None).unwrap();

    // Stop bob's session up front: if `add_buser` ever fell through to it
    // instead of picking alice's session, the dispatch below would fail
    // with `SessionError::NotRunning`.
    bob_session.stop();

    rt.add_buser("probe", "probe-pass", "probe@quakedb.test", false, "alice", "alice-pass")
        .expect("dispatch must select alice's still-running session, not bob's stopped one");

    rt.wait_for_all_processes_to_finish();
}
