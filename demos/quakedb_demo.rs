//! Walks through the happy-path scenario end to end: register a user,
//! start a session, submit some work, then shut everything down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use quakedb_core::config::RuntimeConfig;
use quakedb_core::ports::InMemoryStorageBackend;
use quakedb_core::types::ColumnValue;
use quakedb_core::Runtime;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let backend = Arc::new(InMemoryStorageBackend::new());
    let runtime = Runtime::new(RuntimeConfig::default(), backend);

    // `add_buser` dispatches through an already-running session, so the
    // very first user has to be seeded directly — mirroring the original
    // prototype's own test suite, which calls `addUserToCache` before any
    // `startSession`.
    runtime
        .bootstrap_user("adminQkDB", "Quake17", "admin@quakedb.test")
        .context("seed admin user")?;

    runtime
        .start_session("adminQkDB", "Quake17", Some(Duration::from_secs(3600)))
        .context("start admin session")?;

    log::info!(
        "adminQkDB session running: {}",
        runtime.check_user_process("adminQkDB", "Quake17")
    );

    runtime
        .add_buser("newUser", "newPassword", "stachulemko@quakedb.test", false, "adminQkDB", "Quake17")
        .context("register new user through admin session")?;

    runtime
        .add_table(
            "adminQkDB",
            "Quake17",
            vec![1, 2],
            vec![0, 1],
            vec!["id".to_string(), "label".to_string()],
            1,
            Some("127.0.0.1".to_string()),
        )
        .context("submit table header")?;

    runtime
        .add_tuple(
            "adminQkDB",
            "Quake17",
            1,
            vec![ColumnValue::Int(7), ColumnValue::Text("hello".into())],
            vec![false, false],
            Some("127.0.0.1".to_string()),
        )
        .context("submit tuple")?;

    log::info!("users: {:?}", runtime.debug_dump_users());
    log::info!("sessions: {:?}", runtime.debug_dump_sessions());

    runtime.wait_for_all_processes_to_finish();
    log::info!("all sessions stopped");

    Ok(())
}
