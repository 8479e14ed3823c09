//! Process-wide runtime: init idempotence, reset and change propagation.

use hotswap_runtime::pool::LogPool;
use hotswap_runtime::runtime::{self, AppOptions, LOG_SETTINGS_CALLBACK};
use hotswap_runtime::sources::ParseType;
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

// The global runtime is shared by every test in this binary.
static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn write_atomic(path: &Path, contents: &str) {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).unwrap();
    fs::rename(&tmp, path).unwrap();
}

fn options(temp_dir: &TempDir) -> AppOptions {
    AppOptions::new()
        .with_debug(true)
        .with_config_dir(temp_dir.path())
        .with_config_name("app", ParseType::Toml)
        .with_watch_debounce(Duration::from_millis(50))
        .with_pool(LogPool::builder().with_host("h1"))
}

fn app_toml(temp_dir: &TempDir, level: &str) -> String {
    format!(
        "LOG_DIR = \"{}\"\nLOG_ENABLE_LEVEL = \"{}\"\n",
        temp_dir.path().join("logs").display(),
        level
    )
}

async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn test_init_app_is_idempotent() {
    let _serial = SERIAL.lock();
    runtime::reset();

    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("app.toml"), app_toml(&temp_dir, "info")).unwrap();

    let first = runtime::init_app(options(&temp_dir)).await.unwrap();
    let second = runtime::init_app(options(&temp_dir).with_debug(false))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.app().debug());
    assert_eq!(first.app().get_string_config("abc", "abc"), "abc");
    assert_eq!(
        first.app().get_string_config("LOG_ENABLE_LEVEL", "debug"),
        "info"
    );

    runtime::reset();
}

#[tokio::test]
async fn test_reset_clears_global_state() {
    let _serial = SERIAL.lock();
    runtime::reset();
    assert!(runtime::global().is_none());

    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("app.toml"), app_toml(&temp_dir, "info")).unwrap();

    let started = runtime::init_app(options(&temp_dir)).await.unwrap();
    assert!(started.app().config().is_some());
    assert!(started.registry().contains(LOG_SETTINGS_CALLBACK));
    assert!(started.supervisor().is_listening());
    let log = started.pool().instance("access").unwrap();

    runtime::reset();
    assert!(runtime::global().is_none());
    assert!(!started.supervisor().is_listening());
    assert!(log.is_released());

    let restarted = runtime::init_app(options(&temp_dir)).await.unwrap();
    assert!(!Arc::ptr_eq(&started, &restarted));
    assert!(restarted.app().config().is_some());
    assert!(restarted.supervisor().is_listening());

    runtime::reset();
}

#[tokio::test]
async fn test_missing_configuration_degrades_to_defaults() {
    let _serial = SERIAL.lock();
    runtime::reset();

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.toml");

    let rt = runtime::init_app(options(&temp_dir).with_reload_interval(Duration::from_millis(100)))
        .await
        .unwrap();
    assert!(rt.app().config().is_none());
    assert_eq!(
        rt.app().get_string_config("LOG_ENABLE_LEVEL", "debug"),
        "debug"
    );
    assert_eq!(
        rt.pool().settings().log_dir,
        Path::new(hotswap_runtime::pool::DEFAULT_LOG_DIR)
    );

    write_atomic(&path, &app_toml(&temp_dir, "info"));

    // The retry loop loads it and re-runs the init callbacks.
    let logs = temp_dir.path().join("logs");
    assert!(eventually(|| rt.pool().settings().log_dir == logs).await);
    assert_eq!(
        rt.app().get_string_config("LOG_ENABLE_LEVEL", "debug"),
        "info"
    );
    assert!(rt.supervisor().is_listening());

    runtime::reset();
}

#[cfg(feature = "file-watch")]
#[tokio::test]
async fn test_init_callbacks_follow_configuration_changes() {
    let _serial = SERIAL.lock();
    runtime::reset();

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.toml");
    write_atomic(&path, &app_toml(&temp_dir, "info"));

    let counter = Arc::new(AtomicUsize::new(1));
    let c = Arc::clone(&counter);
    let rt = runtime::init_app(options(&temp_dir).with_init("test", move || {
        c.fetch_add(1, Ordering::SeqCst);
    }))
    .await
    .unwrap();

    // Startup runs every callback once.
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(
        rt.app().get_string_config("update_val", "none"),
        "none"
    );

    write_atomic(
        &path,
        &format!("{}update_val = \"update\"\n", app_toml(&temp_dir, "warn")),
    );

    assert!(eventually(|| counter.load(Ordering::SeqCst) >= 3).await);
    assert!(
        eventually(|| rt.app().get_string_config("update_val", "none") == "update").await
    );
    assert_eq!(
        rt.app().get_string_config("LOG_ENABLE_LEVEL", "debug"),
        "warn"
    );
    // debug=true still forces the debug level on the pool.
    assert!(
        rt
            .pool()
            .instance("access")
            .unwrap()
            .enabled(tracing::Level::DEBUG)
    );

    let before = counter.load(Ordering::SeqCst);
    write_atomic(&path, &app_toml(&temp_dir, "info"));
    assert!(eventually(|| counter.load(Ordering::SeqCst) > before).await);
    assert!(
        eventually(|| rt.app().get_string_config("update_val", "none") == "none").await
    );

    runtime::reset();
}
