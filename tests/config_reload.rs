//! Configuration loading, reloading and change fan-out.

use hotswap_runtime::core::{ConfigManager, Configer, ReloadableConfig, SourceKind};
use hotswap_runtime::notify::{InitRegistry, Supervisor};
use hotswap_runtime::sources::{MemorySource, ParseType};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

/// Replace `path` atomically so a watcher never observes a half-written file.
fn write_atomic(path: &Path, contents: &str) {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).unwrap();
    fs::rename(&tmp, path).unwrap();
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
async fn test_file_formats_load_through_manager() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("toml_app.toml"),
        "LOG_DIR = \"/srv/logs\"\n[server]\nport = 8080\n",
    )
    .unwrap();
    fs::write(
        temp_dir.path().join("yaml_app.yaml"),
        "LOG_TIME_GROUP: hour\nserver:\n  port: 9090\n",
    )
    .unwrap();
    fs::write(
        temp_dir.path().join("json_app.json"),
        r#"{"LOG_SINK_TYPE": "console", "server": {"port": 7070}}"#,
    )
    .unwrap();

    let manager = ConfigManager::new(temp_dir.path()).with_file_watch(false);

    let toml = manager
        .instance("toml_app", ParseType::Toml, &SourceKind::Local)
        .unwrap();
    assert_eq!(toml.get_string("LOG_DIR").unwrap(), "/srv/logs");
    assert_eq!(toml.get_string("server.port").unwrap(), "8080");

    let yaml = manager
        .instance("yaml_app", ParseType::Yaml, &SourceKind::Local)
        .unwrap();
    assert_eq!(yaml.get_string("log_time_group").unwrap(), "hour");
    assert_eq!(yaml.get_string("server.port").unwrap(), "9090");

    let json = manager
        .instance("json_app", ParseType::Json, &SourceKind::Local)
        .unwrap();
    assert_eq!(json.get_string("LOG_SINK_TYPE").unwrap(), "console");

    assert_eq!(manager.len(), 3);
}

#[tokio::test]
async fn test_missing_file_is_not_cached() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(temp_dir.path()).with_file_watch(false);

    assert!(
        manager
            .instance("app", ParseType::Toml, &SourceKind::Local)
            .is_err()
    );
    assert!(manager.is_empty());

    fs::write(temp_dir.path().join("app.toml"), "LOG_ENABLE_LEVEL = \"warn\"\n").unwrap();
    let config = manager
        .instance("app", ParseType::Toml, &SourceKind::Local)
        .unwrap();
    assert_eq!(config.get_string_or("LOG_ENABLE_LEVEL", "info"), "warn");
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.toml");
    fs::write(&path, "LOG_DIR = \"/srv/a\"\n").unwrap();

    let config = ReloadableConfig::builder("app")
        .with_file(&path)
        .with_file_watch(false)
        .build()
        .unwrap();
    let mut changes = config.subscribe();

    fs::write(&path, "LOG_DIR = [unclosed").unwrap();
    assert_err!(config.reload());
    assert_eq!(config.get_string("LOG_DIR").unwrap(), "/srv/a");
    assert!(changes.try_recv().is_err());

    fs::write(&path, "LOG_DIR = \"/srv/b\"\n").unwrap();
    assert_ok!(config.reload());
    assert_eq!(config.get_string("LOG_DIR").unwrap(), "/srv/b");
    assert_eq!(changes.try_recv().unwrap().version, 1);
}

#[tokio::test]
async fn test_supervisor_runs_each_callback_once_per_change() {
    let source = MemorySource::new().with_value("LOG_ENABLE_LEVEL", "info");
    let config = ReloadableConfig::builder("app")
        .with_source(source.clone())
        .build()
        .unwrap();

    let registry = Arc::new(InitRegistry::new());
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (f, s) = (Arc::clone(&first), Arc::clone(&second));
    registry.register("test", move || {
        f.fetch_add(1, Ordering::SeqCst);
    });
    // Same name: replaces the first callback.
    registry.register("test", move || {
        s.fetch_add(1, Ordering::SeqCst);
    });

    let supervisor = Supervisor::new(Arc::clone(&registry));
    assert!(supervisor.attach(config.as_ref()).unwrap());
    assert!(!supervisor.attach(config.as_ref()).unwrap());

    source.set("LOG_ENABLE_LEVEL", "debug");
    config.reload().unwrap();
    assert!(eventually(|| second.load(Ordering::SeqCst) == 1).await);

    config.reload().unwrap();
    assert!(eventually(|| second.load(Ordering::SeqCst) == 2).await);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 2);

    let task = supervisor.stop().unwrap();
    timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
}

#[cfg(feature = "file-watch")]
#[tokio::test]
async fn test_file_change_reaches_callbacks() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.toml");
    write_atomic(&path, "LOG_ENABLE_LEVEL = \"info\"\n");

    let manager = ConfigManager::new(temp_dir.path())
        .with_file_watch(true)
        .with_watch_debounce(Duration::from_millis(50));
    let config = manager
        .instance("app", ParseType::Toml, &SourceKind::Local)
        .unwrap();
    assert!(config.is_watching());

    let registry = Arc::new(InitRegistry::new());
    let seen = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
    let (cfg, log) = (Arc::clone(&config), Arc::clone(&seen));
    registry.register("record", move || {
        log.lock().push(cfg.get_string_or("LOG_ENABLE_LEVEL", "none"));
    });

    let supervisor = Supervisor::new(registry);
    supervisor.attach(config.as_ref()).unwrap();

    write_atomic(&path, "LOG_ENABLE_LEVEL = \"debug\"\nupdate_val = \"update\"\n");

    assert!(eventually(|| seen.lock().last().map(String::as_str) == Some("debug")).await);
    assert_eq!(config.get_string_or("update_val", "none"), "update");
    assert!(config.version() >= 1);
}
