//! Example wiring the runtime into an application.
//!
//! This example shows how to:
//! - Start the process-wide runtime from a configuration directory
//! - Register an init callback that runs on every configuration change
//! - Write structured records through the log pool
//!
//! Run with: cargo run --example bootstrap
//!
//! While running, edit demos/conf/app.toml (for example set
//! `LOG_TIME_GROUP = "hour"` or `LOG_ENABLE_LEVEL = "debug"`) and watch the
//! callback fire and the log path change.

use hotswap_runtime::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hotswap_runtime=debug".into()),
        )
        .init();

    let config_dir = "demos/conf";
    let config_path = format!("{config_dir}/app.toml");
    if !std::path::Path::new(&config_path).exists() {
        std::fs::create_dir_all(config_dir)?;
        std::fs::write(
            &config_path,
            r#"LOG_DIR = "/tmp/hotswap-runtime/logs"
LOG_ENABLE_LEVEL = "info"
LOG_TIME_GROUP = "daily"
LOG_SINK_TYPE = "file"
"#,
        )?;
        println!("Created {config_path}");
    }

    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reloads);

    let runtime = init_app(
        AppOptions::new()
            .with_env("demo")
            .with_config_dir(config_dir)
            .with_config_name("app", ParseType::Toml)
            .with_init("demo", move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                println!("init callback run #{n}");
            }),
    )
    .await?;

    println!(
        "LOG_DIR = {}",
        runtime.app().get_string_config("LOG_DIR", "/data/logs")
    );

    for tick in 0..30u32 {
        let log = runtime.pool().instance("access")?;
        log.event(Level::INFO).field("tick", tick).msg("heartbeat");
        log.debug("only visible with LOG_ENABLE_LEVEL = \"debug\"");

        if let Some(path) = log.path() {
            println!("tick {tick}: writing to {}", path.display());
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    println!("{} init callback runs", reloads.load(Ordering::SeqCst));
    reset();
    Ok(())
}
