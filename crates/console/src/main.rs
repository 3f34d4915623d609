mod app;
mod render;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::Mutex,
};

use shelfmark_core::config::{self, AppConfig};
use tokio::io::BufReader;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::app::{ConsoleApp, ConsoleOptions};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.logging.dir)?;

    let store = config.open_store();
    let report = store
        .load()
        .with_context(|| format!("failed to load catalog from {}", store.describe()))?;
    tracing::info!(
        books = report.catalog.books().len(),
        members = report.catalog.members().len(),
        issues = report.issues().len(),
        "catalog loaded from {}",
        store.describe()
    );

    let options = ConsoleOptions {
        color: config.console.color,
        autosave: config.storage.autosave,
    };
    let mut app = ConsoleApp::new(
        report,
        store,
        options,
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );
    app.run().await
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("shelfmark.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    // The menu owns stdout; console diagnostics go to stderr and stay quiet unless RUST_LOG asks.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file))
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
