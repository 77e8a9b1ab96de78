//! # Spells
//!
//! Runs an automation script against a session of the Spells inventory
//! engine and prints the step report as JSON.
//!
//! ```text
//! spells <script.json> [config.toml]
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spells_engine::{AutomationRunner, AutomationScript, EngineConfig, Session};

/// Main entry point.
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(script_path) = args.next().map(PathBuf::from) else {
        bail!("usage: spells <script.json> [config.toml]");
    };
    let config = match args.next() {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(config.log_directive.parse()?))
        .init();

    info!("Spells starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let script = AutomationScript::load(&script_path)
        .with_context(|| format!("loading script {}", script_path.display()))?;
    let mut session = Session::start(config).context("starting session")?;

    let report = AutomationRunner::new().run(&script, &mut session);
    let shutdown = session.shutdown().context("ending session")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!(
        "Script '{}' finished: {} steps, {} failed, final save: {}",
        report.script,
        report.steps.len(),
        report.failures(),
        shutdown.saved
    );

    if report.failures() > 0 {
        bail!("{} script steps failed", report.failures());
    }
    Ok(())
}
