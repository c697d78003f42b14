//! idlemute: mutes the default audio output when the operator goes
//! idle, restores the saved volume on return.
//!
//! A background thread samples input idleness once per second and
//! drives the mute state machine; the primary thread runs the tray
//! icon and its message loop. Quitting from the tray waits for the
//! monitor's final restore pass before the process exits.

mod config;
mod events;
mod idle;
mod monitor;
mod state;
#[cfg(target_os = "windows")]
mod tray;
mod volume;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "idlemute starting");

    let config = Config::load()?;
    info!(
        idle_minutes = config.idle_minutes,
        idle_seconds = config.idle_threshold.as_secs_f64(),
        "idle threshold configured"
    );

    run(&config)
}

#[cfg(target_os = "windows")]
fn run(config: &Config) -> Result<()> {
    let (status_tx, status_rx) = std::sync::mpsc::channel();

    let monitor = monitor::MonitorHandle::spawn(config, status_tx)?;

    // Blocks the primary thread until the user quits from the tray.
    tray::run(config, monitor, status_rx)?;

    info!("idlemute stopped");
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn run(_config: &Config) -> Result<()> {
    anyhow::bail!("idlemute needs the Windows idle and audio endpoint APIs")
}
