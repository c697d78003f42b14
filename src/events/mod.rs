//! Status updates flowing from the monitor loop to the tray
//!
//! The tray icon is not `Send`, so the monitor never touches it
//! directly; it publishes one status per tick over a channel and the
//! tray thread renders the latest one it has drained.

use std::time::Duration;

/// Snapshot of the monitor's view after one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStatus {
    /// Idle duration sampled this tick.
    pub idle: Duration,
    /// Whether the output is currently muted by us.
    pub muted: bool,
}
