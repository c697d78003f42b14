//! Input idleness sampling
//!
//! `IdleSource` reports elapsed time since the last keyboard, pointer,
//! or touch input. The Windows implementation queries Win32; the trait
//! seam keeps the monitor loop testable off-platform.

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "windows")]
pub use self::windows::SystemIdleSource;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum IdleError {
    #[error("idle time query failed: {0}")]
    Query(String),
}

pub trait IdleSource {
    /// Elapsed time since the most recent operator input.
    fn sample(&mut self) -> Result<Duration, IdleError>;
}
