//! Win32 idle query
//!
//! Idle time is `GetTickCount()` minus the tick of the last input
//! event. Both counters are u32 milliseconds that wrap after ~49.7
//! days; wrapping subtraction keeps the difference correct across the
//! wrap.

use std::mem;
use std::time::Duration;

use windows::Win32::System::SystemInformation::GetTickCount;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

use super::{IdleError, IdleSource};

/// Idle sampler over `GetLastInputInfo` (keyboard, pointer, touch).
#[derive(Debug, Default)]
pub struct SystemIdleSource;

impl SystemIdleSource {
    pub fn new() -> Self {
        Self
    }
}

impl IdleSource for SystemIdleSource {
    fn sample(&mut self) -> Result<Duration, IdleError> {
        let mut info = LASTINPUTINFO {
            cbSize: mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };
        unsafe { GetLastInputInfo(&mut info) }
            .ok()
            .map_err(|e| IdleError::Query(e.to_string()))?;
        let idle_ms = unsafe { GetTickCount() }.wrapping_sub(info.dwTime);
        Ok(Duration::from_millis(u64::from(idle_ms)))
    }
}
