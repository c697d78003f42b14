//! Output volume control for the default render device
//!
//! The trait seam keeps the mute logic testable anywhere; the Windows
//! implementation binds the WASAPI endpoint volume interface.

#[cfg(target_os = "windows")]
mod endpoint;

#[cfg(target_os = "windows")]
pub use endpoint::{ComSession, EndpointVolume};

/// Errors from the audio endpoint.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("audio endpoint unavailable: {0}")]
    Endpoint(String),

    #[error("volume call failed: {0}")]
    Call(String),
}

/// Get/set of scalar volume and the hardware mute flag on the default
/// audio output device. Methods take `&mut self`: the implementation
/// is an exclusive handle owned by the monitor thread.
pub trait VolumeControl {
    /// Current master volume, scalar in [0, 1].
    fn volume(&mut self) -> Result<f32, VolumeError>;

    /// Set the master volume, scalar in [0, 1].
    fn set_volume(&mut self, level: f32) -> Result<(), VolumeError>;

    /// Hardware mute flag, independent of the scalar level.
    fn muted(&mut self) -> Result<bool, VolumeError>;

    fn set_muted(&mut self, muted: bool) -> Result<(), VolumeError>;
}
