//! WASAPI endpoint volume for the default render device
//!
//! COM must be initialized on the calling thread before `EndpointVolume`
//! is bound, and the interface stays pinned to that thread. The device
//! bound at startup remains in use even if the system default changes.

use std::ptr;

use windows::Win32::Foundation::BOOL;
use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{eConsole, eRender, IMMDeviceEnumerator, MMDeviceEnumerator};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_MULTITHREADED,
};

use super::{VolumeControl, VolumeError};

impl From<windows::core::Error> for VolumeError {
    fn from(e: windows::core::Error) -> Self {
        VolumeError::Call(e.to_string())
    }
}

/// Per-thread COM lifetime guard. Declare it before the endpoint so it
/// outlives every interface created on the thread.
pub struct ComSession(());

impl ComSession {
    pub fn init() -> Result<Self, VolumeError> {
        unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
            .ok()
            .map_err(|e| VolumeError::Endpoint(e.to_string()))?;
        Ok(Self(()))
    }
}

impl Drop for ComSession {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

/// Volume and mute control over the default render endpoint.
pub struct EndpointVolume {
    endpoint: IAudioEndpointVolume,
}

impl EndpointVolume {
    /// Bind the system default output device.
    pub fn bind_default() -> Result<Self, VolumeError> {
        let endpoint = unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| VolumeError::Endpoint(e.to_string()))?;
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|e| VolumeError::Endpoint(e.to_string()))?;
            device
                .Activate::<IAudioEndpointVolume>(CLSCTX_ALL, None)
                .map_err(|e| VolumeError::Endpoint(e.to_string()))?
        };
        Ok(Self { endpoint })
    }
}

impl VolumeControl for EndpointVolume {
    fn volume(&mut self) -> Result<f32, VolumeError> {
        Ok(unsafe { self.endpoint.GetMasterVolumeLevelScalar() }?)
    }

    fn set_volume(&mut self, level: f32) -> Result<(), VolumeError> {
        unsafe { self.endpoint.SetMasterVolumeLevelScalar(level, ptr::null()) }?;
        Ok(())
    }

    fn muted(&mut self) -> Result<bool, VolumeError> {
        Ok(unsafe { self.endpoint.GetMute() }?.as_bool())
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), VolumeError> {
        unsafe { self.endpoint.SetMute(BOOL::from(muted), ptr::null()) }?;
        Ok(())
    }
}
