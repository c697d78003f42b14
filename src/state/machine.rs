//! Core mute state machine
//!
//! Evaluates one idle sample per tick against the configured threshold
//! and drives the volume controller. Two states: unmuted (initial) and
//! muted-by-us, with the prior volume level saved across the mute.

use std::time::Duration;

use tracing::info;

use crate::volume::{VolumeControl, VolumeError};

/// A side effect performed by a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Output was muted; `saved` is the scalar volume read immediately
    /// before muting.
    Muted { idle: Duration, saved: f32 },
    /// Mute was cleared and the saved scalar level put back.
    Restored { volume: Option<f32> },
}

/// The mute state machine owned by the monitor loop.
///
/// Invariant: `saved_volume` is present exactly when `muted_by_us` is
/// true. State is only committed after the underlying volume calls
/// succeed, so a failed tick leaves the machine unchanged and the next
/// tick re-evaluates from current OS state.
pub struct MuteStateMachine {
    threshold: Duration,
    muted_by_us: bool,
    saved_volume: Option<f32>,
}

impl MuteStateMachine {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            muted_by_us: false,
            saved_volume: None,
        }
    }

    /// Whether the current mute was applied by us.
    pub fn is_muted(&self) -> bool {
        self.muted_by_us
    }

    /// Volume level saved at the last mute transition.
    pub fn saved_volume(&self) -> Option<f32> {
        self.saved_volume
    }

    /// Evaluate one idle sample.
    ///
    /// Mutes when the sample reaches the threshold (`>=`, so equality
    /// mutes), restores when it drops back below while muted, and is a
    /// no-op otherwise. Transitions are edge-triggered: staying idle
    /// produces exactly one mute.
    pub fn tick<V: VolumeControl>(
        &mut self,
        idle: Duration,
        volume: &mut V,
    ) -> Result<Option<Transition>, VolumeError> {
        if idle >= self.threshold && !self.muted_by_us {
            let saved = volume.volume()?;
            volume.set_muted(true)?;
            self.muted_by_us = true;
            self.saved_volume = Some(saved);
            info!(
                idle_secs = idle.as_secs_f64(),
                saved_volume = f64::from(saved),
                "idle threshold reached, output muted"
            );
            Ok(Some(Transition::Muted { idle, saved }))
        } else if idle < self.threshold && self.muted_by_us {
            self.restore(volume).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Unmute and put the saved volume back.
    ///
    /// The mute flag is cleared before the scalar level is restored.
    /// If the scalar restore fails after the unmute succeeded, state is
    /// kept so the next tick retries both calls; clearing the mute flag
    /// again is harmless.
    pub fn restore<V: VolumeControl>(
        &mut self,
        volume: &mut V,
    ) -> Result<Transition, VolumeError> {
        volume.set_muted(false)?;
        let saved = self.saved_volume;
        if let Some(level) = saved {
            volume.set_volume(level)?;
        }
        self.muted_by_us = false;
        self.saved_volume = None;
        info!(volume = ?saved, "input detected, volume restored");
        Ok(Transition::Restored { volume: saved })
    }
}
