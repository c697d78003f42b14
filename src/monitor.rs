//! Background monitor loop
//!
//! Samples input idleness once per second and feeds the mute state
//! machine. Runs on a dedicated thread: the WASAPI endpoint interface
//! is pinned to the thread that created it, so COM init, endpoint
//! binding, and every volume call happen here. Shutdown is a
//! handshake: the quit handler clears the running flag and blocks
//! until this thread confirms its final restore pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

#[cfg(target_os = "windows")]
use crate::config::Config;
use crate::events::MonitorStatus;
use crate::idle::IdleSource;
use crate::state::MuteStateMachine;
use crate::volume::VolumeControl;

/// Time between idle samples.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("failed to spawn monitor thread: {0}")]
    ThreadSpawn(String),

    #[error(transparent)]
    Init(#[from] crate::volume::VolumeError),

    #[error("monitor thread exited during startup")]
    StartupExit,
}

/// Handle held by the tray thread for the shutdown handshake.
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
    done_rx: Receiver<()>,
    join: JoinHandle<()>,
}

impl MonitorHandle {
    /// Start the monitor thread and wait for it to bind the audio
    /// endpoint. Returns an error if the endpoint cannot be acquired,
    /// so a broken audio stack is caught at startup.
    #[cfg(target_os = "windows")]
    pub fn spawn(
        config: &Config,
        status_tx: Sender<MonitorStatus>,
    ) -> Result<Self, MonitorError> {
        use std::sync::mpsc;

        use crate::idle::SystemIdleSource;
        use crate::volume::{ComSession, EndpointVolume};

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let thread_running = Arc::clone(&running);
        let threshold = config.idle_threshold;

        let join = thread::Builder::new()
            .name("idle-monitor".to_string())
            .spawn(move || {
                // Keep the COM guard first so it is dropped after the
                // endpoint interface.
                let _com = match ComSession::init() {
                    Ok(com) => com,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let mut volume = match EndpointVolume::bind_default() {
                    Ok(volume) => volume,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let mut idle = SystemIdleSource::new();
                let mut machine = MuteStateMachine::new(threshold);
                run_loop(
                    &mut idle,
                    &mut volume,
                    &mut machine,
                    &thread_running,
                    &status_tx,
                    TICK_INTERVAL,
                );
                let _ = done_tx.send(());
            })
            .map_err(|e| MonitorError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(MonitorError::Init(e)),
            Err(_) => return Err(MonitorError::StartupExit),
        }
        info!("monitor thread started");

        Ok(Self {
            running,
            done_rx,
            join,
        })
    }

    /// Signal the monitor to stop and wait for its final restore pass.
    /// Returns once the thread confirms, or after `timeout` if it does
    /// not; termination proceeds either way.
    pub fn shutdown(self, timeout: Duration) {
        self.running.store(false, Ordering::SeqCst);

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = self.join.join();
                info!("monitor stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "monitor did not confirm shutdown, exiting anyway");
            }
        }
    }
}

/// The tick loop proper. Platform-independent: everything OS-facing
/// comes in through the trait seams.
///
/// A failed idle query or volume call is logged and the tick skipped;
/// the next tick re-evaluates from current OS state. After the running
/// flag clears, a final restore pass runs if we still hold the mute.
pub fn run_loop<I, V>(
    idle: &mut I,
    volume: &mut V,
    machine: &mut MuteStateMachine,
    running: &AtomicBool,
    status_tx: &Sender<MonitorStatus>,
    tick: Duration,
) where
    I: IdleSource,
    V: VolumeControl,
{
    while running.load(Ordering::SeqCst) {
        match idle.sample() {
            Ok(idle_time) => {
                if let Err(e) = machine.tick(idle_time, volume) {
                    warn!(error = %e, "volume call failed, skipping tick");
                }
                let _ = status_tx.send(MonitorStatus {
                    idle: idle_time,
                    muted: machine.is_muted(),
                });
            }
            Err(e) => warn!(error = %e, "idle query failed, skipping tick"),
        }
        thread::sleep(tick);
    }

    if machine.is_muted() {
        match machine.restore(volume) {
            Ok(_) => info!("volume restored before exit"),
            Err(e) => warn!(error = %e, "failed to restore volume on shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::sync::Mutex;

    use super::*;
    use crate::idle::IdleError;
    use crate::volume::fake::{Call, FakeVolume};
    use crate::volume::VolumeError;

    /// Serves scripted samples, clearing the running flag once the
    /// last one has been handed out so the loop exits deterministically
    /// after exactly one iteration per sample.
    struct ScriptedIdle {
        samples: VecDeque<Result<Duration, IdleError>>,
        running: Arc<AtomicBool>,
    }

    impl ScriptedIdle {
        fn new(
            samples: Vec<Result<Duration, IdleError>>,
            running: &Arc<AtomicBool>,
        ) -> Self {
            Self {
                samples: samples.into(),
                running: Arc::clone(running),
            }
        }
    }

    impl IdleSource for ScriptedIdle {
        fn sample(&mut self) -> Result<Duration, IdleError> {
            let next = self.samples.pop_front().unwrap_or(Ok(Duration::ZERO));
            if self.samples.is_empty() {
                self.running.store(false, Ordering::SeqCst);
            }
            next
        }
    }

    /// Always reports an hour of idleness.
    struct AlwaysIdle;

    impl IdleSource for AlwaysIdle {
        fn sample(&mut self) -> Result<Duration, IdleError> {
            Ok(Duration::from_secs(3600))
        }
    }

    /// Clonable view of a `FakeVolume` so tests can inspect it after
    /// moving it into the monitor thread.
    #[derive(Clone)]
    struct SharedVolume(Arc<Mutex<FakeVolume>>);

    impl SharedVolume {
        fn with_level(level: f32) -> Self {
            Self(Arc::new(Mutex::new(FakeVolume::with_level(level))))
        }

        fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().calls.clone()
        }
    }

    impl VolumeControl for SharedVolume {
        fn volume(&mut self) -> Result<f32, VolumeError> {
            self.0.lock().unwrap().volume()
        }

        fn set_volume(&mut self, level: f32) -> Result<(), VolumeError> {
            self.0.lock().unwrap().set_volume(level)
        }

        fn muted(&mut self) -> Result<bool, VolumeError> {
            self.0.lock().unwrap().muted()
        }

        fn set_muted(&mut self, muted: bool) -> Result<(), VolumeError> {
            self.0.lock().unwrap().set_muted(muted)
        }
    }

    fn secs_f64(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_scripted_scenario() {
        // 0.01 minutes of allowed idleness, i.e. a 0.6 s threshold.
        let threshold = secs_f64(0.01 * 60.0);
        let running = Arc::new(AtomicBool::new(true));
        let mut idle = ScriptedIdle::new(
            vec![Ok(secs_f64(0.5)), Ok(secs_f64(0.7)), Ok(secs_f64(0.2))],
            &running,
        );
        let mut volume = FakeVolume::with_level(0.64);
        let mut machine = MuteStateMachine::new(threshold);
        let (status_tx, status_rx) = mpsc::channel();

        run_loop(
            &mut idle,
            &mut volume,
            &mut machine,
            &running,
            &status_tx,
            Duration::ZERO,
        );

        // Tick 1 no-op, tick 2 mute, tick 3 restore.
        assert_eq!(
            volume.calls,
            vec![
                Call::GetVolume,
                Call::SetMute(true),
                Call::SetMute(false),
                Call::SetVolume(0.64),
            ]
        );
        assert!(!machine.is_muted());

        let muted_flags: Vec<bool> =
            status_rx.try_iter().map(|status| status.muted).collect();
        assert_eq!(muted_flags, vec![false, true, false]);
    }

    #[test]
    fn test_boundary_equality_mutes() {
        let threshold = secs_f64(0.6);
        let running = Arc::new(AtomicBool::new(true));
        let mut idle = ScriptedIdle::new(vec![Ok(threshold)], &running);
        let mut volume = FakeVolume::with_level(0.5);
        let mut machine = MuteStateMachine::new(threshold);
        let (status_tx, _status_rx) = mpsc::channel();

        run_loop(
            &mut idle,
            &mut volume,
            &mut machine,
            &running,
            &status_tx,
            Duration::ZERO,
        );

        // Mute fired, then the loop's exit pass restored it.
        assert_eq!(
            volume.calls,
            vec![
                Call::GetVolume,
                Call::SetMute(true),
                Call::SetMute(false),
                Call::SetVolume(0.5),
            ]
        );
    }

    #[test]
    fn test_idle_error_skips_tick() {
        let threshold = secs_f64(0.6);
        let running = Arc::new(AtomicBool::new(true));
        let mut idle = ScriptedIdle::new(
            vec![
                Err(IdleError::Query("injected".into())),
                Ok(secs_f64(0.3)),
            ],
            &running,
        );
        let mut volume = FakeVolume::with_level(0.5);
        let mut machine = MuteStateMachine::new(threshold);
        let (status_tx, status_rx) = mpsc::channel();

        run_loop(
            &mut idle,
            &mut volume,
            &mut machine,
            &running,
            &status_tx,
            Duration::ZERO,
        );

        // Only the good sample produced a status, and no volume calls.
        assert_eq!(status_rx.try_iter().count(), 1);
        assert!(volume.calls.is_empty());
    }

    #[test]
    fn test_volume_error_keeps_loop() {
        let threshold = secs_f64(0.6);
        let running = Arc::new(AtomicBool::new(true));
        let mut idle = ScriptedIdle::new(
            vec![Ok(secs_f64(1.0)), Ok(secs_f64(1.0))],
            &running,
        );
        let mut volume = FakeVolume::with_level(0.5);
        volume.fail_set_mute = true;
        let mut machine = MuteStateMachine::new(threshold);
        let (status_tx, status_rx) = mpsc::channel();

        run_loop(
            &mut idle,
            &mut volume,
            &mut machine,
            &running,
            &status_tx,
            Duration::ZERO,
        );

        // Both ticks attempted the mute, neither committed state.
        assert_eq!(status_rx.try_iter().filter(|s| s.muted).count(), 0);
        assert!(!machine.is_muted());
    }

    #[test]
    fn test_shutdown_restores_while_muted() {
        let running = Arc::new(AtomicBool::new(true));
        let (status_tx, status_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let volume = SharedVolume::with_level(0.42);
        let mut thread_volume = volume.clone();
        let thread_running = Arc::clone(&running);

        let join = thread::Builder::new()
            .name("idle-monitor".to_string())
            .spawn(move || {
                let mut idle = AlwaysIdle;
                let mut machine = MuteStateMachine::new(Duration::from_secs(300));
                run_loop(
                    &mut idle,
                    &mut thread_volume,
                    &mut machine,
                    &thread_running,
                    &status_tx,
                    Duration::from_millis(1),
                );
                let _ = done_tx.send(());
            })
            .unwrap();

        // Wait until the monitor reports the muted state.
        let muted = status_rx
            .iter()
            .take(50)
            .any(|status| status.muted);
        assert!(muted);

        let handle = MonitorHandle {
            running,
            done_rx,
            join,
        };
        handle.shutdown(Duration::from_secs(5));

        let calls = volume.calls();
        assert_eq!(calls.first(), Some(&Call::GetVolume));
        // The confirmed shutdown implies the restore already ran.
        assert_eq!(
            &calls[calls.len() - 2..],
            &[Call::SetMute(false), Call::SetVolume(0.42)]
        );
    }

    #[test]
    fn test_shutdown_without_mute() {
        let running = Arc::new(AtomicBool::new(true));
        let (status_tx, _status_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let volume = SharedVolume::with_level(0.8);
        let mut thread_volume = volume.clone();
        let thread_running = Arc::clone(&running);

        let join = thread::Builder::new()
            .name("idle-monitor".to_string())
            .spawn(move || {
                struct NeverIdle;
                impl IdleSource for NeverIdle {
                    fn sample(&mut self) -> Result<Duration, IdleError> {
                        Ok(Duration::ZERO)
                    }
                }
                let mut idle = NeverIdle;
                let mut machine = MuteStateMachine::new(Duration::from_secs(300));
                run_loop(
                    &mut idle,
                    &mut thread_volume,
                    &mut machine,
                    &thread_running,
                    &status_tx,
                    Duration::from_millis(1),
                );
                let _ = done_tx.send(());
            })
            .unwrap();

        let handle = MonitorHandle {
            running,
            done_rx,
            join,
        };
        handle.shutdown(Duration::from_secs(5));

        assert!(volume.calls().is_empty());
    }
}
