//! Tray shell
//!
//! Owns the tray icon and the Win32 message loop on the primary
//! thread. A thread timer drains menu events and monitor status
//! updates; quitting signals the monitor and waits for its restore
//! pass before the loop is allowed to end.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;
use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIconBuilder};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, KillTimer, PostQuitMessage, SetTimer, TranslateMessage, MSG,
    WM_TIMER,
};

use crate::config::Config;
use crate::events::MonitorStatus;
use crate::monitor::MonitorHandle;

const APP_NAME: &str = "IdleMute";
const ICON_BYTES: &[u8] = include_bytes!("../assets/icon.png");

/// How often the message loop drains menu and status events.
const PUMP_INTERVAL_MS: u32 = 500;
/// How long quit waits for the monitor's final restore pass.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the tray icon and its message loop until the user quits.
/// Blocks the calling thread for the life of the process.
pub fn run(
    config: &Config,
    monitor: MonitorHandle,
    status_rx: Receiver<MonitorStatus>,
) -> Result<()> {
    let mut monitor = Some(monitor);
    let result = pump(config, &mut monitor, &status_rx);

    // Reached on quit and on setup failure alike; the monitor gets its
    // restore pass before the process ends either way.
    if let Some(monitor) = monitor.take() {
        monitor.shutdown(SHUTDOWN_TIMEOUT);
    }

    result
}

fn pump(
    config: &Config,
    monitor: &mut Option<MonitorHandle>,
    status_rx: &Receiver<MonitorStatus>,
) -> Result<()> {
    let menu = Menu::new();
    let threshold_label = MenuItem::new(
        format!("Idle threshold: {} min", config.idle_minutes),
        false,
        None,
    );
    let quit = MenuItem::new("Quit", true, None);
    menu.append_items(&[&threshold_label, &PredefinedMenuItem::separator(), &quit])
        .context("failed to build tray menu")?;

    let tray = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip(idle_tooltip(config))
        .with_icon(load_icon()?)
        .build()
        .context("failed to create tray icon")?;

    let timer = unsafe { SetTimer(None, 1, PUMP_INTERVAL_MS, None) };
    let mut msg = MSG::default();
    loop {
        let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if ret.0 == 0 {
            // WM_QUIT
            break;
        }
        if ret.0 == -1 {
            warn!("message loop error, shutting down");
            break;
        }

        if msg.message == WM_TIMER {
            while let Ok(event) = MenuEvent::receiver().try_recv() {
                if event.id() == quit.id() {
                    if let Some(monitor) = monitor.take() {
                        monitor.shutdown(SHUTDOWN_TIMEOUT);
                    }
                    unsafe { PostQuitMessage(0) };
                }
            }

            let mut latest = None;
            while let Ok(status) = status_rx.try_recv() {
                latest = Some(status);
            }
            if let Some(status) = latest {
                let _ = tray.set_tooltip(Some(status_tooltip(config, &status)));
            }
            continue;
        }

        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    let _ = unsafe { KillTimer(None, timer) };

    Ok(())
}

fn idle_tooltip(config: &Config) -> String {
    format!("{APP_NAME} ({} min)", config.idle_minutes)
}

fn status_tooltip(config: &Config, status: &MonitorStatus) -> String {
    if status.muted {
        format!("{APP_NAME} [muted] idle {:.0}s", status.idle.as_secs_f64())
    } else {
        idle_tooltip(config)
    }
}

fn load_icon() -> Result<Icon> {
    let image = image::load_from_memory(ICON_BYTES)
        .context("tray icon asset is not a valid image")?
        .into_rgba8();
    let (width, height) = image.dimensions();
    Icon::from_rgba(image.into_raw(), width, height).context("tray icon data rejected")
}
