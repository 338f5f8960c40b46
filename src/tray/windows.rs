use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;
use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem as NativeItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE};

use super::menu::MenuAction;
use super::{icon_rgba, MenuState, Tray, TrayError, ICON_SIZE};
use crate::lifecycle::StopSignal;

const PUMP_INTERVAL: Duration = Duration::from_millis(50);

/// Notification-area icon driven by its own Win32 message pump
pub struct WindowsTray {
    state: MenuState,
    closing: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WindowsTray {
    pub fn new(state: MenuState) -> Self {
        Self {
            state,
            closing: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

/// Build the native icon + menu. Must run on the thread that pumps messages.
fn build_icon(state: &MenuState) -> Result<(TrayIcon, HashMap<MenuId, MenuAction>), TrayError> {
    let menu = Menu::new();
    let mut actions = HashMap::new();

    for item in state.build_menu() {
        let appended = if item.is_separator() {
            menu.append(&PredefinedMenuItem::separator())
        } else {
            let native = NativeItem::new(&item.label, item.enabled, None);
            if let Some(action) = item.action {
                actions.insert(native.id().clone(), action);
            }
            menu.append(&native)
        };
        appended.map_err(|e| TrayError::Build(e.to_string()))?;
    }

    let rgba = icon_rgba(ICON_SIZE);
    let icon = Icon::from_rgba(rgba.into_raw(), ICON_SIZE, ICON_SIZE).map_err(|e| TrayError::Build(e.to_string()))?;

    let tray = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip(&state.app_name)
        .with_icon(icon)
        .build()
        .map_err(|e| TrayError::Build(e.to_string()))?;

    Ok((tray, actions))
}

fn pump_messages() {
    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, HWND(0), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

impl Tray for WindowsTray {
    fn start(&mut self, stop: StopSignal) -> Result<(), TrayError> {
        if self.thread.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = bounded::<Result<(), TrayError>>(1);
        let state = self.state.clone();
        let closing = Arc::clone(&self.closing);

        let handle = thread::Builder::new().name("tray".into()).spawn(move || {
            let (_tray, actions) = match build_icon(&state) {
                Ok(built) => {
                    let _ = ready_tx.send(Ok(()));
                    built
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            let events = MenuEvent::receiver();
            while !closing.load(Ordering::SeqCst) {
                pump_messages();

                while let Ok(event) = events.try_recv() {
                    if actions.get(&event.id) == Some(&MenuAction::Quit) {
                        tracing::info!("[Tray] Quit selected");
                        stop.raise();
                        closing.store(true, Ordering::SeqCst);
                    }
                }

                thread::sleep(PUMP_INTERVAL);
            }

            tracing::debug!("[Tray] Run loop finished");
        })?;

        let ready = ready_rx.recv().unwrap_or(Err(TrayError::Vanished));
        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!("[Tray] Icon ready");
        self.thread = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("[Tray] Tray thread panicked");
            } else {
                tracing::info!("[Tray] Stopped");
            }
        }
    }
}
