use super::{MenuState, Tray, TrayError};
use crate::lifecycle::StopSignal;

/// Stand-in where no notification area is wired up
pub struct HeadlessTray {
    state: MenuState,
    started: bool,
}

impl HeadlessTray {
    pub fn new(state: MenuState) -> Self {
        Self { state, started: false }
    }
}

impl Tray for HeadlessTray {
    fn start(&mut self, _stop: StopSignal) -> Result<(), TrayError> {
        self.started = true;
        if let Some(header) = self.state.build_menu().first() {
            tracing::info!("[Tray] {} (no tray on this platform, stop with Ctrl-C)", header.label);
        }
        Ok(())
    }

    fn stop(&mut self) {
        if std::mem::take(&mut self.started) {
            tracing::debug!("[Tray] Headless tray stopped");
        }
    }
}
