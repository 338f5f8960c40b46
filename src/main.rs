mod artwork;
mod config;
mod lifecycle;
mod logging;
mod media;
mod presence;
mod reconcile;
mod track;
mod tray;

use anyhow::Context;

use crate::artwork::{ImgurHost, ThumbnailResolver};
use crate::config::Settings;
use crate::lifecycle::StopSignal;
use crate::media::{PlatformMedia, PlatformProbe};
use crate::presence::{DiscordIpc, PresencePublisher};
use crate::reconcile::Reconciler;
use crate::tray::{MenuState, PlatformTray, Tray};

fn main() -> anyhow::Result<()> {
    // Missing credentials never reach the loop
    let settings = Settings::load().context("loading settings")?;

    // Keep the guard until the very end so the log file gets flushed
    let _log_guard = logging::init(&settings.log_dir)?;

    tracing::info!("[Main] === Nowcast {} ===", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "[Main] Poll interval {:?}, watching {}",
        settings.poll_interval,
        settings.watch_process.as_deref().unwrap_or("any media session")
    );

    // Tray Quit, Ctrl-C and SIGTERM all land on the same flag
    let stop = StopSignal::new();
    if let Err(e) = stop.register_os_signals() {
        tracing::warn!("[Main] Could not hook termination signals: {}", e);
    }

    let mut tray = PlatformTray::new(MenuState::default());
    if let Err(e) = tray.start(stop.clone()) {
        tracing::warn!("[Main] Tray unavailable, continuing without it: {}", e);
    }

    let mut reconciler = Reconciler::new(
        PlatformMedia::new(),
        PlatformProbe::default(),
        ThumbnailResolver::new(ImgurHost::new(&settings.upload_endpoint, &settings.imgur_client_id)),
        PresencePublisher::new(DiscordIpc::new(&settings.discord_client_id)),
        settings.watch_process.clone(),
    );

    // Blocks until the stop signal is raised, then tears the presence down
    reconciler.run(&stop, settings.poll_interval);

    tracing::info!("[Main] Shutting down");
    tray.stop();

    tracing::info!("[Main] ✓ Shutdown complete");
    Ok(())
}
