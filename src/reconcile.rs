/// State reconciliation loop.
///
/// Every tick polls the player, compares what it sees against the identity
/// published last time and picks exactly one case:
///
/// | case          | condition                                              |
/// |---------------|--------------------------------------------------------|
/// | `Teardown`    | player gone, or title/artist/album missing              |
/// | `PauseToggle` | same track, play state flipped                          |
/// | `NewTrack`    | different track                                         |
/// | `Steady`      | nothing changed (republished to keep the clock honest)  |
///
/// A teardown while already disconnected is a no-op, so an absent player just
/// keeps landing in `Teardown` without touching the presence service.
///
use std::time::Duration;

use crate::artwork::{ImageHost, ThumbnailResolver};
use crate::lifecycle::StopSignal;
use crate::media::{MediaError, MediaSource, ProcessProbe};
use crate::presence::{PresenceConnector, PresencePublisher, PublishOutcome, TeardownOutcome};
use crate::track::{unix_now, Artwork, Identity, TrackSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickCase {
    Teardown,
    PauseToggle,
    NewTrack,
    Steady,
}

/// What the selected case ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    TornDown(TeardownOutcome),
    Publish(PublishOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub case: TickCase,
    pub effect: TickEffect,
}

/// Pure case selection, in priority order
pub fn classify(source_active: bool, previous: &Identity, current: &Identity) -> TickCase {
    if !source_active || current.fields_missing() {
        TickCase::Teardown
    } else if !previous.same_track(current) {
        TickCase::NewTrack
    } else if previous.is_playing != current.is_playing {
        TickCase::PauseToggle
    } else {
        TickCase::Steady
    }
}

pub struct Reconciler<S, P, H, C: PresenceConnector> {
    source: S,
    probe: P,
    resolver: ThumbnailResolver<H>,
    publisher: PresencePublisher<C>,
    /// Executable to watch; `None` lets the session alone decide
    watch_process: Option<String>,
    snapshot: TrackSnapshot,
    known: Identity,
}

impl<S, P, H, C> Reconciler<S, P, H, C>
where
    S: MediaSource,
    P: ProcessProbe,
    H: ImageHost,
    C: PresenceConnector,
{
    pub fn new(
        source: S,
        probe: P,
        resolver: ThumbnailResolver<H>,
        publisher: PresencePublisher<C>,
        watch_process: Option<String>,
    ) -> Self {
        Self {
            source,
            probe,
            resolver,
            publisher,
            watch_process,
            snapshot: TrackSnapshot::default(),
            known: Identity::default(),
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> &TrackSnapshot {
        &self.snapshot
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    fn source_alive(&self) -> bool {
        match &self.watch_process {
            Some(name) => self.probe.is_running(name),
            None => true,
        }
    }

    /// One poll → diff → act pass. A failed media query skips the tick untouched.
    pub fn tick(&mut self, now: i64) -> Result<TickReport, MediaError> {
        let alive = self.source_alive();
        // This poll's own artwork, in case the snapshot is still holding the previous track's
        let mut polled_artwork = Artwork::Absent;
        if alive {
            let report = self.source.poll()?;
            if let Some(report) = &report {
                polled_artwork = report.artwork.clone();
            }
            self.snapshot.absorb(report, now, false);
        }

        let current = self.snapshot.identity();
        let case = classify(alive, &self.known, &current);

        let effect = match case {
            TickCase::Teardown => {
                let was_idle = self.known == Identity::default();
                let outcome = self.teardown(now);
                match (outcome, was_idle) {
                    (TeardownOutcome::AlreadyDown, true) => {
                        tracing::debug!("[Loop] Player still inactive, nothing to tear down")
                    }
                    (TeardownOutcome::AlreadyDown, false) => {
                        tracing::info!("[Loop] Player gone or nothing playing, presence already down")
                    }
                    (TeardownOutcome::Disconnected, _) => {
                        tracing::info!("[Loop] Player gone or nothing playing, presence cleared")
                    }
                    (TeardownOutcome::ForcedDown, _) => {
                        tracing::info!("[Loop] Presence disconnect raised, state reset anyway")
                    }
                }
                TickEffect::TornDown(outcome)
            }
            TickCase::PauseToggle => {
                tracing::info!(
                    "[Loop] {}: {}",
                    if current.is_playing { "Resumed" } else { "Paused" },
                    current.title.as_deref().unwrap_or_default()
                );
                TickEffect::Publish(self.toggle_pause(now))
            }
            TickCase::NewTrack => {
                tracing::info!(
                    "[Loop] New track: {} - {}",
                    current.artist.as_deref().unwrap_or_default(),
                    current.title.as_deref().unwrap_or_default()
                );
                TickEffect::Publish(self.new_track(now, polled_artwork))
            }
            TickCase::Steady => {
                tracing::debug!(
                    "[Loop] Same track, {} state retained",
                    if current.is_playing { "playing" } else { "paused" }
                );
                TickEffect::Publish(self.steady(now))
            }
        };

        self.known = self.snapshot.identity();
        Ok(TickReport { case, effect })
    }

    fn teardown(&mut self, now: i64) -> TeardownOutcome {
        self.snapshot.pause(now);
        let outcome = self.publisher.disconnect();
        self.snapshot.reset();
        outcome
    }

    fn toggle_pause(&mut self, now: i64) -> PublishOutcome {
        self.snapshot.mark_playback(now);
        self.publish()
    }

    fn new_track(&mut self, now: i64, polled_artwork: Artwork) -> PublishOutcome {
        self.snapshot.resume();
        self.snapshot.artwork = polled_artwork;

        // Fresh query with the artwork shortcut bypassed: identity already proved it's new
        match self.source.poll() {
            Ok(fresh) => self.snapshot.absorb(fresh, now, true),
            Err(e) => tracing::warn!("[Loop] Refetch for new track failed, keeping first poll: {}", e),
        }
        if self.snapshot.fields_missing() {
            tracing::debug!("[Loop] Track vanished during refetch, publish skipped");
            return PublishOutcome::Skipped;
        }

        self.snapshot.mark_playback(now);
        self.snapshot.artwork = self.resolver.resolve(&self.snapshot.artwork);
        self.publish()
    }

    fn steady(&mut self, now: i64) -> PublishOutcome {
        self.snapshot.mark_playback(now);
        self.publish()
    }

    fn publish(&mut self) -> PublishOutcome {
        // Artwork that was never resolved gets its first (and only) upload here
        if self.snapshot.artwork.is_unresolved() {
            self.snapshot.artwork = self.resolver.resolve(&self.snapshot.artwork);
        }
        self.publisher.publish(&self.snapshot)
    }

    /// Final teardown; shares the code path with the `Teardown` case
    pub fn shutdown(&mut self, now: i64) -> TeardownOutcome {
        let outcome = self.teardown(now);
        self.known = Identity::default();
        tracing::info!("[Loop] Shutdown teardown: {:?}", outcome);
        outcome
    }

    /// Poll until the stop signal is raised, then tear down.
    pub fn run(&mut self, stop: &StopSignal, interval: Duration) {
        tracing::info!("[Loop] Polling every {:?}", interval);

        while !stop.is_raised() {
            match self.tick(unix_now()) {
                Ok(report) => tracing::trace!("[Loop] {:?} → {:?}", report.case, report.effect),
                Err(e) => tracing::warn!("[Loop] Media query failed, skipping tick: {}", e),
            }
            if stop.wait_timeout(interval) {
                break;
            }
        }

        tracing::info!("[Loop] Stop requested");
        self.shutdown(unix_now());
    }
}
