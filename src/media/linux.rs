use std::fs;
use std::path::Path;

use mpris::{PlaybackStatus, PlayerFinder};

use super::{artwork_from_url, process_listed, MediaError, MediaSource, ProcessProbe};
use crate::track::{Artwork, Credits, PlaybackReport, Timeline};

#[derive(Default)]
pub struct LinuxMediaSource {
    finder: Option<PlayerFinder>,
}

impl LinuxMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn finder(&mut self) -> Result<&PlayerFinder, MediaError> {
        if self.finder.is_none() {
            let finder = PlayerFinder::new().map_err(|e| MediaError::Session(e.to_string()))?;
            tracing::info!("[Media/Linux] Connected to D-Bus session");
            self.finder = Some(finder);
        }
        self.finder
            .as_ref()
            .ok_or_else(|| MediaError::Session("player finder unavailable".to_string()))
    }
}

impl MediaSource for LinuxMediaSource {
    fn poll(&mut self) -> Result<Option<PlaybackReport>, MediaError> {
        // Find active player (eg. Spotify, VLC, Chrome). None around means no session.
        let player = match self.finder()?.find_active() {
            Ok(player) => player,
            Err(_) => return Ok(None),
        };

        let is_playing = player.get_playback_status().ok() == Some(PlaybackStatus::Playing);

        let meta = match player.get_metadata() {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!("[Media/Linux] {} has no metadata: {}", player.identity(), e);
                return Ok(None);
            }
        };

        let timeline = match (player.get_position().ok(), meta.length()) {
            (Some(position), Some(length)) => Some(Timeline {
                position_secs: position.as_secs() as i64,
                end_secs: length.as_secs() as i64,
            }),
            _ => None,
        };

        let credits = Credits::Split {
            artist: meta.artists().map(|a| a.join(", ")),
            album: meta.album_name().map(str::to_string),
        };

        let artwork = meta.art_url().map(artwork_from_url).unwrap_or(Artwork::Absent);

        Ok(Some(PlaybackReport {
            is_playing,
            timeline,
            title: meta.title().map(str::to_string),
            credits: Some(credits),
            artwork,
        }))
    }
}

/// Scans `/proc/<pid>/comm`
#[derive(Default)]
pub struct LinuxProcessProbe;

fn running_process_names(proc_root: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(proc_root) else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().chars().all(|c| c.is_ascii_digit()))
        .filter_map(|entry| fs::read_to_string(entry.path().join("comm")).ok())
        .map(|comm| comm.trim().to_string())
        .collect()
}

impl ProcessProbe for LinuxProcessProbe {
    fn is_running(&self, process_name: &str) -> bool {
        process_listed(running_process_names(Path::new("/proc")), process_name)
    }
}
