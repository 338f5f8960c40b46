use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::track::{Artwork, ArtworkSource, PlaybackReport};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media session query failed: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Trait for querying the system media session (one call per tick)
pub trait MediaSource {
    /// `Ok(None)` means there is no playback session at all.
    fn poll(&mut self) -> Result<Option<PlaybackReport>, MediaError>;
}

/// Trait for checking whether the player process is alive
pub trait ProcessProbe {
    fn is_running(&self, process_name: &str) -> bool;
}

/// Cover art sitting on local disk (MPRIS players hand out `file://` URLs)
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub struct FileThumbnail {
    path: PathBuf,
}

impl ArtworkSource for FileThumbnail {
    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// Turn an art URL reported by the player into artwork.
/// Web URLs are already hosted; local files still need an upload.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub fn artwork_from_url(art_url: &str) -> Artwork {
    let art_url = art_url.trim();
    if art_url.starts_with("https://") || art_url.starts_with("http://") {
        return Artwork::Resolved(art_url.to_string());
    }
    if let Some(path) = art_url.strip_prefix("file://") {
        return Artwork::Handle(Arc::new(FileThumbnail {
            path: PathBuf::from(url_decode(path)),
        }));
    }
    Artwork::Absent
}

/// Minimal percent-decoder for file paths (handles spaces/special chars)
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                output.push(byte);
                i += 3;
                continue;
            }
        }
        output.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&output).into_owned()
}

/// Case-insensitive match against a list of running executable names.
/// Linux truncates `comm` to 15 bytes, so a truncated prefix also counts.
pub fn process_listed<I, S>(running: I, wanted: &str) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    running.into_iter().any(|name| {
        let name = name.as_ref().trim();
        name.eq_ignore_ascii_case(wanted)
            || (name.len() == 15 && wanted.len() > 15 && wanted.to_ascii_lowercase().starts_with(&name.to_ascii_lowercase()))
    })
}

// ==============================================================
// OS SELECTION FACTORY
// ==============================================================

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub type PlatformMedia = windows::WindowsMediaSource;
#[cfg(target_os = "windows")]
pub type PlatformProbe = windows::WindowsProcessProbe;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub type PlatformMedia = linux::LinuxMediaSource;
#[cfg(target_os = "linux")]
pub type PlatformProbe = linux::LinuxProcessProbe;

// Fallback for unsupported OS (macOS included for now)
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod dummy;
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub type PlatformMedia = dummy::DummyMediaSource;
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub type PlatformProbe = dummy::DummyProcessProbe;
