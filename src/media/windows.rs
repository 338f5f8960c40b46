use std::io;
use std::sync::{Arc, OnceLock};

use tokio::runtime::Runtime;

// We use the `windows` crate for the media session and process snapshot
use windows::Foundation::TimeSpan;
use windows::Media::Control::GlobalSystemMediaTransportControlsSessionManager;
use windows::Media::Control::GlobalSystemMediaTransportControlsSessionPlaybackStatus;
use windows::Storage::Streams::{DataReader, IRandomAccessStreamReference};
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};

use super::{process_listed, MediaError, MediaSource, ProcessProbe};
use crate::track::{Artwork, ArtworkSource, Credits, PlaybackReport, Timeline};

/// TimeSpan ticks are 100ns
const TICKS_PER_SECOND: i64 = 10_000_000;

static MEDIA_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Shared current-thread runtime for the WinRT async calls (lazy load)
fn runtime() -> Result<&'static Runtime, MediaError> {
    if let Some(rt) = MEDIA_RUNTIME.get() {
        return Ok(rt);
    }
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(MEDIA_RUNTIME.get_or_init(|| rt))
}

fn session_error(e: windows::core::Error) -> MediaError {
    MediaError::Session(e.to_string())
}

fn whole_seconds(span: TimeSpan) -> i64 {
    span.Duration / TICKS_PER_SECOND
}

/// Thumbnail stream reference, opened only when the resolver asks for bytes
struct StreamThumbnail(IRandomAccessStreamReference);

impl ArtworkSource for StreamThumbnail {
    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        let rt = runtime().map_err(io::Error::other)?;
        let result: windows::core::Result<Vec<u8>> = rt.block_on(async {
            let stream = self.0.OpenReadAsync()?.await?;
            let size = stream.Size()?;
            if size == 0 {
                return Ok(Vec::new());
            }
            let reader = DataReader::CreateDataReader(&stream)?;
            reader.LoadAsync(size as u32)?.await?;
            let mut bytes = vec![0u8; size as usize];
            reader.ReadBytes(&mut bytes)?;
            Ok::<_, windows::core::Error>(bytes)
        });

        let bytes = result.map_err(io::Error::other)?;
        if bytes.is_empty() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "empty thumbnail stream"));
        }
        Ok(bytes)
    }
}

#[derive(Default)]
pub struct WindowsMediaSource {
    manager: Option<GlobalSystemMediaTransportControlsSessionManager>,
}

impl WindowsMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// RequestAsync is an expensive IPC call: acquire the manager ONCE and keep it.
    fn manager(&mut self) -> Result<GlobalSystemMediaTransportControlsSessionManager, MediaError> {
        if let Some(manager) = &self.manager {
            return Ok(manager.clone());
        }

        let rt = runtime()?;
        let manager = rt
            .block_on(async { GlobalSystemMediaTransportControlsSessionManager::RequestAsync()?.await })
            .map_err(session_error)?;

        tracing::info!("[Media/Windows] Session manager acquired");
        self.manager = Some(manager.clone());
        Ok(manager)
    }
}

impl MediaSource for WindowsMediaSource {
    fn poll(&mut self) -> Result<Option<PlaybackReport>, MediaError> {
        let manager = self.manager()?;
        let rt = runtime()?;

        // No current session comes back as an error from GetCurrentSession
        let session = match manager.GetCurrentSession() {
            Ok(session) => session,
            Err(_) => return Ok(None),
        };

        let info = match session.GetPlaybackInfo() {
            Ok(info) => info,
            Err(_) => return Ok(None),
        };

        let is_playing = info
            .PlaybackStatus()
            .map(|s| s == GlobalSystemMediaTransportControlsSessionPlaybackStatus::Playing)
            .unwrap_or(false);

        let timeline = session.GetTimelineProperties().ok().and_then(|props| {
            let position = props.Position().ok()?;
            let end = props.EndTime().ok()?;
            Some(Timeline {
                position_secs: whole_seconds(position),
                end_secs: whole_seconds(end),
            })
        });

        let props = rt.block_on(async {
            match session.TryGetMediaPropertiesAsync() {
                Ok(op) => op.await.ok(),
                Err(_) => None,
            }
        });
        let Some(props) = props else {
            return Ok(None);
        };

        let title = props.Title().ok().map(|h| h.to_string());
        let credits = props.Artist().ok().map(|h| Credits::Combined(h.to_string()));
        let artwork = props
            .Thumbnail()
            .ok()
            .map(|thumb| Artwork::Handle(Arc::new(StreamThumbnail(thumb))))
            .unwrap_or_default();

        Ok(Some(PlaybackReport {
            is_playing,
            timeline,
            title,
            credits,
            artwork,
        }))
    }
}

/// Walks the ToolHelp process snapshot
#[derive(Default)]
pub struct WindowsProcessProbe;

fn running_process_names() -> windows::core::Result<Vec<String>> {
    let mut names = Vec::new();

    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)?;
        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut next = Process32FirstW(snapshot, &mut entry);
        while next.is_ok() {
            let len = entry
                .szExeFile
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(entry.szExeFile.len());
            names.push(String::from_utf16_lossy(&entry.szExeFile[..len]));
            next = Process32NextW(snapshot, &mut entry);
        }

        let _ = CloseHandle(snapshot);
    }

    Ok(names)
}

impl ProcessProbe for WindowsProcessProbe {
    fn is_running(&self, process_name: &str) -> bool {
        match running_process_names() {
            Ok(names) => process_listed(names, process_name),
            Err(e) => {
                tracing::warn!("[Media/Windows] Process snapshot failed: {}", e);
                false
            }
        }
    }
}
