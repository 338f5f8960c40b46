/// Track snapshot: one poll's view of playback, plus the metadata parsing rules
/// that turn raw media-session strings into title / artist / album.
///
use std::fmt;
use std::io;
use std::sync::Arc;

/// Sentinel artwork value used when no hosted image could be obtained
pub const DEFAULT_ARTWORK: &str = "default";

const EM_DASH: char = '—';
const STATION_SEPARATOR: &str = " — ";
const STATION_SUFFIXES: [&str; 2] = ["'s Station", "’s Station"];

/// Something that can hand over the raw bytes of a cover image on demand.
///
/// Reading is deferred until the thumbnail resolver actually needs the bytes,
/// so steady-state polls never touch the image stream.
pub trait ArtworkSource {
    fn read_bytes(&self) -> io::Result<Vec<u8>>;
}

/// Cover art as it moves through the pipeline
#[derive(Clone, Default)]
pub enum Artwork {
    #[default]
    Absent,
    /// Raw handle from the media source, not uploaded yet
    Handle(Arc<dyn ArtworkSource>),
    /// Hosted URL, or the `"default"` sentinel
    Resolved(String),
}

impl Artwork {
    pub fn is_absent(&self) -> bool {
        matches!(self, Artwork::Absent)
    }

    /// True while the value still needs a trip through the resolver
    pub fn is_unresolved(&self) -> bool {
        !matches!(self, Artwork::Resolved(_))
    }

    /// URL to advertise, falling back to the sentinel
    pub fn url(&self) -> &str {
        match self {
            Artwork::Resolved(url) => url,
            _ => DEFAULT_ARTWORK,
        }
    }
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artwork::Absent => write!(f, "Absent"),
            Artwork::Handle(_) => write!(f, "Handle(..)"),
            Artwork::Resolved(url) => f.debug_tuple("Resolved").field(url).finish(),
        }
    }
}

/// Position inside the track as reported by the source, in whole seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeline {
    pub position_secs: i64,
    pub end_secs: i64,
}

/// Artist / album credits as the source exposes them
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credits {
    /// Single "Artist — Album" field (Windows media sessions)
    Combined(String),
    /// Separately reported fields (MPRIS)
    Split {
        artist: Option<String>,
        album: Option<String>,
    },
}

/// Raw result of one media-session query
#[derive(Clone, Debug)]
pub struct PlaybackReport {
    pub is_playing: bool,
    pub timeline: Option<Timeline>,
    pub title: Option<String>,
    pub credits: Option<Credits>,
    pub artwork: Artwork,
}

/// Absolute playback window in epoch seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackWindow {
    pub start: i64,
    pub end: i64,
}

impl PlaybackWindow {
    pub fn from_timeline(timeline: Timeline, now: i64) -> Self {
        Self {
            start: now - timeline.position_secs,
            end: now + (timeline.end_secs - timeline.position_secs),
        }
    }
}

/// The `(title, artist, album, is_playing)` key used to detect meaningful change.
/// Window and artwork are left out on purpose: they drift every poll.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub is_playing: bool,
}

impl Identity {
    pub fn fields_missing(&self) -> bool {
        self.title.is_none() || self.artist.is_none() || self.album.is_none()
    }

    /// Same track, regardless of play state
    pub fn same_track(&self, other: &Identity) -> bool {
        self.title == other.title && self.artist == other.artist && self.album == other.album
    }
}

/// One poll's complete view of playback
#[derive(Clone, Debug, Default)]
pub struct TrackSnapshot {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork: Artwork,
    pub window: Option<PlaybackWindow>,
    pub is_playing: bool,
    pub paused_since: Option<i64>,
}

impl TrackSnapshot {
    pub fn identity(&self) -> Identity {
        Identity {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            is_playing: self.is_playing,
        }
    }

    pub fn fields_missing(&self) -> bool {
        self.identity().fields_missing()
    }

    /// Rebuild the snapshot from a fresh query.
    ///
    /// Metadata and window are replaced wholesale. Artwork is only replaced when
    /// `refresh_artwork` is set or nothing is held yet. The pause marker survives
    /// while playback stays stopped and is dropped as soon as it resumes.
    /// `None` (no session) resets everything.
    pub fn absorb(&mut self, report: Option<PlaybackReport>, now: i64, refresh_artwork: bool) {
        let Some(report) = report else {
            self.reset();
            return;
        };

        self.is_playing = report.is_playing;
        if self.is_playing {
            self.paused_since = None;
        }

        self.window = report
            .timeline
            .map(|timeline| PlaybackWindow::from_timeline(timeline, now));

        if self.artwork.is_absent() || refresh_artwork {
            self.artwork = report.artwork;
        }

        let (artist, album) = match report.credits {
            Some(Credits::Combined(raw)) => split_credits(&raw),
            Some(Credits::Split { artist, album }) => (clean(artist.as_deref()), clean(album.as_deref())),
            None => (None, None),
        };
        self.artist = artist;
        self.album = album;
        self.title = clean(report.title.as_deref());
    }

    /// Start the pause timer. Never moves once set.
    pub fn pause(&mut self, now: i64) {
        if self.paused_since.is_none() {
            self.paused_since = Some(now);
        }
    }

    pub fn resume(&mut self) {
        self.paused_since = None;
    }

    /// Mark paused or resumed according to the current play state
    pub fn mark_playback(&mut self, now: i64) {
        if self.is_playing {
            self.resume();
        } else {
            self.pause(now);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for TrackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        writeln!(f, "Title:   {}", show(&self.title))?;
        writeln!(f, "Artist:  {}", show(&self.artist))?;
        writeln!(f, "Album:   {}", show(&self.album))?;
        writeln!(f, "Artwork: {:?}", self.artwork)?;
        match self.window {
            Some(window) => writeln!(f, "Window:  {} → {}", window.start, window.end)?,
            None => writeln!(f, "Window:  -")?,
        }
        writeln!(f, "Playing: {}", self.is_playing)?;
        match self.paused_since {
            Some(ts) => write!(f, "Paused:  since {}", ts),
            None => write!(f, "Paused:  -"),
        }
    }
}

/// Current wall-clock time in epoch seconds
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Trim, and treat blank as missing
pub fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Drop a trailing " — <Someone>'s Station" radio qualifier.
/// Both the ASCII and the typographic apostrophe are accepted.
pub fn strip_station_suffix(raw: &str) -> &str {
    let Some(idx) = raw.rfind(STATION_SEPARATOR) else {
        return raw;
    };
    let tail = &raw[idx + STATION_SEPARATOR.len()..];
    if tail.contains(EM_DASH) {
        return raw;
    }
    if STATION_SUFFIXES.iter().any(|suffix| tail.ends_with(suffix)) {
        &raw[..idx]
    } else {
        raw
    }
}

/// Split a combined "Artist — Album" field.
///
/// The split happens on the first em-dash only; anything after it, further
/// em-dashes included, belongs to the album. Without an em-dash the whole
/// value is used for both artist and album.
pub fn split_credits(raw: &str) -> (Option<String>, Option<String>) {
    let combined = strip_station_suffix(raw.trim());

    match combined.split_once(EM_DASH) {
        Some((artist, album)) => (clean(Some(artist)), clean(Some(album))),
        None => {
            let both = clean(Some(combined));
            (both.clone(), both)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(title: &str, credits: &str, playing: bool) -> PlaybackReport {
        PlaybackReport {
            is_playing: playing,
            timeline: Some(Timeline { position_secs: 30, end_secs: 200 }),
            title: Some(title.to_string()),
            credits: Some(Credits::Combined(credits.to_string())),
            artwork: Artwork::Absent,
        }
    }

    #[test]
    fn test_station_suffix_is_stripped_before_split() {
        let (artist, album) = split_credits("Artist — Album — Listener's Station");
        assert_eq!(artist.as_deref(), Some("Artist"));
        assert_eq!(album.as_deref(), Some("Album"));
    }

    #[test]
    fn test_station_suffix_typographic_apostrophe() {
        let (artist, album) = split_credits("Artist — Album — Someone’s Station");
        assert_eq!(artist.as_deref(), Some("Artist"));
        assert_eq!(album.as_deref(), Some("Album"));
    }

    #[test]
    fn test_no_dash_duplicates_value() {
        let (artist, album) = split_credits("  SoloValue ");
        assert_eq!(artist.as_deref(), Some("SoloValue"));
        assert_eq!(album.as_deref(), Some("SoloValue"));
    }

    #[test]
    fn test_extra_dashes_stay_in_album() {
        let (artist, album) = split_credits("Artist — Album — Deluxe Edition");
        assert_eq!(artist.as_deref(), Some("Artist"));
        assert_eq!(album.as_deref(), Some("Album — Deluxe Edition"));
    }

    #[test]
    fn test_station_is_not_a_standalone_match() {
        // No separator before the station text, nothing to strip
        assert_eq!(strip_station_suffix("Bob's Station"), "Bob's Station");
        assert_eq!(strip_station_suffix("Artist — Album"), "Artist — Album");
    }

    #[test]
    fn test_blank_values_become_none() {
        assert_eq!(split_credits("   "), (None, None));
        assert_eq!(clean(Some("  ")), None);
        assert_eq!(clean(None), None);
        assert_eq!(clean(Some(" Title ")).as_deref(), Some("Title"));
    }

    #[test]
    fn test_absorb_computes_window_and_trims() {
        let mut snap = TrackSnapshot::default();
        snap.absorb(Some(report("  Song ", "Band — Record", true)), 1_000, false);

        assert_eq!(snap.title.as_deref(), Some("Song"));
        assert_eq!(snap.artist.as_deref(), Some("Band"));
        assert_eq!(snap.album.as_deref(), Some("Record"));
        assert_eq!(snap.window, Some(PlaybackWindow { start: 970, end: 1_170 }));
        assert!(!snap.fields_missing());
    }

    #[test]
    fn test_absorb_none_resets() {
        let mut snap = TrackSnapshot::default();
        snap.absorb(Some(report("Song", "Band — Record", false)), 10, false);
        snap.pause(10);
        snap.absorb(None, 20, false);

        assert!(snap.title.is_none());
        assert!(snap.artist.is_none());
        assert!(snap.album.is_none());
        assert!(snap.window.is_none());
        assert!(snap.paused_since.is_none());
        assert!(!snap.is_playing);
        assert!(snap.artwork.is_absent());
    }

    #[test]
    fn test_artwork_is_sticky_unless_refreshed() {
        let mut snap = TrackSnapshot::default();
        snap.artwork = Artwork::Resolved("https://img/1.png".into());

        let mut next = report("Song", "Band — Record", true);
        next.artwork = Artwork::Resolved("https://img/2.png".into());

        snap.absorb(Some(next.clone()), 0, false);
        assert_eq!(snap.artwork.url(), "https://img/1.png");

        snap.absorb(Some(next), 0, true);
        assert_eq!(snap.artwork.url(), "https://img/2.png");
    }

    #[test]
    fn test_split_credits_are_cleaned() {
        let mut snap = TrackSnapshot::default();
        let mut r = report("Song", "", true);
        r.credits = Some(Credits::Split {
            artist: Some(" Band ".into()),
            album: Some("".into()),
        });
        snap.absorb(Some(r), 0, false);
        assert_eq!(snap.artist.as_deref(), Some("Band"));
        assert!(snap.album.is_none());
        assert!(snap.fields_missing());
    }

    #[test]
    fn test_pause_marker_is_idempotent() {
        let mut snap = TrackSnapshot::default();
        snap.absorb(Some(report("Song", "Band — Record", false)), 100, false);
        snap.mark_playback(100);
        assert_eq!(snap.paused_since, Some(100));

        snap.absorb(Some(report("Song", "Band — Record", false)), 105, false);
        snap.mark_playback(105);
        assert_eq!(snap.paused_since, Some(100));

        snap.absorb(Some(report("Song", "Band — Record", true)), 110, false);
        assert_eq!(snap.paused_since, None);
    }

    #[test]
    fn test_identity_ignores_window_and_artwork() {
        let mut a = TrackSnapshot::default();
        a.absorb(Some(report("Song", "Band — Record", true)), 0, false);
        let mut b = a.clone();
        b.window = None;
        b.artwork = Artwork::Resolved("x".into());
        assert_eq!(a.identity(), b.identity());
        assert!(a.identity().same_track(&b.identity()));
    }

    #[test]
    fn test_artwork_url_falls_back_to_sentinel() {
        assert_eq!(Artwork::Absent.url(), DEFAULT_ARTWORK);
        assert!(Artwork::Absent.is_unresolved());
        assert!(!Artwork::Resolved("u".into()).is_unresolved());
    }
}
