//! Rich presence activity payload.

use serde::Serialize;

use crate::track::TrackSnapshot;

/// Activity type shown as "Listening to ..."
pub const ACTIVITY_LISTENING: u8 = 2;

pub const PAUSE_ICON: &str = "pause";
pub const PAUSE_LABEL: &str = "Paused";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub assets: Assets,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assets {
    pub large_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

/// Epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

impl Activity {
    /// Playing tracks count down to the end of the window; paused ones show
    /// elapsed time since the pause marker and carry the pause badge.
    pub fn from_snapshot(snapshot: &TrackSnapshot) -> Self {
        let mut assets = Assets {
            large_image: snapshot.artwork.url().to_string(),
            large_text: snapshot.album.clone(),
            small_image: None,
            small_text: None,
        };

        let timestamps = if snapshot.is_playing {
            snapshot.window.map(|window| Timestamps {
                start: Some(window.start),
                end: Some(window.end),
            })
        } else {
            assets.small_image = Some(PAUSE_ICON.to_string());
            assets.small_text = Some(PAUSE_LABEL.to_string());
            snapshot.paused_since.map(|since| Timestamps {
                start: Some(since),
                end: None,
            })
        };

        Self {
            kind: ACTIVITY_LISTENING,
            details: snapshot.title.clone(),
            state: snapshot.artist.clone(),
            assets,
            timestamps,
        }
    }
}
