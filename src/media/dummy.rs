use std::sync::Once;

use super::{MediaError, MediaSource, ProcessProbe};
use crate::track::PlaybackReport;

static NOTICE: Once = Once::new();

#[derive(Default)]
pub struct DummyMediaSource;

impl DummyMediaSource {
    pub fn new() -> Self {
        Self
    }
}

impl MediaSource for DummyMediaSource {
    fn poll(&mut self) -> Result<Option<PlaybackReport>, MediaError> {
        NOTICE.call_once(|| tracing::warn!("[Media] Media sessions are not supported on this OS"));
        Ok(None)
    }
}

#[derive(Default)]
pub struct DummyProcessProbe;

impl ProcessProbe for DummyProcessProbe {
    fn is_running(&self, _process_name: &str) -> bool {
        false
    }
}
