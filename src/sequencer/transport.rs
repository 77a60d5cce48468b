// Transport - playback state shared by the metronome and the sequence player

use std::fmt;

/// Transport state (stopped/playing/paused)
///
/// The metronome only ever uses `Stopped` and `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    /// Check if a poll loop is running
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, TransportState::Paused)
    }

    /// Check if a session exists (playing or paused)
    pub fn has_session(&self) -> bool {
        !matches!(self, TransportState::Stopped)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Stopped => "stopped",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
        };
        f.write_str(name)
    }
}
