// Note representation for the sequence player
// A note is a recorded (or generated) pitch with an onset and a duration in seconds

use serde::{Deserialize, Serialize};

/// Unique identifier for notes
pub type NoteId = u64;

/// A note in a performance recording
///
/// Times are in seconds of song time, independent of playback speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Identity of the source note (kept through trimming and scaling)
    pub id: NoteId,

    /// MIDI note number (0-127, where 60 = C4)
    pub pitch: u8,

    /// Onset in seconds from the start of the recording
    pub onset: f64,

    /// Duration in seconds
    pub duration: f64,

    /// MIDI velocity (0-127)
    pub velocity: u8,
}

impl Note {
    /// Creates a new note
    pub fn new(id: NoteId, pitch: u8, onset: f64, duration: f64, velocity: u8) -> Self {
        assert!(pitch <= 127, "MIDI pitch must be 0-127");
        assert!(velocity <= 127, "MIDI velocity must be 0-127");

        Self {
            id,
            pitch,
            onset,
            duration,
            velocity,
        }
    }

    /// End of the note in song time
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }

    /// Whether the note can be scheduled at all
    ///
    /// Recordings occasionally contain notes with a broken onset or a
    /// negative length; those are skipped by the timeline builder.
    pub fn is_playable(&self) -> bool {
        self.onset.is_finite() && self.onset >= 0.0 && self.duration.is_finite() && self.duration >= 0.0
    }

    /// Equal-tempered frequency, A4 (MIDI 69) = 440 Hz
    pub fn frequency(&self) -> f32 {
        midi_to_frequency(self.pitch)
    }

    /// Get the note name (e.g., "C4", "A#5")
    pub fn note_name(&self) -> String {
        note_name(self.pitch)
    }
}

/// Name of a MIDI note number, octave 4 starting at middle C (60)
pub fn note_name(pitch: u8) -> String {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];

    let octave = (pitch / 12) as i32 - 1;
    let note_index = (pitch % 12) as usize;

    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Frequency in Hz of a MIDI note number
pub fn midi_to_frequency(pitch: u8) -> f32 {
    440.0 * 2f32.powf((pitch as f32 - 69.0) / 12.0)
}

/// Length of a recording: the latest end among playable notes
pub fn song_duration(notes: &[Note]) -> f64 {
    notes
        .iter()
        .filter(|note| note.is_playable())
        .map(Note::end)
        .fold(0.0, f64::max)
}
