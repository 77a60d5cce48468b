// Rhythm spelling - note values to a playable note sequence
// Used by rhythm-practice widgets that feed the sequence player

use crate::sequencer::note::{Note, NoteId};
use crate::sequencer::timeline::Tempo;
use std::fmt;

/// Note value relative to a quarter-note beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
    DottedHalf,
    DottedQuarter,
    DottedEighth,
    DottedSixteenth,
    EighthTriplet,
    EighthQuintuplet,
    EighthSextuplet,
}

impl NoteValue {
    pub const ALL: [NoteValue; 14] = [
        NoteValue::Whole,
        NoteValue::Half,
        NoteValue::Quarter,
        NoteValue::Eighth,
        NoteValue::Sixteenth,
        NoteValue::ThirtySecond,
        NoteValue::SixtyFourth,
        NoteValue::DottedHalf,
        NoteValue::DottedQuarter,
        NoteValue::DottedEighth,
        NoteValue::DottedSixteenth,
        NoteValue::EighthTriplet,
        NoteValue::EighthQuintuplet,
        NoteValue::EighthSextuplet,
    ];

    /// Length in beats
    pub fn beats(self) -> f64 {
        match self {
            NoteValue::Whole => 4.0,
            NoteValue::Half => 2.0,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
            NoteValue::ThirtySecond => 0.125,
            NoteValue::SixtyFourth => 0.0625,
            NoteValue::DottedHalf => 3.0,
            NoteValue::DottedQuarter => 1.5,
            NoteValue::DottedEighth => 0.75,
            NoteValue::DottedSixteenth => 0.375,
            NoteValue::EighthTriplet => 1.0 / 3.0,
            NoteValue::EighthQuintuplet => 1.0 / 5.0,
            NoteValue::EighthSextuplet => 1.0 / 6.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NoteValue::Whole => "whole",
            NoteValue::Half => "half",
            NoteValue::Quarter => "quarter",
            NoteValue::Eighth => "eighth",
            NoteValue::Sixteenth => "sixteenth",
            NoteValue::ThirtySecond => "thirtysecond",
            NoteValue::SixtyFourth => "sixtyfourth",
            NoteValue::DottedHalf => "dotted-half",
            NoteValue::DottedQuarter => "dotted-quarter",
            NoteValue::DottedEighth => "dotted-eighth",
            NoteValue::DottedSixteenth => "dotted-sixteenth",
            NoteValue::EighthTriplet => "eighth-triplet",
            NoteValue::EighthQuintuplet => "eighth-quintuplet",
            NoteValue::EighthSextuplet => "eighth-sixtuplet",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    pub fn is_dotted(self) -> bool {
        matches!(
            self,
            NoteValue::DottedHalf
                | NoteValue::DottedQuarter
                | NoteValue::DottedEighth
                | NoteValue::DottedSixteenth
        )
    }

    pub fn is_tuplet(self) -> bool {
        matches!(
            self,
            NoteValue::EighthTriplet | NoteValue::EighthQuintuplet | NoteValue::EighthSextuplet
        )
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a rhythm: a sounding note or a rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RhythmStep {
    pub value: NoteValue,
    pub rest: bool,
}

impl RhythmStep {
    pub fn note(value: NoteValue) -> Self {
        Self { value, rest: false }
    }

    pub fn rest(value: NoteValue) -> Self {
        Self { value, rest: true }
    }

    /// Parse `quarter` or `rest:quarter`
    pub fn parse(text: &str) -> Option<Self> {
        match text.strip_prefix("rest:") {
            Some(value) => NoteValue::from_name(value).map(Self::rest),
            None => NoteValue::from_name(text).map(Self::note),
        }
    }
}

/// Spell a rhythm as notes at a tempo, all on one pitch
///
/// Rests advance time without producing a note. Note ids are the step index.
pub fn rhythm_to_notes(steps: &[RhythmStep], tempo: Tempo, pitch: u8) -> Vec<Note> {
    let seconds_per_beat = tempo.beat_duration_seconds();
    let mut beat = 0.0;
    let mut notes = Vec::with_capacity(steps.len());

    for (index, step) in steps.iter().enumerate() {
        let length = step.value.beats() * seconds_per_beat;
        if !step.rest {
            notes.push(Note::new(
                index as NoteId,
                pitch,
                beat * seconds_per_beat,
                length,
                100,
            ));
        }
        beat += step.value.beats();
    }

    notes
}
