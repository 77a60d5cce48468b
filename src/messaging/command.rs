// Commands sent from the scheduling thread to the audio callback

use crate::audio::clock::Tone;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Start a tone at its absolute audio clock time
    ScheduleTone(Tone),
    /// Master output gain in [0, 1]
    SetMasterGain(f32),
}
