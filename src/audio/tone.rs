// Tone renderer - turns committed tones into samples at their exact start frame
// Runs inside the output callback: no allocations after construction

use crate::audio::clock::Tone;
use crate::audio::dsp_utils::{fade_gain, flush_denormals_to_zero, soft_clip};
use std::f32::consts::TAU;

/// Attack/release ramp applied to every tone to avoid clicks
const FADE_MS: f64 = 2.0;

/// One sine voice bound to an absolute frame range
#[derive(Debug, Clone)]
struct ToneVoice {
    start_sample: u64,
    end_sample: u64,
    phase: f32,
    phase_increment: f32,
    gain: f32,
}

impl ToneVoice {
    fn is_finished(&self, position: u64) -> bool {
        position >= self.end_sample
    }

    fn next_sample(&mut self, position: u64, fade_samples: u64) -> f32 {
        if position < self.start_sample || position >= self.end_sample {
            return 0.0;
        }
        let length = self.end_sample - self.start_sample;
        let envelope = fade_gain(position - self.start_sample, length, fade_samples);
        let sample = (self.phase * TAU).sin() * self.gain * envelope;

        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

/// Mixes independent tone voices
///
/// Tones committed for the past start on the next rendered frame, tones for
/// the future wait until their start frame comes up.
#[derive(Debug)]
pub struct ToneMixer {
    voices: Vec<ToneVoice>,
    max_voices: usize,
    sample_rate: f64,
    fade_samples: u64,
    dropped: u64,
}

impl ToneMixer {
    pub fn new(sample_rate: f32, max_voices: usize) -> Self {
        let sample_rate = sample_rate as f64;
        Self {
            voices: Vec::with_capacity(max_voices),
            max_voices,
            sample_rate,
            fade_samples: ((FADE_MS / 1000.0) * sample_rate) as u64,
            dropped: 0,
        }
    }

    /// Queue a tone while the callback is at frame `position`
    ///
    /// A tone whose start frame already passed starts at `position` and keeps
    /// its full length. Returns false when every voice slot is taken.
    pub fn add(&mut self, tone: &Tone, position: u64) -> bool {
        if self.voices.len() >= self.max_voices {
            self.dropped += 1;
            return false;
        }
        let start_sample =
            ((tone.start_time.max(0.0) * self.sample_rate).round() as u64).max(position);
        let length = (tone.duration * self.sample_rate).round() as u64;
        if length == 0 {
            return true;
        }
        self.voices.push(ToneVoice {
            start_sample,
            end_sample: start_sample + length,
            phase: 0.0,
            phase_increment: tone.frequency_hz / self.sample_rate as f32,
            gain: tone.gain,
        });
        true
    }

    /// Render the mixed sample for absolute frame `position`
    pub fn next_sample(&mut self, position: u64) -> f32 {
        let fade = self.fade_samples;
        let mut mix = 0.0;
        for voice in self.voices.iter_mut() {
            mix += voice.next_sample(position, fade);
        }
        flush_denormals_to_zero(soft_clip(mix))
    }

    /// Drop voices that ended before `position`
    pub fn retire_finished(&mut self, position: u64) {
        self.voices.retain(|v| !v.is_finished(position));
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Tones rejected because the mixer was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
