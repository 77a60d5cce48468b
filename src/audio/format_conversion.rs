// Output format conversion for cpal streams
//
// Tones are mixed in f32 internally; the device may want f32, i16 or u16.
// Conversion goes through cpal's `FromSample<f32>`, allocation free.

use cpal::{FromSample, Sample};

/// Write one mono sample to every channel of an interleaved frame
#[inline]
pub fn write_mono_to_interleaved_frame<T>(internal_sample: f32, output_frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    let converted = T::from_sample(internal_sample.clamp(-1.0, 1.0));
    for channel_sample in output_frame.iter_mut() {
        *channel_sample = converted;
    }
}

/// Fill an interleaved buffer with the format's equilibrium value
#[inline]
pub fn write_silence<T>(output: &mut [T])
where
    T: Sample,
{
    for sample in output.iter_mut() {
        *sample = T::EQUILIBRIUM;
    }
}
