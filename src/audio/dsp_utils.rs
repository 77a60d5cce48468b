// DSP hygiene helpers for the output callback

/// Flush denormals to zero
///
/// Denormal floats (extremely close to 0) can stall some CPUs; tails of
/// decaying tones reach that range quickly.
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Soft clipping with tanh
///
/// Several overlapping tones (metronome plus notes) can sum above 1.0.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Gain of a linear attack/release ramp
///
/// `position` and `length` are in frames; `ramp` is the fade length at each end.
#[inline]
pub fn fade_gain(position: u64, length: u64, ramp: u64) -> f32 {
    if ramp == 0 || length == 0 {
        return 1.0;
    }
    let ramp = ramp.min(length / 2).max(1);
    let from_end = length.saturating_sub(position);
    let edge = position.min(from_end);
    if edge >= ramp {
        1.0
    } else {
        edge as f32 / ramp as f32
    }
}
