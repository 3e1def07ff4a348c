//! # Sample Quantization
//!
//! Conversion between float amplitudes in [-1.0, 1.0] and signed 16-bit PCM.
//!
//! ## Asymmetric scaling:
//! The signed 16-bit range is [-32768, 32767], so negative samples are scaled by
//! 32768 and non-negative samples by 32767. Both ends of the float range land
//! exactly on the ends of the integer range and the positive side never overflows.

/// Scale applied to negative samples (magnitude of `i16::MIN`).
pub const NEGATIVE_SCALE: f32 = 32768.0;

/// Scale applied to non-negative samples (`i16::MAX`).
pub const POSITIVE_SCALE: f32 = 32767.0;

/// Convert one float sample to a signed 16-bit PCM value.
///
/// ## Algorithm:
/// 1. Clamp to [-1.0, 1.0] (upstream filters can overshoot slightly)
/// 2. Negative values: `round(s * 32768)`, clamped to >= -32768
/// 3. Everything else: `round(s * 32767)`
///
/// `round` rounds half away from zero, so 0.5 becomes 16384.
/// NaN has no amplitude and becomes silence (0).
pub fn float_to_pcm16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }

    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * NEGATIVE_SCALE).round().max(i16::MIN as f32) as i16
    } else {
        (clamped * POSITIVE_SCALE).round() as i16
    }
}

/// Convert a signed 16-bit PCM value back to a float amplitude.
///
/// Inverse of [`float_to_pcm16`] up to quantization error (at most 1/32767).
#[cfg(test)]
pub fn pcm16_to_float(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / NEGATIVE_SCALE
    } else {
        sample as f32 / POSITIVE_SCALE
    }
}
