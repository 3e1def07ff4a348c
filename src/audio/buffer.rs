//! # Decoded Audio Buffers
//!
//! A decoded recording as it arrives from the client: one float sequence per
//! channel plus the sample rate. The buffer is owned by the caller and is never
//! modified by the encoder.
//!
//! ## Key Features:
//! - **Planar storage**: `channels[c][frame]`, the layout browsers decode into
//! - **Interleaved input**: raw uploads are frame-major and get split per channel
//! - **Validation**: one place that checks rate, channel count and channel lengths

use super::WavError;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Largest channel count the WAV `fmt ` chunk can describe (a u16 field).
pub const MAX_CHANNELS: usize = u16::MAX as usize;

/// Decoded, uncompressed multi-channel audio.
///
/// ## Invariant (checked by [`DecodedAudioBuffer::validate`]):
/// Every channel holds exactly `frame_count` samples. Samples are nominally in
/// [-1.0, 1.0]; values outside that range are clamped at encode time.
///
/// Fields are public because the buffer is plain caller-owned data; the
/// encoder validates before it reads anything.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioBuffer {
    /// Frames per second (e.g. 16000, 44100, 48000)
    pub sample_rate: u32,

    /// One sample sequence per channel
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudioBuffer {
    /// Wrap planar channel data. No validation happens here.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self { sample_rate, channels }
    }

    /// Single-channel buffer.
    #[cfg(test)]
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    /// Buffer of `frame_count` zero samples on every channel.
    #[cfg(test)]
    pub fn silence(sample_rate: u32, channel_count: usize, frame_count: usize) -> Self {
        Self::new(sample_rate, vec![vec![0.0; frame_count]; channel_count])
    }

    /// Split frame-major interleaved samples into per-channel sequences.
    ///
    /// ## Example:
    /// `[l0, r0, l1, r1]` with 2 channels becomes `[[l0, l1], [r0, r1]]`.
    ///
    /// ## Errors:
    /// `InvalidArgument` when `channel_count` is zero or above [`MAX_CHANNELS`],
    /// the sample rate is zero, or the sample count is not a whole number of
    /// frames. The channel bound is checked before anything is allocated.
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        samples: &[f32],
    ) -> Result<Self, WavError> {
        if channel_count == 0 {
            return Err(WavError::InvalidArgument(
                "Channel count must be at least 1".to_string(),
            ));
        }
        if channel_count > MAX_CHANNELS {
            return Err(WavError::InvalidArgument(format!(
                "{} channels exceed the WAV limit of {}",
                channel_count, MAX_CHANNELS
            )));
        }
        if samples.len() % channel_count != 0 {
            return Err(WavError::InvalidArgument(format!(
                "{} interleaved samples do not divide into {} channels",
                samples.len(),
                channel_count
            )));
        }

        let frame_count = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frame_count); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        let buffer = Self::new(sample_rate, channels);
        buffer.validate()?;
        Ok(buffer)
    }

    /// Parse interleaved little-endian `f32` bytes (the raw upload format).
    ///
    /// ## Rust Concepts:
    /// - **Cursor**: reads the byte slice as if it were a file
    /// - **ReadBytesExt**: `read_f32::<LittleEndian>()` decodes one sample at a time
    pub fn from_f32le_bytes(
        sample_rate: u32,
        channel_count: usize,
        data: &[u8],
    ) -> Result<Self, WavError> {
        if data.len() % 4 != 0 {
            return Err(WavError::InvalidArgument(format!(
                "Raw audio length {} is not a multiple of 4 bytes (f32 samples)",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        let mut samples = Vec::with_capacity(data.len() / 4);
        while let Ok(sample) = cursor.read_f32::<LittleEndian>() {
            samples.push(sample);
        }

        Self::from_interleaved(sample_rate, channel_count, &samples)
    }

    /// Check the buffer and return its frame count.
    ///
    /// ## Errors:
    /// - `sample_rate == 0`
    /// - no channels
    /// - channels of different lengths
    pub fn validate(&self) -> Result<usize, WavError> {
        if self.sample_rate == 0 {
            return Err(WavError::InvalidArgument(
                "Sample rate must be greater than 0".to_string(),
            ));
        }

        let first = self.channels.first().ok_or_else(|| {
            WavError::InvalidArgument("Channel count must be at least 1".to_string())
        })?;
        let frame_count = first.len();

        if let Some((index, channel)) = self
            .channels
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != frame_count)
        {
            return Err(WavError::InvalidArgument(format!(
                "Channel {} has {} samples, expected {} (all channels must have equal length)",
                index,
                channel.len(),
                frame_count
            )));
        }

        Ok(frame_count)
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel (length of the first channel; 0 when there are none).
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// True when there are no frames to encode.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration in seconds (`frame_count / sample_rate`).
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved_splits_channels() {
        let buffer = DecodedAudioBuffer::from_interleaved(8000, 2, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.channels[0], vec![0.1, 0.3, 0.5]);
        assert_eq!(buffer.channels[1], vec![0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_from_interleaved_rejects_partial_frame() {
        let result = DecodedAudioBuffer::from_interleaved(8000, 2, &[0.1, 0.2, 0.3]);
        assert!(matches!(result, Err(WavError::InvalidArgument(_))));
    }

    #[test]
    fn test_from_interleaved_rejects_zero_channels() {
        let result = DecodedAudioBuffer::from_interleaved(8000, 0, &[]);
        assert!(matches!(result, Err(WavError::InvalidArgument(_))));
    }

    #[test]
    fn test_from_interleaved_rejects_too_many_channels() {
        for channels in [MAX_CHANNELS + 1, 1 << 36, usize::MAX] {
            let result = DecodedAudioBuffer::from_f32le_bytes(16000, channels, &[]);
            assert!(matches!(result, Err(WavError::InvalidArgument(_))));
        }

        let widest = DecodedAudioBuffer::from_interleaved(16000, MAX_CHANNELS, &[]).unwrap();
        assert_eq!(widest.channel_count(), MAX_CHANNELS);
        assert!(widest.is_empty());
    }

    #[test]
    fn test_from_f32le_bytes() {
        let mut data = Vec::new();
        for sample in [0.25f32, -0.5, 1.0, 0.0] {
            data.extend_from_slice(&sample.to_le_bytes());
        }

        let buffer = DecodedAudioBuffer::from_f32le_bytes(16000, 1, &data).unwrap();
        assert_eq!(buffer.channels[0], vec![0.25, -0.5, 1.0, 0.0]);

        // Truncated sample
        assert!(DecodedAudioBuffer::from_f32le_bytes(16000, 1, &data[..7]).is_err());
    }

    #[test]
    fn test_validate_rejects_mismatched_lengths() {
        let buffer = DecodedAudioBuffer::new(44100, vec![vec![0.0; 100], vec![0.0; 99]]);
        assert!(matches!(buffer.validate(), Err(WavError::InvalidArgument(_))));
    }

    #[test]
    fn test_validate_rejects_zero_rate_and_no_channels() {
        assert!(DecodedAudioBuffer::silence(0, 1, 10).validate().is_err());
        assert!(DecodedAudioBuffer::new(16000, Vec::new()).validate().is_err());
    }

    #[test]
    fn test_duration() {
        let buffer = DecodedAudioBuffer::silence(16000, 2, 8000);
        assert_eq!(buffer.validate().unwrap(), 8000);
        assert!((buffer.duration_seconds() - 0.5).abs() < f64::EPSILON);
    }
}
