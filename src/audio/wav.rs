//! # RIFF/WAVE PCM16 Container
//!
//! Builds the `.wav` file that is uploaded to the speech provider and offered for
//! download, and reads WAV uploads back for metadata.
//!
//! ## File Layout (44-byte header, all integers little-endian):
//! ```text
//! 0   "RIFF"          4   u32 total_len - 8     8   "WAVE"
//! 12  "fmt "          16  u32 16                20  u16 1 (integer PCM)
//! 22  u16 channels    24  u32 sample_rate       28  u32 byte_rate
//! 32  u16 block_align 34  u16 16 (bits)         36  "data"
//! 40  u32 data_len    44  interleaved i16 samples
//! ```
//!
//! The output buffer is allocated once with its exact final size and the header
//! fields are appended in order.

use super::buffer::DecodedAudioBuffer;
use super::pcm::float_to_pcm16;
use super::WavError;
use serde::Serialize;
use std::io::Cursor;

/// Size of the canonical PCM header.
pub const WAV_HEADER_LEN: usize = 44;

/// Bytes per encoded sample (16-bit PCM).
pub const BYTES_PER_SAMPLE: usize = 2;

/// `fmt ` format tag for integer PCM.
pub const FORMAT_PCM: u16 = 1;

/// `fmt ` format tag for 32-bit float samples (only ever read, never written).
const FORMAT_IEEE_FLOAT: u16 = 3;

const BITS_PER_SAMPLE: u16 = 16;
const FMT_CHUNK_LEN: u32 = 16;

/// An encoded WAV file.
///
/// Length is always `44 + frame_count * channel_count * 2`. The bytes are
/// immutable once produced; callers upload, play back or discard them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavContainer {
    bytes: Vec<u8>,
}

impl WavContainer {
    /// Whole file, header included.
    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take ownership of the file bytes (e.g. for an upload body).
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total file length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Never true for an encoded file: the header alone is 44 bytes.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The interleaved PCM payload after the header.
    #[cfg(test)]
    pub fn pcm_data(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }
}

/// Encode a decoded buffer as a 16-bit PCM WAV file.
///
/// ## Process:
/// 1. Validate the buffer (rate > 0, at least one channel, equal lengths)
/// 2. Check the sizes fit the 16/32-bit header fields
/// 3. Append the header fields in order
/// 4. Append samples frame by frame, channel 0 first within each frame
///
/// ## Errors:
/// `WavError::InvalidArgument` for any malformed input. Nothing is written
/// before validation passes, so a partial file is never produced.
pub fn encode_wav(buffer: &DecodedAudioBuffer) -> Result<WavContainer, WavError> {
    let frame_count = buffer.validate()?;

    let channel_count = u16::try_from(buffer.channel_count()).map_err(|_| {
        WavError::InvalidArgument(format!(
            "{} channels exceed the WAV limit of {}",
            buffer.channel_count(),
            u16::MAX
        ))
    })?;

    let data_len = frame_count
        .checked_mul(buffer.channel_count())
        .and_then(|samples| samples.checked_mul(BYTES_PER_SAMPLE))
        .and_then(|len| u32::try_from(len).ok())
        .filter(|len| len.checked_add(WAV_HEADER_LEN as u32 - 8).is_some())
        .ok_or_else(|| {
            WavError::InvalidArgument(format!(
                "{} frames x {} channels is too long for a WAV file",
                frame_count, channel_count
            ))
        })?;

    let block_align = channel_count.checked_mul(BYTES_PER_SAMPLE as u16).ok_or_else(|| {
        WavError::InvalidArgument(format!("{} channels overflow the block alignment field", channel_count))
    })?;
    let byte_rate = buffer.sample_rate.checked_mul(block_align as u32).ok_or_else(|| {
        WavError::InvalidArgument(format!(
            "Sample rate {} with {} channels overflows the byte rate field",
            buffer.sample_rate, channel_count
        ))
    })?;

    let total_len = WAV_HEADER_LEN + data_len as usize;
    let mut bytes = Vec::with_capacity(total_len);

    // RIFF chunk descriptor
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&((total_len - 8) as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    // fmt sub-chunk
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    bytes.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    bytes.extend_from_slice(&channel_count.to_le_bytes());
    bytes.extend_from_slice(&buffer.sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data sub-chunk
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for frame in 0..frame_count {
        for channel in &buffer.channels {
            bytes.extend_from_slice(&float_to_pcm16(channel[frame]).to_le_bytes());
        }
    }

    debug_assert_eq!(bytes.len(), total_len);
    Ok(WavContainer { bytes })
}

/// Format details read back from a WAV file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WavInfo {
    pub format_tag: u16,
    pub channel_count: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub frame_count: usize,
    pub duration_seconds: f64,
}

/// Read the format and length of a WAV file without keeping its samples.
///
/// Used for upload metadata: a `.wav` upload reports its real duration.
/// The frame count comes from the `data` chunk size, so no samples are decoded.
pub fn inspect_wav(bytes: &[u8]) -> Result<WavInfo, WavError> {
    open_wav(bytes).map(|(info, _)| info)
}

/// Decode a 16-bit PCM WAV file into its info and interleaved samples.
#[cfg(test)]
pub fn decode_pcm16(bytes: &[u8]) -> Result<(WavInfo, Vec<i16>), WavError> {
    let (info, mut reader) = open_wav(bytes)?;
    if info.format_tag != FORMAT_PCM || info.bits_per_sample != BITS_PER_SAMPLE {
        return Err(WavError::Malformed(format!(
            "Expected 16-bit PCM, found {} bits per sample",
            info.bits_per_sample
        )));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| WavError::Malformed(e.to_string()))?;
    Ok((info, samples))
}

fn open_wav(bytes: &[u8]) -> Result<(WavInfo, hound::WavReader<Cursor<&[u8]>>), WavError> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| WavError::Malformed(e.to_string()))?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(WavError::Malformed(
            "Header declares zero channels or a zero sample rate".to_string(),
        ));
    }

    // hound reports frames (samples per channel)
    let frame_count = reader.duration() as usize;
    let format_tag = match spec.sample_format {
        hound::SampleFormat::Int => FORMAT_PCM,
        hound::SampleFormat::Float => FORMAT_IEEE_FLOAT,
    };

    let info = WavInfo {
        format_tag,
        channel_count: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        frame_count,
        duration_seconds: frame_count as f64 / spec.sample_rate as f64,
    };
    Ok((info, reader))
}
