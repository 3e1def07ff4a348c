//! # Audio Container Encoding
//!
//! Turns decoded microphone recordings into WAV files that the speech provider
//! accepts as uploads. The browser decodes its compressed recording into float
//! samples; everything from that point on happens here.
//!
//! ## Key Components:
//! - **PCM conversion** (`pcm`): float ↔ signed 16-bit sample quantization
//! - **Decoded buffer** (`buffer`): per-channel float samples plus sample rate
//! - **WAV container** (`wav`): RIFF/WAVE PCM16 encoder and upload inspection
//! - **Uploads** (`upload`): accepted file extensions and size formatting
//!
//! ## Output Format:
//! - **Container**: RIFF/WAVE with a 44-byte header
//! - **Encoding**: 16-bit linear PCM, little-endian
//! - **Layout**: interleaved, frame-major then channel-minor
//! - **Sample rate / channels**: whatever the recording had (no resampling)

pub mod buffer;   // Decoded audio buffer and validation
pub mod pcm;      // Sample quantization
pub mod upload;   // Upload extension checks
pub mod wav;      // RIFF/WAVE encoding and inspection

pub use buffer::DecodedAudioBuffer;
pub use upload::ALLOWED_UPLOAD_EXTENSIONS;
pub use wav::{encode_wav, inspect_wav, WavContainer};

/// Errors raised while building or encoding audio.
///
/// Input problems are never corrected silently (apart from amplitude clamping,
/// which is part of the sample conversion). The caller decides whether to ask
/// the user to record again.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WavError {
    /// Malformed input: channel length mismatch, zero channels, zero sample rate,
    /// or sizes that do not fit the WAV header fields.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Bytes that could not be parsed as a RIFF/WAVE file.
    #[error("Malformed WAV data: {0}")]
    Malformed(String),
}
