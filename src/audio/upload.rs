//! Checks applied to audio files uploaded for transcription.
//!
//! The provider accepts a fixed set of containers; anything else is refused
//! before a single byte is forwarded.

/// Upload extensions the speech provider accepts.
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "mp4", "mpeg", "mpga", "m4a", "ogg", "wav", "webm",
];

/// Lower-cased extension of a filename, if it has one.
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// The extension of `filename` when it is one we accept.
pub fn allowed_extension(filename: &str) -> Option<String> {
    file_extension(filename).filter(|ext| ALLOWED_UPLOAD_EXTENSIONS.contains(&ext.as_str()))
}

/// MIME type to declare when forwarding a file with this extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "flac" => "audio/flac",
        "mp3" | "mpeg" | "mpga" => "audio/mpeg",
        "mp4" => "audio/mp4",
        "m4a" => "audio/m4a",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

/// Human-readable size in megabytes with two decimals ("1.25 MB").
pub fn format_megabytes(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Human-readable size in kilobytes with two decimals ("12.50 KB").
pub fn format_kilobytes(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}
