//! # History Store
//!
//! Every synthesis and transcription leaves an entry here so the client can
//! list, search, play back, download and delete past work. The store lives in
//! memory and is shared by all workers through `AppState`. Entries keep their
//! audio (the synthesized MP3, the uploaded file or the encoded recording), so
//! the entry cap also bounds how much audio is held.
//!
//! ## Key Rust Concepts:
//! - **VecDeque**: entries are pushed at the back and evicted from the front
//!   once the cap is reached
//! - **RwLock**: listing takes a read lock, adding and deleting take a write lock
//! - **Stable sort**: entries with equal keys keep their insertion order

use actix_web::web::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Characters of text kept in an entry's name before it is cut with "...".
pub const NAME_PREVIEW_CHARS: usize = 48;

/// Characters of the name used for a download filename.
const DOWNLOAD_NAME_CHARS: usize = 30;

/// What produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryKind {
    TextToSpeech,
    SpeechToText,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::TextToSpeech => "text-to-speech",
            HistoryKind::SpeechToText => "speech-to-text",
        }
    }
}

/// Audio attached to an entry.
///
/// `Bytes` is reference counted, so cloning an entry for a listing does not
/// copy the audio.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryAudio {
    pub bytes: Bytes,
    pub content_type: String,
    /// File extension used for downloads ("mp3", "wav", ...)
    pub extension: String,
}

impl HistoryAudio {
    pub fn new(bytes: impl Into<Bytes>, content_type: &str, extension: &str) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.to_string(),
            extension: extension.to_string(),
        }
    }
}

/// One stored synthesis or transcription.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub name: String,
    pub text_content: String,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub language: String,
    pub created_at: DateTime<Utc>,
    /// Served by the audio endpoint, never inlined in JSON
    #[serde(skip)]
    pub audio: Option<HistoryAudio>,
}

impl HistoryEntry {
    /// Build an entry stamped with a fresh id and the current time.
    pub fn new(kind: HistoryKind, text: &str, language: &str, duration_seconds: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: preview_name(text),
            text_content: text.to_string(),
            word_count: crate::enhance::count_words(text),
            duration_seconds,
            language: language.to_string(),
            created_at: Utc::now(),
            audio: None,
        }
    }

    pub fn with_audio(mut self, audio: HistoryAudio) -> Self {
        self.audio = Some(audio);
        self
    }

    /// The audio a download returns: speech-to-text entries download the
    /// transcribed audio, text-to-speech entries download their text.
    pub fn download_audio(&self) -> Option<&HistoryAudio> {
        match self.kind {
            HistoryKind::SpeechToText => self.audio.as_ref(),
            HistoryKind::TextToSpeech => None,
        }
    }

    /// Filename used by the download endpoint.
    pub fn download_filename(&self) -> String {
        match self.download_audio() {
            Some(audio) => download_filename(&self.name, &audio.extension),
            None => download_filename(&self.name, "txt"),
        }
    }
}

/// First [`NAME_PREVIEW_CHARS`] characters of the trimmed text, plus "..." when cut.
pub fn preview_name(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > NAME_PREVIEW_CHARS {
        let head: String = text.chars().take(NAME_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Safe filename from an entry name: the first 30 characters with every
/// non-ASCII-alphanumeric character replaced by `_`, then `.{extension}`.
pub fn download_filename(name: &str, extension: &str) -> String {
    let stem: String = name
        .chars()
        .take(DOWNLOAD_NAME_CHARS)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}.{}", stem, extension)
}

/// `mm:ss`, minutes not capped at 59.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Relative date as shown in the history list.
pub fn display_date(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - created_at).num_hours();
    if hours < 24 {
        format!("{} hours ago", hours.max(0))
    } else if hours < 48 {
        "Yesterday".to_string()
    } else {
        created_at.format("%b %-d, %Y").to_string()
    }
}

/// Type filter for listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Only(HistoryKind),
}

impl FromStr for KindFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(KindFilter::All),
            "text-to-speech" => Ok(KindFilter::Only(HistoryKind::TextToSpeech)),
            "speech-to-text" => Ok(KindFilter::Only(HistoryKind::SpeechToText)),
            other => Err(format!(
                "Unknown type '{}'. Expected one of: all, text-to-speech, speech-to-text",
                other
            )),
        }
    }
}

/// Sort order for listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistorySort {
    #[default]
    Newest,
    Oldest,
    /// Most words first
    Longest,
    /// Fewest words first
    Shortest,
}

impl FromStr for HistorySort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(HistorySort::Newest),
            "oldest" => Ok(HistorySort::Oldest),
            "longest" => Ok(HistorySort::Longest),
            "shortest" => Ok(HistorySort::Shortest),
            other => Err(format!(
                "Unknown sort '{}'. Expected one of: newest, oldest, longest, shortest",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Case-insensitive match against name or text
    pub search: Option<String>,
    pub kind: KindFilter,
    pub sort: HistorySort,
}

impl HistoryQuery {
    fn matches(&self, entry: &HistoryEntry) -> bool {
        let kind_ok = match self.kind {
            KindFilter::All => true,
            KindFilter::Only(kind) => entry.kind == kind,
        };

        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                entry.name.to_lowercase().contains(&needle)
                    || entry.text_content.to_lowercase().contains(&needle)
            }
        };

        kind_ok && search_ok
    }
}

struct Inner {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

/// Bounded, thread-safe list of history entries (oldest first).
pub struct HistoryStore {
    inner: RwLock<Inner>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Store an entry, evicting the oldest ones beyond the cap.
    pub fn add(&self, entry: HistoryEntry) {
        debug!(id = %entry.id, kind = entry.kind.as_str(), "History entry added");
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.entries.push_back(entry);
        while inner.entries.len() > inner.capacity {
            inner.entries.pop_front();
        }
    }

    /// Change the cap; shrinking evicts the oldest entries right away.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.capacity = capacity.max(1);
        while inner.entries.len() > inner.capacity {
            inner.entries.pop_front();
        }
    }

    pub fn get(&self, id: Uuid) -> Option<HistoryEntry> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.entries.iter().find(|entry| entry.id == id).cloned()
    }

    /// Remove one entry. Returns whether it existed.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match inner.entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                inner.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove everything and return how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let removed = inner.entries.len();
        inner.entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Filter and sort a snapshot of the store.
    pub fn query(&self, query: &HistoryQuery) -> Vec<HistoryEntry> {
        let mut items: Vec<HistoryEntry> = {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            inner
                .entries
                .iter()
                .filter(|entry| query.matches(entry))
                .cloned()
                .collect()
        };

        match query.sort {
            HistorySort::Newest => {
                items.reverse();
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
            HistorySort::Oldest => items.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            HistorySort::Longest => items.sort_by(|a, b| b.word_count.cmp(&a.word_count)),
            HistorySort::Shortest => items.sort_by(|a, b| a.word_count.cmp(&b.word_count)),
        }

        items
    }
}

/// Entry as returned by the list endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub display_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Playback URL when the entry kept its audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl HistoryItem {
    pub fn from_entry(entry: HistoryEntry, now: DateTime<Utc>) -> Self {
        Self {
            display_date: display_date(entry.created_at, now),
            duration: entry.duration_seconds.map(format_duration),
            audio_url: entry
                .audio
                .as_ref()
                .map(|_| format!("/api/history/{}/audio", entry.id)),
            entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn aged(mut entry: HistoryEntry, age: Duration) -> HistoryEntry {
        entry.created_at -= age;
        entry
    }

    fn tts(text: &str) -> HistoryEntry {
        HistoryEntry::new(HistoryKind::TextToSpeech, text, "bangla", None)
    }

    fn asr(text: &str) -> HistoryEntry {
        HistoryEntry::new(HistoryKind::SpeechToText, text, "bn", Some(45.0))
    }

    #[test]
    fn test_preview_name() {
        assert_eq!(preview_name("  short text "), "short text");

        let long = "a".repeat(60);
        let name = preview_name(&long);
        assert_eq!(name, format!("{}...", "a".repeat(48)));

        let bengali = "আ".repeat(50);
        assert_eq!(preview_name(&bengali).chars().count(), 48 + 3);
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(download_filename("Hello, world!", "txt"), "Hello__world_.txt");
        assert_eq!(download_filename(&"x".repeat(40), "txt"), format!("{}.txt", "x".repeat(30)));
        assert_eq!(download_filename("আমি ok", "mp3"), "____ok.mp3");
    }

    #[test]
    fn test_download_follows_kind_and_audio() {
        let speech = asr("Budget meeting").with_audio(HistoryAudio::new(vec![1u8, 2, 3], "audio/mpeg", "mp3"));
        assert_eq!(speech.download_filename(), "Budget_meeting.mp3");
        assert_eq!(speech.download_audio().unwrap().bytes.as_ref(), &[1, 2, 3]);

        let synthesized = tts("Hello there").with_audio(HistoryAudio::new(vec![9u8], "audio/mpeg", "mp3"));
        assert!(synthesized.download_audio().is_none());
        assert_eq!(synthesized.download_filename(), "Hello_there.txt");

        assert_eq!(asr("No audio kept").download_filename(), "No_audio_kept.txt");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45.0), "00:45");
        assert_eq!(format_duration(80.9), "01:20");
        assert_eq!(format_duration(3725.0), "62:05");
        assert_eq!(format_duration(f64::NAN), "00:00");
    }

    #[test]
    fn test_display_date() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(display_date(now - Duration::minutes(30), now), "0 hours ago");
        assert_eq!(display_date(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(display_date(now - Duration::hours(30), now), "Yesterday");
        assert_eq!(display_date(now - Duration::days(5), now), "Jan 5, 2024");
    }

    #[test]
    fn test_store_evicts_oldest() {
        let store = HistoryStore::new(2);
        let first = tts("first");
        let first_id = first.id;
        store.add(first);
        store.add(tts("second"));
        store.add(tts("third"));

        assert_eq!(store.len(), 2);
        assert!(store.get(first_id).is_none());

        store.set_capacity(1);
        let remaining = store.query(&HistoryQuery::default());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].text_content, "third");
    }

    #[test]
    fn test_get_remove_clear() {
        let store = HistoryStore::new(10);
        let entry = asr("hello");
        let id = entry.id;
        store.add(entry);
        store.add(tts("other"));

        assert_eq!(store.get(id).map(|e| e.text_content), Some("hello".to_string()));
        assert!(store.remove(id));
        assert!(!store.remove(id));
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_query_filters_and_sorts() {
        let store = HistoryStore::new(10);
        store.add(aged(tts("one two three"), Duration::hours(3)));
        store.add(aged(asr("Meeting notes about the budget"), Duration::hours(2)));
        store.add(aged(tts("single"), Duration::hours(1)));

        let newest = store.query(&HistoryQuery::default());
        assert_eq!(newest[0].text_content, "single");
        assert_eq!(newest[2].text_content, "one two three");

        let oldest = store.query(&HistoryQuery { sort: HistorySort::Oldest, ..Default::default() });
        assert_eq!(oldest[0].text_content, "one two three");

        let longest = store.query(&HistoryQuery { sort: HistorySort::Longest, ..Default::default() });
        assert_eq!(longest[0].word_count, 5);

        let shortest = store.query(&HistoryQuery { sort: HistorySort::Shortest, ..Default::default() });
        assert_eq!(shortest[0].text_content, "single");

        let only_asr = store.query(&HistoryQuery {
            kind: KindFilter::Only(HistoryKind::SpeechToText),
            ..Default::default()
        });
        assert_eq!(only_asr.len(), 1);

        let search = store.query(&HistoryQuery { search: Some("BUDGET".into()), ..Default::default() });
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].kind, HistoryKind::SpeechToText);
    }

    #[test]
    fn test_newest_keeps_insertion_order_on_ties() {
        let store = HistoryStore::new(10);
        let mut a = tts("a");
        let mut b = tts("b");
        let stamp = Utc::now();
        a.created_at = stamp;
        b.created_at = stamp;
        store.add(a);
        store.add(b);

        let items = store.query(&HistoryQuery::default());
        assert_eq!(items[0].text_content, "b");
    }

    #[test]
    fn test_filter_and_sort_parsing() {
        assert_eq!("all".parse::<KindFilter>(), Ok(KindFilter::All));
        assert_eq!(
            "speech-to-text".parse::<KindFilter>(),
            Ok(KindFilter::Only(HistoryKind::SpeechToText))
        );
        assert!("audio".parse::<KindFilter>().is_err());
        assert_eq!("longest".parse::<HistorySort>(), Ok(HistorySort::Longest));
        assert!("random".parse::<HistorySort>().is_err());
    }

    #[test]
    fn test_item_serialization() {
        let now = Utc::now();
        let item = HistoryItem::from_entry(asr("hello there"), now);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "speech-to-text");
        assert_eq!(json["wordCount"], 2);
        assert_eq!(json["duration"], "00:45");
        assert_eq!(json["displayDate"], "0 hours ago");
        assert!(json.get("textContent").is_some());
        assert!(json.get("audioUrl").is_none());

        let entry = tts("spoken").with_audio(HistoryAudio::new(vec![0u8; 16], "audio/mpeg", "mp3"));
        let id = entry.id;
        let json = serde_json::to_value(HistoryItem::from_entry(entry, now)).unwrap();
        assert_eq!(json["audioUrl"], format!("/api/history/{}/audio", id));
        assert!(json.get("audio").is_none());
    }
}
