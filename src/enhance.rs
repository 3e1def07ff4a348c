//! # Text Enhancement
//!
//! Prompt construction for the generative-text model and simple statistics over
//! transcripts. The model itself is behind [`TextGenerator`].
//!
//! ## Tasks:
//! - **TTS preprocessing**: grammar, pauses, abbreviations and numbers spelled out
//! - **Transcription clean-up**: recognition errors, punctuation, script
//! - **Summary**: 2-3 sentences in the source language
//! - **Language detection**: a single language name

use crate::providers::{ProviderError, TextGenerator};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Enhancement task selected by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnhanceTask {
    Tts,
    Transcription,
    Summary,
    DetectLanguage,
}

impl EnhanceTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhanceTask::Tts => "tts",
            EnhanceTask::Transcription => "transcription",
            EnhanceTask::Summary => "summary",
            EnhanceTask::DetectLanguage => "detect-language",
        }
    }
}

impl FromStr for EnhanceTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tts" => Ok(EnhanceTask::Tts),
            "transcription" => Ok(EnhanceTask::Transcription),
            "summary" => Ok(EnhanceTask::Summary),
            "detect-language" => Ok(EnhanceTask::DetectLanguage),
            other => Err(format!(
                "Unknown task '{}'. Expected one of: tts, transcription, summary, detect-language",
                other
            )),
        }
    }
}

pub fn tts_prompt(text: &str, language: &str) -> String {
    format!(
        "You are a text processing assistant for a {language} TTS system.\n\
         \n\
         Process this text for natural speech synthesis:\n\
         {text}\n\
         \n\
         Tasks:\n\
         1. Fix grammatical errors\n\
         2. Add proper punctuation for natural pauses\n\
         3. Expand abbreviations\n\
         4. Convert numbers to words\n\
         5. Maintain the original language and meaning\n\
         \n\
         Return ONLY the processed text, no explanations."
    )
}

pub fn transcription_prompt(raw: &str, language: &str) -> String {
    format!(
        "You are a transcription enhancement assistant for {language} speech-to-text.\n\
         \n\
         Raw transcription:\n\
         {raw}\n\
         \n\
         Tasks:\n\
         1. Correct obvious speech recognition errors\n\
         2. Add proper punctuation and capitalization\n\
         3. Format naturally for readability\n\
         4. Preserve the original meaning and words\n\
         5. Maintain proper script (Bengali/English as appropriate)\n\
         \n\
         Return ONLY the corrected transcription, no explanations or additional commentary."
    )
}

pub fn summary_prompt(text: &str, language: &str) -> String {
    format!(
        "Summarize the following {language} text in 2-3 sentences:\n\
         \n\
         {text}\n\
         \n\
         Provide a concise summary in the same language."
    )
}

pub fn detect_language_prompt(text: &str) -> String {
    format!(
        "Detect the primary language of this text. \
         Respond with just the language name (e.g., \"Bengali\", \"English\", \"Hindi\"):\n\
         \n\
         {text}"
    )
}

/// Rewrite text so it reads naturally when synthesized.
pub async fn preprocess_for_tts(
    generator: &dyn TextGenerator,
    text: &str,
    language: &str,
) -> Result<String, ProviderError> {
    generator.generate(&tts_prompt(text, language)).await
}

/// Clean up a raw transcript.
pub async fn enhance_transcription(
    generator: &dyn TextGenerator,
    raw: &str,
    language: &str,
) -> Result<String, ProviderError> {
    generator.generate(&transcription_prompt(raw, language)).await
}

pub async fn summarize(
    generator: &dyn TextGenerator,
    text: &str,
    language: &str,
) -> Result<String, ProviderError> {
    generator.generate(&summary_prompt(text, language)).await
}

/// Ask the model which language the text is in. The answer is trimmed.
pub async fn detect_language(generator: &dyn TextGenerator, text: &str) -> Result<String, ProviderError> {
    let answer = generator.generate(&detect_language_prompt(text)).await?;
    Ok(answer.trim().to_string())
}

/// Run the selected task.
pub async fn run_task(
    generator: &dyn TextGenerator,
    task: EnhanceTask,
    text: &str,
    language: &str,
) -> Result<String, ProviderError> {
    match task {
        EnhanceTask::Tts => preprocess_for_tts(generator, text, language).await,
        EnhanceTask::Transcription => enhance_transcription(generator, text, language).await,
        EnhanceTask::Summary => summarize(generator, text, language).await,
        EnhanceTask::DetectLanguage => detect_language(generator, text).await,
    }
}

/// Word, character and sentence counts of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub words: usize,
    pub characters: usize,
    pub sentences: usize,
}

impl TextStats {
    /// Count words (whitespace separated), characters (Unicode scalars) and
    /// sentences (split on `.`, `!`, `?` and the Bengali dari `।`).
    pub fn of(text: &str) -> Self {
        Self {
            words: count_words(text),
            characters: text.chars().count(),
            sentences: text
                .split(['.', '!', '?', '।'])
                .filter(|piece| !piece.trim().is_empty())
                .count(),
        }
    }
}

/// Number of whitespace-separated words.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
