//! Voice selection and narration instructions for speech synthesis.
//!
//! Clients pick a voice by gender and a language by name; the provider needs
//! its own voice identifier plus a style prompt that matches both.

/// Languages the playground offers for synthesis.
pub const SUPPORTED_LANGUAGES: &[&str] = &["bangla", "english", "mix"];

/// Voice identifiers accepted from clients.
pub const AVAILABLE_VOICES: &[&str] = &["female", "male"];

/// Provider voice used for any voice id we do not know.
pub const FALLBACK_VOICE: &str = "alloy";

/// Narration language derived from the client's language string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationLanguage {
    Bangla,
    English,
    /// Bengali-English code-switching; also used for unknown values
    Mixed,
}

impl NarrationLanguage {
    pub fn parse(language: &str) -> Self {
        match language.trim().to_ascii_lowercase().as_str() {
            "bangla" => NarrationLanguage::Bangla,
            "english" => NarrationLanguage::English,
            _ => NarrationLanguage::Mixed,
        }
    }

    /// Language name used in text-generation prompts.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            NarrationLanguage::Bangla => "Bengali",
            NarrationLanguage::English => "English",
            NarrationLanguage::Mixed => "mixed Bengali-English",
        }
    }
}

/// Map a client voice id to the provider's voice name.
///
/// Both voices work for Bengali and English.
pub fn provider_voice(voice_id: &str) -> &'static str {
    match voice_id.trim().to_ascii_lowercase().as_str() {
        "female" => "nova",
        "male" => "echo",
        _ => FALLBACK_VOICE,
    }
}

/// Tone description for a provider voice.
pub fn voice_character(provider_voice: &str) -> &'static str {
    match provider_voice {
        "nova" => "warm, friendly, and conversational",
        "echo" => "clear, articulate, and professional",
        _ => "natural and clear",
    }
}

/// Build the style instructions sent alongside the text.
pub fn narration_instructions(language: NarrationLanguage, provider_voice: &str) -> String {
    let character = voice_character(provider_voice);

    match language {
        NarrationLanguage::Bangla => format!(
            "You are a professional Bengali voice narrator. \
             Speak in a {character} tone with perfect Bengali pronunciation (বাংলা উচ্চারণ). \
             Maintain natural rhythm, proper stress on syllables, and use appropriate emotional inflection. \
             Handle Bengali numbers, dates, and cultural references authentically."
        ),
        NarrationLanguage::English => format!(
            "You are a professional English voice narrator. \
             Speak in a {character} tone with clear enunciation and natural pacing. \
             Use appropriate pauses for punctuation, vary your intonation to maintain listener engagement, \
             and emphasize key words naturally."
        ),
        NarrationLanguage::Mixed => format!(
            "You are a bilingual voice narrator fluent in both Bengali and English. \
             Speak in a {character} tone, seamlessly switching between languages \
             while maintaining proper pronunciation for each. \
             Use natural code-switching patterns common in Bengali-English conversations."
        ),
    }
}
