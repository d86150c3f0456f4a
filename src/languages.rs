//! Language profiles: recognition locale, synthesis voice, and agent-side
//! language code selected together.

/// One selectable language bundle. Selecting a profile changes the
/// recognizer's listening locale and the synthesis voice at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageProfile {
    /// Recognition / synthesis locale, e.g. "en-US".
    pub code: &'static str,
    /// Display label for the UI.
    pub label: &'static str,
    /// Synthesis voice identifier.
    pub tts_voice: &'static str,
    /// Language code the dialogue agent expects.
    pub agent_code: &'static str,
}

pub const PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        code: "en-US",
        label: "English",
        tts_voice: "en-US-Chirp3-HD-Erinome",
        agent_code: "en",
    },
    LanguageProfile {
        code: "de-DE",
        label: "Deutsch",
        tts_voice: "de-DE-Chirp3-HD-Erinome",
        agent_code: "de",
    },
    LanguageProfile {
        code: "fr-FR",
        label: "Français",
        tts_voice: "fr-FR-Chirp3-HD-Erinome",
        agent_code: "fr",
    },
    LanguageProfile {
        code: "es-ES",
        label: "Español",
        tts_voice: "es-ES-Chirp3-HD-Erinome",
        agent_code: "es",
    },
    LanguageProfile {
        code: "pt-BR",
        label: "Português (Brasil)",
        tts_voice: "pt-BR-Chirp3-HD-Erinome",
        agent_code: "pt-BR",
    },
    LanguageProfile {
        code: "cmn-CN",
        label: "中文 (简体)",
        tts_voice: "cmn-CN-Chirp3-HD-Erinome",
        agent_code: "zh-CN",
    },
];

/// Look up a profile by locale code. Unknown codes fall back to the first
/// profile so exactly one profile is always selected.
pub fn profile_for(code: &str) -> &'static LanguageProfile {
    PROFILES.iter().find(|p| p.code == code).unwrap_or(&PROFILES[0])
}

/// Whether the profile is an English locale. The conversational
/// humanization pass only applies to English text.
pub fn is_english(code: &str) -> bool {
    code.starts_with("en")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_code() {
        let p = profile_for("de-DE");
        assert_eq!(p.label, "Deutsch");
        assert_eq!(p.agent_code, "de");
    }

    #[test]
    fn unknown_code_falls_back_to_first() {
        let p = profile_for("xx-XX");
        assert_eq!(p.code, "en-US");
    }

    #[test]
    fn english_detection() {
        assert!(is_english("en-US"));
        assert!(!is_english("cmn-CN"));
    }
}
