//! Text normalization for agent replies destined for speech.
//!
//! Pipeline: link removal → conversational humanization → symbol/marker
//! cleanup, composed by [`prepare_reply_for_speech`]. Every transform is
//! pure and idempotent on already-clean input; the hesitation coin-flip
//! takes an injected RNG so tests can force both branches.

use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

use crate::error::ClientError;
use crate::languages;

/// Plain prosody pause hint, consumed by the synthesizer's markup layer.
pub const PAUSE: &str = "[pause]";
/// Short pause, inserted after exclamations.
pub const PAUSE_SHORT: &str = "[pause short]";
/// Long pause, inserted after questions.
pub const PAUSE_LONG: &str = "[pause long]";

/// Hard ceiling on synthesis input. Longer cleaned replies are rejected,
/// never truncated; the transcript still shows the full text.
pub const MAX_TTS_CHARS: usize = 8000;

/// Probability of prepending a hesitation to a question reply.
const HESITATION_PROBABILITY: f64 = 0.15;

/// Sentences with at least this many words get a trailing pause hint.
const LONG_SENTENCE_WORDS: usize = 20;

const CONTRACTIONS: &[(&str, &str)] = &[
    ("I am", "I'm"),
    ("You are", "You're"),
    ("We are", "We're"),
    ("Let us", "Let's"),
    ("Do not", "Don't"),
    ("Can not", "Can't"),
    ("Will not", "Won't"),
    ("It is", "It's"),
    ("That is", "That's"),
    ("There is", "There's"),
];

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(https?://\S+|www\.\S+)").expect("valid regex"))
}

fn multi_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}").expect("valid regex"))
}

fn space_before_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+([?.!,;:])").expect("valid regex"))
}

fn greeting_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(hello|hi|hey)\b([[:punct:]])?").expect("valid regex"))
}

fn contraction_table() -> &'static [(Regex, &'static str)] {
    static TABLE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        CONTRACTIONS
            .iter()
            .map(|(formal, contraction)| {
                let re = Regex::new(&format!(r"\b{}\b", regex::escape(formal)))
                    .expect("valid regex");
                (re, *contraction)
            })
            .collect()
    })
}

/// Strip HTTP(S) and bare `www.` URLs, then tidy the whitespace the removal
/// leaves behind. Text without links passes through untouched.
pub fn remove_links(text: &str) -> String {
    if !link_re().is_match(text) {
        return text.to_string();
    }
    let stripped = link_re().replace_all(text, "");
    let collapsed = multi_space_re().replace_all(&stripped, " ");
    collapsed.trim().to_string()
}

/// Rewrite a reply into something a voice can deliver naturally.
///
/// Only meaningful for English locales; other locales pass through
/// verbatim. The steps run in a fixed order: contractions, prosody pause
/// markers, greeting softening, hesitation, long-sentence pacing, and
/// finally whitespace cleanup (which must run last so it tidies what the
/// earlier steps leave behind).
pub fn make_prompt_natural<R: Rng>(text: &str, locale: &str, rng: &mut R) -> String {
    if !languages::is_english(locale) {
        return text.to_string();
    }

    // 1. Contractions, whole-word, every occurrence.
    let mut s = text.to_string();
    for (re, contraction) in contraction_table() {
        s = re.replace_all(&s, *contraction).into_owned();
    }

    // 2. Pause markers: long after questions, short after exclamations.
    s = insert_pause_after(&s, '?', PAUSE_LONG);
    s = insert_pause_after(&s, '!', PAUSE_SHORT);

    // 3. Soften the first greeting into a trailing ellipsis.
    s = soften_greeting(&s);

    // 4. Occasional hesitation before answering a question.
    if ends_with_question(&s) && rng.gen::<f64>() < HESITATION_PROBABILITY {
        s = format!("Um, {s}");
    }

    // 5. Breathing room after long sentences.
    s = pace_long_sentences(&s);

    // 6. Whitespace cleanup, always last.
    let s = multi_space_re().replace_all(&s, " ");
    let s = space_before_punct_re().replace_all(&s, "$1");
    s.trim().to_string()
}

/// Insert `marker` after each `punct` that is followed by whitespace or
/// ends the text. Skips positions already carrying the marker so repeated
/// application is a no-op.
fn insert_pause_after(text: &str, punct: char, marker: &str) -> String {
    let mut out = String::with_capacity(text.len() + marker.len() + 2);
    let mut rest = text;

    while let Some(idx) = rest.find(punct) {
        let (head, tail) = rest.split_at(idx + punct.len_utf8());
        out.push_str(head);

        let after = tail.trim_start();
        let had_whitespace = after.len() != tail.len();

        if (had_whitespace || tail.is_empty()) && !after.starts_with(marker) {
            out.push(' ');
            out.push_str(marker);
            if !after.is_empty() {
                out.push(' ');
            }
            rest = after;
        } else {
            rest = tail;
        }
    }

    out.push_str(rest);
    out
}

/// Rewrite the first `hello`/`hi`/`hey` (any case, optional trailing
/// punctuation) to the matched word plus an ellipsis.
fn soften_greeting(text: &str) -> String {
    let Some(caps) = greeting_re().captures(text) else {
        return text.to_string();
    };
    let whole = caps.get(0).expect("group 0 always present");
    let word = caps.get(1).expect("greeting word group");

    // Already softened on an earlier pass.
    if text[word.end()..].starts_with("...") {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + 3);
    out.push_str(&text[..whole.start()]);
    out.push_str(word.as_str());
    out.push_str("...");
    out.push_str(&text[whole.end()..]);
    out
}

/// Whether the text logically ends with a question, looking past any
/// pause marker step 2 appended.
fn ends_with_question(text: &str) -> bool {
    let t = text.trim_end();
    let t = t.strip_suffix(PAUSE_LONG).map(str::trim_end).unwrap_or(t);
    t.ends_with('?')
}

/// Append a plain pause hint after sentences of 20+ words. Marker tokens
/// inserted by earlier steps are excluded from the word count so they are
/// not mistaken for sentence content.
fn pace_long_sentences(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out: Vec<&str> = Vec::with_capacity(tokens.len() + 4);
    let mut words_in_sentence = 0usize;

    for (i, &tok) in tokens.iter().enumerate() {
        out.push(tok);

        let is_marker_part = matches!(tok, "[pause]" | "[pause" | "long]" | "short]");
        if is_marker_part {
            continue;
        }
        words_in_sentence += 1;

        let last = tok.chars().last();
        if matches!(last, Some('.') | Some('!') | Some('?')) {
            if words_in_sentence >= LONG_SENTENCE_WORDS && tokens.get(i + 1) != Some(&PAUSE) {
                out.push(PAUSE);
            }
            words_in_sentence = 0;
        }
    }

    out.join(" ")
}

fn is_stripped_symbol(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F600..=0x1F6FF   // emoticons
            | 0x1F300..=0x1F5FF // misc symbols and pictographs
            | 0x1F900..=0x1F9FF // supplemental symbols
            | 0x2600..=0x26FF   // miscellaneous symbols
            | 0x2700..=0x27BF   // dingbats
    )
}

/// Final scrub before synthesis: drop emoji/symbol ranges and any literal
/// pause-marker text, then tidy whitespace. A strict subset operation:
/// never introduces new non-whitespace characters.
pub fn clean_text_for_tts(text: &str) -> String {
    let mut s: String = text.chars().filter(|&c| !is_stripped_symbol(c)).collect();

    // Longer marker forms first so removing the plain form cannot leave
    // stray fragments of the qualified ones.
    for marker in [PAUSE_LONG, PAUSE_SHORT, PAUSE] {
        s = s.replace(marker, "");
    }

    let s = multi_space_re().replace_all(&s, " ");
    let s = space_before_punct_re().replace_all(&s, "$1");
    s.trim().to_string()
}

/// Full outbound pipeline for an agent reply about to be spoken, with the
/// length guard applied to the cleaned result.
pub fn prepare_reply_for_speech<R: Rng>(
    raw: &str,
    locale: &str,
    rng: &mut R,
) -> Result<String, ClientError> {
    let cleaned = clean_text_for_tts(&make_prompt_natural(&remove_links(raw), locale, rng));
    let len = cleaned.chars().count();
    if len > MAX_TTS_CHARS {
        return Err(ClientError::ResponseTooLong(len));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    /// RNG whose first f64 is ~0.0, forcing the hesitation branch.
    fn always_hesitate() -> StepRng {
        StepRng::new(0, 0)
    }

    /// RNG whose first f64 is ~1.0, suppressing hesitation.
    fn never_hesitate() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn remove_links_strips_urls() {
        assert_eq!(
            remove_links("see https://example.com/page for details"),
            "see for details"
        );
        assert_eq!(remove_links("go to www.example.com now"), "go to now");
    }

    #[test]
    fn remove_links_is_identity_without_links() {
        let text = "no links  here, not even  one";
        assert_eq!(remove_links(text), text);
    }

    #[test]
    fn remove_links_is_idempotent_and_never_grows() {
        let cases = [
            "plain text",
            "https://a.example b www.c.example d",
            "  padded https://x.example  ",
            "",
        ];
        for case in cases {
            let once = remove_links(case);
            assert_eq!(remove_links(&once), once, "not idempotent for {case:?}");
            assert!(once.len() <= case.len(), "grew for {case:?}");
        }
    }

    #[test]
    fn contractions_apply_globally() {
        let out = make_prompt_natural("I am sure. I am certain.", "en-US", &mut never_hesitate());
        assert!(out.contains("I'm sure"));
        assert!(out.contains("I'm certain"));
        assert!(!out.contains("I am"));
    }

    #[test]
    fn contraction_table_covers_every_pair() {
        assert_eq!(contraction_table().len(), CONTRACTIONS.len());
        for ((re, cached), (formal, contraction)) in
            contraction_table().iter().zip(CONTRACTIONS)
        {
            assert!(re.is_match(formal), "pattern lost for {formal:?}");
            assert_eq!(cached, contraction);
        }
    }

    #[test]
    fn contraction_and_long_pause_property() {
        let out = make_prompt_natural("I am happy. Are you ready?", "en-US", &mut never_hesitate());
        assert!(out.contains("I'm happy"), "got: {out}");
        assert!(out.contains(&format!("? {PAUSE_LONG}")), "got: {out}");
    }

    #[test]
    fn exclamation_gets_short_pause() {
        let out = make_prompt_natural("Great news! More soon.", "en-US", &mut never_hesitate());
        assert!(out.contains(&format!("! {PAUSE_SHORT}")), "got: {out}");
    }

    #[test]
    fn greeting_is_softened_once() {
        let out = make_prompt_natural("Hello! How can I help?", "en-US", &mut never_hesitate());
        assert!(out.starts_with("Hello..."), "got: {out}");

        let again = make_prompt_natural(&out, "en-US", &mut never_hesitate());
        assert!(!again.contains("....."), "got: {again}");
    }

    #[test]
    fn hesitation_requires_question_and_coin_flip() {
        let with = make_prompt_natural("Are you ready?", "en-US", &mut always_hesitate());
        assert!(with.starts_with("Um, "), "got: {with}");

        let without = make_prompt_natural("Are you ready?", "en-US", &mut never_hesitate());
        assert!(!without.starts_with("Um, "), "got: {without}");

        let statement = make_prompt_natural("I am ready.", "en-US", &mut always_hesitate());
        assert!(!statement.starts_with("Um, "), "got: {statement}");
    }

    #[test]
    fn long_sentences_get_pacing_pause() {
        let long = "one two three four five six seven eight nine ten \
                    eleven twelve thirteen fourteen fifteen sixteen seventeen \
                    eighteen nineteen twenty.";
        let out = make_prompt_natural(long, "en-US", &mut never_hesitate());
        assert!(out.ends_with(&format!("twenty. {PAUSE}")), "got: {out}");

        let short = "just a few words here.";
        let out = make_prompt_natural(short, "en-US", &mut never_hesitate());
        assert!(!out.contains(PAUSE), "got: {out}");
    }

    #[test]
    fn non_english_locale_is_passthrough() {
        let text = "I am happy. Are you ready?";
        assert_eq!(
            make_prompt_natural(text, "de-DE", &mut always_hesitate()),
            text
        );
    }

    #[test]
    fn make_prompt_natural_is_idempotent_without_hesitation() {
        let cases = [
            "I am happy. Are you ready?",
            "Hello! How can I help you today?",
            "Plain statement with nothing special.",
        ];
        for case in cases {
            let once = make_prompt_natural(case, "en-US", &mut never_hesitate());
            let twice = make_prompt_natural(&once, "en-US", &mut never_hesitate());
            assert_eq!(once, twice, "not idempotent for {case:?}");
        }
    }

    #[test]
    fn clean_removes_emoji_and_symbols() {
        let out = clean_text_for_tts("Take care! 😀 ☀ ✂ 🌍 🤖");
        assert_eq!(out, "Take care!");
    }

    #[test]
    fn clean_removes_all_pause_marker_forms() {
        let input = format!("Ready? {PAUSE_LONG} Go! {PAUSE_SHORT} Done. {PAUSE}");
        let out = clean_text_for_tts(&input);
        assert!(!out.contains(PAUSE), "got: {out}");
        assert!(!out.contains(PAUSE_SHORT), "got: {out}");
        assert!(!out.contains(PAUSE_LONG), "got: {out}");
        assert!(!out.contains('['), "stray fragment in: {out}");
        assert_eq!(out, "Ready? Go! Done.");
    }

    #[test]
    fn clean_is_a_strict_subset_operation() {
        let inputs = ["word 😀 word", "a  b  c", " trim me ", "no-op text"];
        for input in inputs {
            let out = clean_text_for_tts(input);
            for c in out.chars().filter(|c| !c.is_whitespace()) {
                assert!(input.contains(c), "introduced {c:?} for {input:?}");
            }
        }
    }

    #[test]
    fn prepare_composes_pipeline() {
        let out = prepare_reply_for_speech(
            "Hello! I am here: https://example.com/help",
            "en-US",
            &mut never_hesitate(),
        )
        .unwrap();
        assert!(out.starts_with("Hello..."), "got: {out}");
        assert!(out.contains("I'm here"), "got: {out}");
        assert!(!out.contains("http"), "got: {out}");
        assert!(!out.contains(PAUSE), "got: {out}");
    }

    #[test]
    fn over_length_reply_is_rejected_not_truncated() {
        let raw = "word ".repeat(2500);
        let err = prepare_reply_for_speech(&raw, "en-US", &mut never_hesitate()).unwrap_err();
        match err {
            ClientError::ResponseTooLong(n) => assert!(n > MAX_TTS_CHARS),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn at_limit_reply_passes_unmodified() {
        let raw = "a".repeat(MAX_TTS_CHARS);
        let out = prepare_reply_for_speech(&raw, "en-US", &mut never_hesitate()).unwrap();
        assert_eq!(out.chars().count(), MAX_TTS_CHARS);
    }
}
