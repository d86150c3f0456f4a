//! Hosted speech synthesis.
//!
//! Sends cleaned reply text as prosody markup (a `[pause]` hint after each
//! sentence-final period) and returns the decoded MP3 payload. A missing
//! payload is a reported failure, not a silent no-op.

use std::sync::OnceLock;

use base64::Engine;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::agent::describe_transport;
use crate::config::TtsConfig;
use crate::error::ClientError;
use crate::languages::LanguageProfile;
use crate::normalize::PAUSE;

pub struct SpeechSynthesizer {
    client: Client,
    endpoint: String,
    speaking_rate: f32,
}

impl SpeechSynthesizer {
    pub fn new(config: &TtsConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::SynthesisFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            speaking_rate: config.speaking_rate,
        })
    }

    /// Synthesize one utterance and return MP3 bytes ready for playback.
    pub async fn synthesize(
        &self,
        token: &str,
        text: &str,
        profile: &LanguageProfile,
    ) -> Result<Vec<u8>, ClientError> {
        let markup = markup_for(text);
        debug!("Synthesis request ({} chars, voice {})", markup.len(), profile.tts_voice);

        let body = json!({
            "input": { "markup": markup },
            "voice": {
                "languageCode": profile.code,
                "name": profile.tts_voice
            },
            "audioConfig": {
                "audioEncoding": "MP3",
                "speakingRate": self.speaking_rate
            }
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::SynthesisFailed(describe_transport(&e)))?;

        if !resp.status().is_success() {
            return Err(ClientError::SynthesisFailed(format!(
                "API error: {}",
                resp.status()
            )));
        }

        let data = resp
            .json::<Value>()
            .await
            .map_err(|e| ClientError::SynthesisFailed(format!("malformed response: {e}")))?;

        audio_from_response(&data)
    }
}

fn period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\s*").expect("valid regex"))
}

/// Turn cleaned text into synthesizer markup by hinting a pause after each
/// period. This is the only place pause tokens are allowed to exist on the
/// wire; they never appear in the transcript or the audible output.
pub fn markup_for(text: &str) -> String {
    period_re()
        .replace_all(text, format!(". {PAUSE} ").as_str())
        .trim_end()
        .to_string()
}

/// Decode the base64 audio payload; absence of a payload is an error.
pub fn audio_from_response(data: &Value) -> Result<Vec<u8>, ClientError> {
    let content = data["audioContent"]
        .as_str()
        .ok_or_else(|| ClientError::SynthesisFailed("no audio payload in response".into()))?;

    base64::engine::general_purpose::STANDARD
        .decode(content)
        .map_err(|e| ClientError::SynthesisFailed(format!("invalid audio payload: {e}")))
}
