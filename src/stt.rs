//! Hosted speech recognition.
//!
//! Captured 16kHz mono f32 samples are encoded to 16-bit WAV in memory,
//! base64'd, and sent to the recognition service in one shot. Single
//! alternative, no interim results.

use std::io::Cursor;

use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::agent::describe_transport;
use crate::config::SttConfig;
use crate::error::ClientError;

pub struct SpeechRecognizer {
    client: Client,
    endpoint: String,
}

impl SpeechRecognizer {
    pub fn new(config: &SttConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::RecognitionOther(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Recognize one utterance. Returns the terminal transcript text.
    pub async fn recognize(
        &self,
        token: &str,
        samples: &[f32],
        sample_rate: u32,
        language_code: &str,
    ) -> Result<String, ClientError> {
        let wav = encode_wav(samples, sample_rate)?;
        let content = base64::engine::general_purpose::STANDARD.encode(&wav);

        let body = json!({
            "config": {
                "encoding": "LINEAR16",
                "sampleRateHertz": sample_rate,
                "languageCode": language_code,
                "maxAlternatives": 1
            },
            "audio": { "content": content }
        });

        debug!(
            "Recognition request: {:.1}s of audio, locale {language_code}",
            samples.len() as f64 / sample_rate as f64
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::RecognitionOther(describe_transport(&e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ClientError::RecognitionPermissionDenied);
        }
        if !status.is_success() {
            return Err(ClientError::RecognitionOther(format!("API error: {status}")));
        }

        let data = resp
            .json::<Value>()
            .await
            .map_err(|e| ClientError::RecognitionOther(format!("malformed response: {e}")))?;

        match transcript_from_response(&data) {
            Some(text) => {
                info!("Recognized: {text:?}");
                Ok(text)
            }
            None => Err(ClientError::RecognitionNoSpeech),
        }
    }
}

/// First alternative of the first result, if the service heard anything.
pub fn transcript_from_response(data: &Value) -> Option<String> {
    let text = data["results"][0]["alternatives"][0]["transcript"].as_str()?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Encode f32 samples as 16-bit PCM WAV, entirely in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, ClientError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| ClientError::RecognitionOther(format!("WAV encoding failed: {e}")))?;
        for &sample in samples {
            // f32 [-1, 1] → i16
            let s = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(s)
                .map_err(|e| ClientError::RecognitionOther(format!("WAV encoding failed: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| ClientError::RecognitionOther(format!("WAV encoding failed: {e}")))?;
    }

    Ok(cursor.into_inner())
}
