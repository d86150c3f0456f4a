//! Configuration for voice-agent-rs.
//!
//! Loads YAML from standard locations; every section has defaults so the
//! client starts with no config file at all.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the dialogue agent service.
    pub endpoint: String,
    /// Per-deployment agent resource path under the endpoint.
    pub agent_path: String,
    /// Default language profile code.
    pub language: String,
    /// Spoken once after sign-in.
    pub greeting: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://dialogflow.googleapis.com/v3".into(),
            agent_path: "projects/example-project/locations/global/agents/placeholder".into(),
            language: "en-US".into(),
            greeting: "Hello! I'm your Patient Support Cloud Agent. How can I assist you today?"
                .into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Fallback file read when the env var is unset. Empty disables it.
    pub token_file: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: "VOICE_AGENT_TOKEN".into(),
            token_file: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_size: u32,
    /// Hard cap on one capture session, seconds.
    pub max_duration: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            chunk_size: 1024,
            max_duration: 30.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointingConfig {
    /// RMS energy below which audio counts as silence.
    pub threshold: f32,
    /// Continuous silence that ends a capture session, seconds.
    pub silence_duration: f64,
    /// Grace period before silence detection kicks in, seconds.
    pub min_speech_duration: f64,
}

impl Default for EndpointingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            silence_duration: 1.5,
            min_speech_duration: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub endpoint: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://speech.googleapis.com/v1/speech:recognize".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub endpoint: String,
    pub speaking_rate: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://texttospeech.googleapis.com/v1/text:synthesize".into(),
            speaking_rate: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub enabled: bool,
    pub port: u16,
    pub api_key: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 3000,
            api_key: "change-me".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub auth: AuthConfig,
    pub capture: CaptureConfig,
    pub endpointing: EndpointingConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub backend: BackendConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/voice-agent/config.yaml
    /// 3. /etc/voice-agent/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/voice-agent/config.yaml")),
                Some(PathBuf::from("/etc/voice-agent/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {e}, using defaults",
                        config_path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {e}, using defaults",
                    config_path.display()
                );
                Self::default()
            }
        }
    }
}
