//! Error taxonomy for the voice client.
//!
//! Every variant maps to a user-facing message shown as transient UI state.
//! Errors are caught at the component boundary where they occur and never
//! propagate past the service loop.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Sign-in failed. Please try again.")]
    SignInFailed,

    #[error("Speech capture is not supported on this system.")]
    SpeechNotSupported,

    #[error("No speech detected. Please try again and speak clearly into your microphone.")]
    RecognitionNoSpeech,

    #[error("No microphone found. Please check your microphone settings.")]
    RecognitionNoMicrophone,

    #[error("Microphone access denied. Please check your credentials.")]
    RecognitionPermissionDenied,

    #[error("Speech recognition error: {0}")]
    RecognitionOther(String),

    #[error("Agent request failed: {0}")]
    AgentRequestFailed(String),

    #[error("Text-to-Speech failed: {0}")]
    SynthesisFailed(String),

    #[error("Response too long to read aloud ({0} characters)")]
    ResponseTooLong(usize),
}
