//! Access token boundary.
//!
//! The hosted services all take one opaque bearer token. The token is
//! acquired at sign-in (from the configured environment variable, or a
//! token file), held in memory only, and cleared on logout. It is never
//! persisted by this client.

use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::error::ClientError;

/// Acquire a bearer token, or `SignInFailed` if none is available.
pub fn acquire_token(config: &AuthConfig) -> Result<String, ClientError> {
    if let Ok(value) = std::env::var(&config.token_env) {
        let value = value.trim();
        if !value.is_empty() {
            info!("Signed in with token from ${}", config.token_env);
            return Ok(value.to_string());
        }
    }

    if !config.token_file.is_empty() {
        match std::fs::read_to_string(&config.token_file) {
            Ok(contents) => {
                let token = contents.trim();
                if !token.is_empty() {
                    info!("Signed in with token from {}", config.token_file);
                    return Ok(token.to_string());
                }
            }
            Err(e) => debug!("Token file {} unreadable: {e}", config.token_file),
        }
    }

    Err(ClientError::SignInFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_takes_priority() {
        let var = format!("VOICE_AGENT_TEST_TOKEN_{}", std::process::id());
        std::env::set_var(&var, " tok-123 ");
        let config = AuthConfig {
            token_env: var.clone(),
            token_file: String::new(),
        };
        assert_eq!(acquire_token(&config).unwrap(), "tok-123");
        std::env::remove_var(&var);
    }

    #[test]
    fn token_file_fallback() {
        let path = std::env::temp_dir().join(format!("voice-agent-token-{}", std::process::id()));
        std::fs::write(&path, "file-token\n").unwrap();
        let config = AuthConfig {
            token_env: "VOICE_AGENT_TEST_TOKEN_UNSET".into(),
            token_file: path.to_string_lossy().into_owned(),
        };
        assert_eq!(acquire_token(&config).unwrap(), "file-token");
    }

    #[test]
    fn absent_token_is_sign_in_failure() {
        let config = AuthConfig {
            token_env: "VOICE_AGENT_TEST_TOKEN_MISSING".into(),
            token_file: String::new(),
        };
        assert!(matches!(
            acquire_token(&config),
            Err(ClientError::SignInFailed)
        ));
    }
}
