//! Dialogue agent client.
//!
//! One authenticated POST per turn to the agent's per-session
//! `detectIntent` resource. The reply is the first text segment of the
//! first response message; anything else degrades to a fixed fallback so
//! the transcript always has something to show.

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::AgentConfig;
use crate::error::ClientError;

/// Shown (and spoken) when the agent response carries no message text.
pub const FALLBACK_REPLY: &str = "Sorry, I didn't understand that.";

pub struct AgentClient {
    client: Client,
    endpoint: String,
    agent_path: String,
}

impl AgentClient {
    pub fn new(config: &AgentConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::AgentRequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            agent_path: config.agent_path.clone(),
        })
    }

    /// Send one user utterance to the agent, keyed by session id, and
    /// return the reply text.
    pub async fn detect_intent(
        &self,
        token: &str,
        session_id: &str,
        text: &str,
        language_code: &str,
    ) -> Result<String, ClientError> {
        let url = format!(
            "{}/{}/sessions/{}:detectIntent",
            self.endpoint, self.agent_path, session_id
        );

        let body = json!({
            "queryInput": {
                "text": { "text": text },
                "languageCode": language_code
            }
        });

        debug!("Agent request for session {session_id}: {text:?}");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::AgentRequestFailed(describe_transport(&e)))?;

        if !resp.status().is_success() {
            return Err(ClientError::AgentRequestFailed(format!(
                "API error: {}",
                resp.status()
            )));
        }

        let data = resp
            .json::<Value>()
            .await
            .map_err(|e| ClientError::AgentRequestFailed(format!("malformed response: {e}")))?;

        Ok(reply_from_response(&data))
    }
}

/// Extract the first text segment of the first response message, falling
/// back when the message list is empty or carries no text.
pub fn reply_from_response(data: &Value) -> String {
    data["queryResult"]["responseMessages"][0]["text"]["text"][0]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_REPLY.to_string())
}

/// Human-readable description of a transport failure.
pub fn describe_transport(e: &reqwest::Error) -> String {
    if e.is_connect() {
        "cannot reach the service".to_string()
    } else if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_text_segment() {
        let data = json!({
            "queryResult": {
                "responseMessages": [
                    { "text": { "text": ["First reply", "second segment"] } },
                    { "text": { "text": ["later message"] } }
                ]
            }
        });
        assert_eq!(reply_from_response(&data), "First reply");
    }

    #[test]
    fn empty_message_list_yields_fallback() {
        let data = json!({ "queryResult": { "responseMessages": [] } });
        assert_eq!(reply_from_response(&data), FALLBACK_REPLY);
    }

    #[test]
    fn missing_query_result_yields_fallback() {
        assert_eq!(reply_from_response(&json!({})), FALLBACK_REPLY);
    }

    #[test]
    fn non_text_first_message_yields_fallback() {
        let data = json!({
            "queryResult": {
                "responseMessages": [ { "payload": { "kind": "card" } } ]
            }
        });
        assert_eq!(reply_from_response(&data), FALLBACK_REPLY);
    }
}
