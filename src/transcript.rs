//! Conversation transcript: an ordered, append-only message list owned by
//! the active session. Entries are never mutated or removed; the whole
//! transcript is discarded on logout.

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Agent,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender: Sender,
    /// Text as displayed. Agent entries keep the raw reply; markup is
    /// stripped only on the speech path.
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp: Local::now(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Drop all entries. Called on logout.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_only_ordering() {
        let mut t = Transcript::new();
        t.push(ChatMessage::user("hello"));
        t.push(ChatMessage::agent("hi there"));
        assert_eq!(t.len(), 2);
        let senders: Vec<Sender> = t.iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![Sender::User, Sender::Agent]);
        assert_eq!(t.last().unwrap().text, "hi there");
    }

    #[test]
    fn clear_on_logout() {
        let mut t = Transcript::new();
        t.push(ChatMessage::user("hello"));
        t.clear();
        assert!(t.is_empty());
    }
}
