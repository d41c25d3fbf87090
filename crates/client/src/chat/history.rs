//! Stored conversation history

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::{ChatHistoryEntry, ChatHistoryResponse};
use serde::{Deserialize, Serialize};

pub const HISTORY_PATH: &str = "/api/chatbot/history/";

/// Opening line shown when there is no history yet
pub const GREETING: &str = "Hi! I am your MediTrack AI assistant. How can I help you today?";

/// Shown in place of an assistant reply when the server reports an error
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }
}

/// Turn newest-first history entries into a chronological transcript
pub fn transcript(history: Vec<ChatHistoryEntry>) -> Vec<ChatMessage> {
    if history.is_empty() {
        return vec![ChatMessage::assistant(GREETING)];
    }

    history
        .into_iter()
        .rev()
        .flat_map(|entry| {
            [
                ChatMessage::user(entry.message),
                ChatMessage::assistant(entry.ai_response),
            ]
        })
        .collect()
}

impl ApiClient {
    /// Fetch the signed-in user's chat transcript
    pub async fn chat_history(&self) -> Result<Vec<ChatMessage>, ClientError> {
        let response: ChatHistoryResponse = self.get(HISTORY_PATH).await?;
        Ok(transcript(response.history))
    }
}
