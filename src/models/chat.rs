use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One line of a chat session. Never mutated after it is appended.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(id: u64, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }
}
