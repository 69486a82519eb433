use crate::assistant::Assistant;
use crate::models::chat::{ Message, Sender };

/// An assistant reply that has been decided but not shown yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub in_reply_to: u64,
    pub text: String,
}

/// Per-connection chat state: an append-only message log and a count of
/// replies still "being typed".
#[derive(Debug)]
pub struct ChatSession {
    id: String,
    messages: Vec<Message>,
    next_id: u64,
    outstanding: usize,
}

impl ChatSession {
    /// Opens a session seeded with the assistant's greeting as message 1.
    pub fn new(id: impl Into<String>, greeting: &str) -> Self {
        Self {
            id: id.into(),
            messages: vec![Message::new(1, greeting, Sender::Assistant)],
            next_id: 2,
            outstanding: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_composing(&self) -> bool {
        self.outstanding > 0
    }

    /// Quick actions are only offered until the user speaks.
    pub fn shows_quick_actions(&self) -> bool {
        self.messages.len() <= 1
    }

    fn append(&mut self, text: String, sender: Sender) -> &Message {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(Message::new(id, text, sender));
        &self.messages[self.messages.len() - 1]
    }

    /// Appends the user's message and decides the reply. Blank input is
    /// ignored and returns `None`.
    pub fn submit(&mut self, text: &str, assistant: &Assistant) -> Option<(Message, PendingReply)> {
        if text.trim().is_empty() {
            return None;
        }
        let reply = assistant.reply(text).to_string();
        let user_message = self.append(text.to_string(), Sender::User).clone();
        self.outstanding += 1;
        let pending = PendingReply { in_reply_to: user_message.id, text: reply };
        Some((user_message, pending))
    }

    /// Shows a reply whose typing delay has elapsed.
    pub fn deliver(&mut self, pending: PendingReply) -> &Message {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.append(pending.text, Sender::Assistant)
    }
}
