//! Conversation state shared by every step of the verification flow.

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, Role};

/// One entry in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(m: &Message) -> Self {
        ChatMessage {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// Message history plus the verified customer, if any.
///
/// `customer_id` is write-once: after it is resolved there is no way to clear
/// or replace it for the lifetime of the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_id: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn is_verified(&self) -> bool {
        self.customer_id.is_some()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// The most recent message of any role.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent user message.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// Record the verified customer. Returns `false` and leaves the state
    /// untouched if a customer was already resolved.
    pub fn resolve_customer(&mut self, customer_id: impl Into<String>) -> bool {
        if self.customer_id.is_some() {
            return false;
        }
        self.customer_id = Some(customer_id.into());
        true
    }

    /// Messages in provider form.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(ChatMessage::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_id_is_write_once() {
        let mut state = ConversationState::new();
        assert!(!state.is_verified());
        assert!(state.resolve_customer("CUST-001"));
        assert!(!state.resolve_customer("CUST-002"));
        assert_eq!(state.customer_id(), Some("CUST-001"));
    }

    #[test]
    fn last_user_message_skips_assistant_turns() {
        let mut state = ConversationState::new();
        state.push_user("Where is my order?");
        state.push_assistant("Please provide your email address.");
        assert_eq!(state.last_message().unwrap().role, Role::Assistant);
        assert_eq!(state.last_user_message().unwrap().content, "Where is my order?");
    }

    #[test]
    fn serde_omits_missing_customer() {
        let mut state = ConversationState::new();
        state.push_user("hi");
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("customer_id").is_none());
        assert_eq!(json["messages"][0]["role"], "user");

        state.resolve_customer("CUST-007");
        let parsed: ConversationState =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(parsed, state);
    }
}
