use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message in a conversation, carrying a stable identity, a role, and text
/// content.
///
/// The `id` is assigned at construction and never changes. The messages
/// channel deduplicates on it, which is what makes re-applying an
/// already-seen update (for example during checkpoint replay) idempotent.
///
/// # Examples
///
/// ```
/// use mealgraph::message::Message;
///
/// let user_msg = Message::user("What's good for lunch?");
/// let assistant_msg = Message::assistant("Let me look at a few options.");
///
/// assert!(user_msg.has_role(Message::USER));
/// assert_ne!(user_msg.id, assistant_msg.id);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identity used for append deduplication.
    #[serde(default = "Message::fresh_id")]
    pub id: String,
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    fn fresh_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            id: Self::fresh_id(),
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a message with an explicit id.
    ///
    /// Used when rehydrating persisted conversations where identity must be
    /// preserved exactly.
    #[must_use]
    pub fn with_id(id: impl Into<String>, role: &str, content: &str) -> Self {
        Self {
            id: id.into(),
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convenience_constructors() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, Message::USER);
        assert_eq!(user_msg.content, "Hello");

        let assistant_msg = Message::assistant("Hi there!");
        assert_eq!(assistant_msg.role, Message::ASSISTANT);

        let custom_msg = Message::new("tool", "Result: 42");
        assert_eq!(custom_msg.role, "tool");
        assert_eq!(custom_msg.content, "Result: 42");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Message::user("same text");
        let b = Message::user("same text");
        assert_ne!(a.id, b.id);
        assert_ne!(a, b);
    }

    #[test]
    fn test_with_id_preserves_identity() {
        let msg = Message::with_id("msg-1", Message::USER, "hi");
        assert_eq!(msg.id, "msg-1");
    }

    #[test]
    fn test_role_checking() {
        let user_msg = Message::user("Hello");
        assert!(user_msg.has_role(Message::USER));
        assert!(!user_msg.has_role(Message::ASSISTANT));
        assert!(!user_msg.has_role(Message::SYSTEM));
    }

    #[test]
    fn test_serialization_round_trip() {
        let original = Message::user("Test message");
        let json = serde_json::to_string(&original).expect("serialize");
        let deserialized: Message = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(original, deserialized);
        assert_eq!(deserialized.id, original.id);
    }

    #[test]
    fn test_missing_id_defaults_to_fresh() {
        let parsed: Message =
            serde_json::from_str(r#"{"role":"user","content":"legacy"}"#).expect("deserialize");
        assert!(!parsed.id.is_empty());
    }
}
