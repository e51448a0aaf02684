//! Message types for chat conversations

use serde::{Deserialize, Serialize};

/// Greeting placed at the head of every new conversation.
pub const GREETING: &str = "Hello, I'm your assistant, how can I help you?";

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Rough token estimate (four characters per token).
    pub fn estimated_tokens(&self) -> usize {
        self.content.chars().count().div_ceil(4)
    }
}

/// Keep the newest messages whose estimated size fits `token_limit`.
///
/// Order is preserved. A single message larger than the budget is dropped
/// along with everything older than it.
pub fn trim_history(history: &[Message], token_limit: usize) -> &[Message] {
    let mut used = 0;
    let mut start = history.len();
    for (i, msg) in history.iter().enumerate().rev() {
        used += msg.estimated_tokens();
        if used > token_limit {
            break;
        }
        start = i;
    }
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_keeps_newest() {
        let history = vec![
            Message::user("a".repeat(40)),
            Message::assistant("b".repeat(40)),
            Message::user("c".repeat(40)),
        ];
        let kept = trim_history(&history, 20);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].role, Role::Assistant);
    }

    #[test]
    fn trim_with_room_keeps_all() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        assert_eq!(trim_history(&history, 4000).len(), 2);
    }

    #[test]
    fn trim_oversized_newest_keeps_nothing() {
        let history = vec![Message::user("short"), Message::user("x".repeat(100))];
        assert!(trim_history(&history, 10).is_empty());
    }
}
