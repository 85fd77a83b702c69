//! Final instruction handed to the chat model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionMessage {
    pub role: MessageRole,
    pub content: String,
}

impl InstructionMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionPair {
    pub system: String,
    pub user: String,
}

impl InstructionPair {
    pub fn messages(&self) -> Vec<InstructionMessage> {
        vec![
            InstructionMessage::new(MessageRole::System, self.system.clone()),
            InstructionMessage::new(MessageRole::User, self.user.clone()),
        ]
    }

    /// Human-readable dump of the whole instruction.
    pub fn transcript(&self) -> String {
        format!(
            "=== SYSTEM ===\n{}\n\n=== USER ===\n{}",
            self.system, self.user
        )
    }
}

#[derive(Debug, Clone)]
pub struct PromptComposer {
    default_system: String,
}

impl PromptComposer {
    /// `default_system` replaces an empty system instruction.
    pub fn new(default_system: impl Into<String>) -> Self {
        Self {
            default_system: default_system.into(),
        }
    }

    pub fn compose(&self, system: &str, prompt: &str) -> InstructionPair {
        let system = if system.trim().is_empty() {
            self.default_system.clone()
        } else {
            system.to_string()
        };
        InstructionPair {
            system,
            user: prompt.to_string(),
        }
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new("You are a helpful assistant.")
    }
}
