//! Conversation entries and generation model catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One stored message in a user's conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub user_id: i64,
    pub role: Role,
    pub content: String,
    /// Insertion time, fixed-width RFC 3339 with nanoseconds so that string
    /// order is insertion order.
    pub created_at: String,
}

/// Message as sent to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<ConversationEntry> for ChatMessage {
    fn from(entry: ConversationEntry) -> Self {
        Self {
            role: entry.role,
            content: entry.content,
        }
    }
}

/// Generation backend a user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatModel {
    #[default]
    Gpt4,
    Deepseek,
    Claude,
    Llama,
    Mistral,
}

impl ChatModel {
    pub const ALL: [ChatModel; 5] = [
        ChatModel::Gpt4,
        ChatModel::Deepseek,
        ChatModel::Claude,
        ChatModel::Llama,
        ChatModel::Mistral,
    ];

    /// Identifier users type in `/model <id>`.
    pub fn id(&self) -> &'static str {
        match self {
            ChatModel::Gpt4 => "gpt4",
            ChatModel::Deepseek => "deepseek",
            ChatModel::Claude => "claude",
            ChatModel::Llama => "llama",
            ChatModel::Mistral => "mistral",
        }
    }

    /// Model name understood by the generation backend.
    pub fn backend_name(&self) -> &'static str {
        match self {
            ChatModel::Gpt4 => "openai",
            ChatModel::Deepseek => "deepseek",
            ChatModel::Claude => "claude-hybridspace",
            ChatModel::Llama => "llama",
            ChatModel::Mistral => "mistral",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
