use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// ChatAgent Trait
// =============================================================================

/// A provider that turns a conversation into one assistant reply.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Send the conversation and return the first text reply.
    async fn chat(&self, messages: Vec<Message>) -> Result<String>;

    /// Cheap reachability check against the provider.
    async fn ping(&self) -> Result<()>;

    /// Single-prompt completion with no system message.
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(vec![Message::user(prompt)]).await
    }
}
