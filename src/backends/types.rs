use chrono::{DateTime, Local};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::app::GeneralSettings;
use crate::utils::Result;

/// Author of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
        }
    }
}

/// Generation parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    /// Honoured by OpenAI-style backends only
    pub max_tokens: u32,
}

impl From<&GeneralSettings> for CompletionOptions {
    fn from(general: &GeneralSettings) -> Self {
        Self {
            temperature: general.temperature,
            max_tokens: general.max_tokens,
        }
    }
}

/// Concrete transport behind an analysis backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAi,
    Ollama,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::OpenAi => f.write_str("OpenAI"),
            BackendKind::Ollama => f.write_str("Ollama"),
        }
    }
}

/// Token fragments in arrival order; dropping it closes the connection
pub type FragmentStream = BoxStream<'static, Result<String>>;
