use crate::backends::{ChatTurn, Role};
use crate::utils::{AnalyzerError, Result};

/// Append-only transcript of one analysis session
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ChatTurn::user(content));
    }

    /// An assistant turn always answers the user turn directly before it
    pub fn push_assistant(&mut self, content: impl Into<String>) -> Result<()> {
        match self.last() {
            Some(turn) if turn.role == Role::User => {
                self.turns.push(ChatTurn::assistant(content));
                Ok(())
            }
            _ => Err(AnalyzerError::SessionState(
                "assistant turn without a preceding user turn".to_string(),
            )),
        }
    }
}
