use std::fmt;

/// Where a session is within a single turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    /// User turn appended, request in flight
    Sending,
    /// Fragments arriving
    Streaming,
    Completed,
    Failed,
}

impl SessionPhase {
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Idle, Sending)
                | (Sending, Streaming)
                | (Sending, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (Completed, Idle)
                | (Failed, Idle)
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Sending => "sending",
            SessionPhase::Streaming => "streaming",
            SessionPhase::Completed => "completed",
            SessionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Notification delivered to session subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Fragment(String),
    TurnCompleted,
    TurnFailed(String),
}
