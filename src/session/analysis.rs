use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::history::ChatHistory;
use super::state::{SessionEvent, SessionPhase};
use crate::app::GeneralSettings;
use crate::backends::{AnalysisBackend, BackendKind, ChatTurn, CompletionOptions};
use crate::constants::{ADDITIONAL_MESSAGE_PREFIX, DEFAULT_ANALYSIS_PROMPT};
use crate::utils::{AnalyzerError, Result};

/// A conversation about one log with a single backend.
///
/// Turns run one at a time. Each fragment is forwarded to subscribers as it
/// arrives; the accumulated text becomes the assistant turn once the stream
/// ends. A failed or cancelled turn leaves its user turn unanswered.
pub struct AnalysisSession {
    backend: Arc<dyn AnalysisBackend>,
    prompt: String,
    options: CompletionOptions,
    history: ChatHistory,
    phase: SessionPhase,
    subscribers: Vec<UnboundedSender<SessionEvent>>,
    cancel: CancellationToken,
}

impl AnalysisSession {
    pub fn new(backend: Arc<dyn AnalysisBackend>, general: &GeneralSettings) -> Self {
        let prompt = if general.prompt.trim().is_empty() {
            DEFAULT_ANALYSIS_PROMPT.to_string()
        } else {
            general.prompt.clone()
        };

        Self {
            backend,
            prompt,
            options: CompletionOptions::from(general),
            history: ChatHistory::new(),
            phase: SessionPhase::Idle,
            subscribers: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Ask for a diagnosis of `log_text`, prefixed with the analysis prompt
    pub async fn send_initial(&mut self, log_text: &str) -> Result<String> {
        let message = format!("{}{}", self.prompt, log_text);
        self.run_turn(message).await
    }

    /// Follow up on the conversation so far
    pub async fn send_additional(&mut self, message: &str) -> Result<String> {
        let message = format!("{ADDITIONAL_MESSAGE_PREFIX}{message}");
        self.run_turn(message).await
    }

    /// Receive every fragment and turn outcome from now on
    pub fn subscribe(&mut self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Token that cancels the in-flight turn, or the next one if idle
    pub fn cancellation_token(&mut self) -> CancellationToken {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.cancel.clone()
    }

    pub fn history(&self) -> &[ChatTurn] {
        self.history.turns()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    async fn run_turn(&mut self, message: String) -> Result<String> {
        if self.phase != SessionPhase::Idle {
            // The previous turn's future was dropped mid-flight
            warn!(phase = %self.phase, "Discarding abandoned turn");
            self.phase = SessionPhase::Idle;
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        let cancel = self.cancel.clone();

        self.transition(SessionPhase::Sending)?;
        self.history.push_user(message.clone());

        match self.stream_turn(&cancel).await {
            Ok(text) => {
                self.history.push_assistant(text.clone())?;
                self.transition(SessionPhase::Completed)?;
                self.emit(SessionEvent::TurnCompleted);
                self.transition(SessionPhase::Idle)?;
                debug!(chars = text.len(), turns = self.history.len(), "Turn completed");
                Ok(text)
            }
            Err(e) => {
                match &e {
                    AnalyzerError::Cancelled => info!("Analysis turn cancelled"),
                    _ => error!(
                        backend = %self.backend.kind(),
                        attempted = %message,
                        error = %e,
                        "Analysis request failed"
                    ),
                }
                self.transition(SessionPhase::Failed)?;
                self.emit(SessionEvent::TurnFailed(e.to_string()));
                self.transition(SessionPhase::Idle)?;
                Err(e)
            }
        }
    }

    async fn stream_turn(&mut self, cancel: &CancellationToken) -> Result<String> {
        let backend = Arc::clone(&self.backend);
        let mut fragments = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalyzerError::Cancelled),
            opened = backend.stream_complete(self.history.turns(), &self.options) => opened?,
        };
        self.transition(SessionPhase::Streaming)?;

        let mut accumulated = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AnalyzerError::Cancelled),
                next = fragments.next() => next,
            };
            match next {
                Some(Ok(fragment)) => {
                    accumulated.push_str(&fragment);
                    self.emit(SessionEvent::Fragment(fragment));
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(accumulated),
            }
        }
    }

    fn transition(&mut self, next: SessionPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(AnalyzerError::SessionState(format!(
                "cannot move from {} to {}",
                self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
