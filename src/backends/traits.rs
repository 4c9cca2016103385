use async_trait::async_trait;

use super::types::{BackendKind, ChatTurn, CompletionOptions, FragmentStream};
use crate::utils::Result;

/// Core trait that all analysis backends must implement
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Open a streamed completion for the conversation so far.
    ///
    /// `history` ends with the user turn being answered. The returned stream
    /// yields each fragment as soon as it is decoded; dropping it early closes
    /// the underlying connection.
    async fn stream_complete(
        &self,
        history: &[ChatTurn],
        options: &CompletionOptions,
    ) -> Result<FragmentStream>;

    /// Models the provider offers
    async fn list_models(&self) -> Result<Vec<String>>;

    fn kind(&self) -> BackendKind;

    /// Model requests are sent to
    fn model_name(&self) -> &str;
}
