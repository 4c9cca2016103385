use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::ollama::OllamaBackend;
use super::openai::OpenAiBackend;
use super::traits::AnalysisBackend;
use crate::app::{AiSource, Settings};
use crate::constants::{HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS};
use crate::utils::{AnalyzerError, Result};

/// Builds the backend selected by the configured AI source.
///
/// All backends share one connection pool.
#[derive(Debug, Clone)]
pub struct BackendFactory {
    client: Client,
}

impl BackendFactory {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn create(&self, settings: &Settings) -> Result<Arc<dyn AnalysisBackend>> {
        let general = &settings.general_settings;
        let backend: Arc<dyn AnalysisBackend> = match &general.ai_source {
            AiSource::OpenAiApi => Arc::new(OpenAiBackend::new(
                self.client.clone(),
                &general.open_ai_settings,
            )),
            AiSource::Ollama => Arc::new(OllamaBackend::new(
                self.client.clone(),
                &general.ollama_settings,
            )),
            AiSource::Unsupported(name) => {
                return Err(AnalyzerError::UnsupportedProvider(name.clone()));
            }
        };

        info!(
            backend = %backend.kind(),
            model = backend.model_name(),
            "Selected analysis backend"
        );
        Ok(backend)
    }
}
