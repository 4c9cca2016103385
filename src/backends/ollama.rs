use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::stream::{decode_lines, ensure_success, LineOutcome};
use super::traits::AnalysisBackend;
use super::types::{BackendKind, ChatTurn, CompletionOptions, FragmentStream, Role};
use crate::app::OllamaSettings;
use crate::constants::{DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL};
use crate::utils::{AnalyzerError, Result};

/// Chat against a local Ollama server, streamed as newline-delimited JSON.
///
/// Only the newest user message is sent; the server keeps no context for us.
pub struct OllamaBackend {
    client: Client,
    model: String,
    host: Option<String>,
}

impl OllamaBackend {
    pub fn new(client: Client, settings: &OllamaSettings) -> Self {
        let host = settings
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(normalize_host);
        match &host {
            Some(host) => debug!(host = %host, "Using Ollama host"),
            None => warn!(
                "Ollama host not found. Set it with `config set --host {}`",
                DEFAULT_OLLAMA_HOST
            ),
        }

        let model = settings
            .current_model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_OLLAMA_MODEL)
            .to_string();

        Self {
            client,
            model,
            host,
        }
    }

    fn host(&self) -> Result<&str> {
        self.host.as_deref().ok_or_else(|| {
            AnalyzerError::Configuration("Ollama host is not configured".to_string())
        })
    }
}

/// Accepts `localhost:11434` as well as a full URL
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 1],
    stream: bool,
    options: RequestOptions,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct RequestOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChunk {
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagInfo>,
}

#[derive(Deserialize)]
struct TagInfo {
    name: String,
}

fn parse_ndjson_line(line: &str) -> Result<LineOutcome> {
    let chunk: ChatChunk = serde_json::from_str(line).map_err(|e| {
        AnalyzerError::Stream(format!("unexpected Ollama chunk: {e}"))
    })?;
    if let Some(error) = chunk.error {
        return Err(AnalyzerError::Stream(format!("Ollama error: {error}")));
    }

    let content = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok(if chunk.done {
        LineOutcome::Last(content)
    } else {
        LineOutcome::Fragment(content)
    })
}

#[async_trait]
impl AnalysisBackend for OllamaBackend {
    async fn stream_complete(
        &self,
        history: &[ChatTurn],
        options: &CompletionOptions,
    ) -> Result<FragmentStream> {
        let host = self.host()?;
        let latest = history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .ok_or_else(|| {
                AnalyzerError::SessionState("no user message to send".to_string())
            })?;

        let request = ChatRequest {
            model: &self.model,
            messages: [WireMessage {
                role: Role::User.as_str(),
                content: &latest.content,
            }],
            stream: true,
            options: RequestOptions {
                temperature: options.temperature,
            },
        };

        let url = format!("{host}/api/chat");
        debug!(url = %url, "Opening Ollama chat stream");

        let response = self.client.post(&url).json(&request).send().await?;
        let response = ensure_success(response).await?;

        let bytes = response.bytes_stream().map_err(AnalyzerError::from).boxed();
        Ok(decode_lines(bytes, parse_ndjson_line))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.host()?);
        let response = ensure_success(self.client.get(&url).send().await?).await?;
        let tags: TagsResponse = response.json().await?;

        let mut names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        names.sort();
        Ok(names)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
