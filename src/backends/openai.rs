use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::stream::{decode_lines, ensure_success, LineOutcome};
use super::traits::AnalysisBackend;
use super::types::{BackendKind, ChatTurn, CompletionOptions, FragmentStream};
use crate::app::OpenAiSettings;
use crate::constants::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::utils::{AnalyzerError, Result};

/// Chat completions over the OpenAI HTTP API, streamed as server-sent events
pub struct OpenAiBackend {
    client: Client,
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(client: Client, settings: &OpenAiSettings) -> Self {
        let api_key = non_blank(settings.api_key.as_deref());
        if api_key.is_none() {
            warn!("OpenAI API key not found. Set it with `config set --api-key <KEY>`");
        }

        let model = non_blank(settings.current_model.as_deref())
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let base_url = non_blank(settings.base_url.as_deref())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        debug!(model = %model, base_url = %base_url, "Created OpenAI backend");
        Self {
            client,
            model,
            api_key,
            base_url,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AnalyzerError::Configuration("OpenAI API key is not configured".to_string())
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    id: String,
}

/// One server-sent event line. Comments and non-data fields are skipped.
fn parse_sse_line(line: &str) -> Result<LineOutcome> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(LineOutcome::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(LineOutcome::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        AnalyzerError::Stream(format!("unexpected OpenAI event: {e}"))
    })?;
    if let Some(error) = chunk.error {
        return Err(AnalyzerError::Stream(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .map(LineOutcome::Fragment)
        .unwrap_or(LineOutcome::Skip))
}

#[async_trait]
impl AnalysisBackend for OpenAiBackend {
    async fn stream_complete(
        &self,
        history: &[ChatTurn],
        options: &CompletionOptions,
    ) -> Result<FragmentStream> {
        let api_key = self.api_key()?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: history
                .iter()
                .map(|turn| WireMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            stream: true,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(url = %url, turns = history.len(), "Opening OpenAI completion stream");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let bytes = response.bytes_stream().map_err(AnalyzerError::from).boxed();
        Ok(decode_lines(bytes, parse_sse_line))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1/models", self.base_url);

        let response = self.client.get(&url).bearer_auth(api_key).send().await?;
        let response = ensure_success(response).await?;
        let models: ModelsResponse = response.json().await?;

        let mut ids: Vec<String> = models.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_support::{request_json, serve_once, serve_until_closed};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn backend(base_url: &str, api_key: Option<&str>) -> OpenAiBackend {
        let settings = OpenAiSettings {
            current_model: Some("gpt-test".to_string()),
            api_key: api_key.map(str::to_string),
            base_url: Some(format!("{base_url}/")),
        };
        OpenAiBackend::new(Client::new(), &settings)
    }

    fn options() -> CompletionOptions {
        CompletionOptions {
            temperature: 0.0,
            max_tokens: 2000,
        }
    }

    #[test]
    fn test_parse_sse_lines() {
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), LineOutcome::Skip);
        assert_eq!(parse_sse_line("event: message").unwrap(), LineOutcome::Skip);
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), LineOutcome::Done);
        let content = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(
            parse_sse_line(content).unwrap(),
            LineOutcome::Fragment("Hi".to_string())
        );
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only).unwrap(), LineOutcome::Skip);
        assert!(parse_sse_line("data: {not json").is_err());
        let error_event = r#"data: {"error":{"message":"overloaded"}}"#;
        assert!(parse_sse_line(error_event).is_err());
    }

    #[tokio::test]
    async fn test_streams_fragments_and_sends_full_history() {
        let body = [
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"Null "}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"check"}}]}"#,
            "data: [DONE]",
            "",
        ]
        .join("\n\n");
        let (url, server) = serve_once("200 OK", "text/event-stream", body).await;

        let history = vec![
            ChatTurn::user("log"),
            ChatTurn::assistant("answer"),
            ChatTurn::user("Additional Message:\nmore"),
        ];
        let stream = backend(&url, Some("sk-test"))
            .stream_complete(&history, &options())
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
        assert_eq!(fragments, vec!["Null ".to_string(), "check".to_string()]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        let request_lower = request.to_lowercase();
        assert!(request_lower.contains("authorization: bearer sk-test"));

        let json = request_json(&request);
        assert_eq!(json["model"], "gpt-test");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["messages"][2]["content"], "Additional Message:\nmore");
    }

    #[tokio::test]
    async fn test_error_status_is_reported_with_body() {
        let (url, _server) = serve_once(
            "401 Unauthorized",
            "application/json",
            r#"{"error":{"message":"bad key"}}"#.to_string(),
        )
        .await;

        let result = backend(&url, Some("sk-wrong"))
            .stream_complete(&[ChatTurn::user("log")], &options())
            .await;
        match result {
            Err(AnalyzerError::Api { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("expected API error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_connection() {
        let (url, server) = serve_until_closed(
            "text/event-stream",
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
        )
        .await;

        let mut stream = backend(&url, Some("sk-test"))
            .stream_complete(&[ChatTurn::user("log")], &options())
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        drop(stream);

        let closed = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("connection still open after the stream was dropped")
            .unwrap();
        assert!(closed);
    }

    #[tokio::test]
    async fn test_missing_key_fails_on_first_call() {
        let backend = backend("http://127.0.0.1:9", None);
        let result = backend
            .stream_complete(&[ChatTurn::user("log")], &options())
            .await;
        assert!(matches!(result, Err(AnalyzerError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_list_models_sorted() {
        let body = String::from(
            r#"{"data":[{"id":"gpt-4o"},{"id":"gpt-4o-mini"},{"id":"dall-e-3"}]}"#,
        );
        let (url, server) = serve_once("200 OK", "application/json", body).await;

        let models = backend(&url, Some("sk-test")).list_models().await.unwrap();
        assert_eq!(models, vec!["dall-e-3", "gpt-4o", "gpt-4o-mini"]);
        assert!(server.await.unwrap().starts_with("GET /v1/models"));
    }

    #[test]
    fn test_defaults_when_settings_blank() {
        let settings = OpenAiSettings {
            current_model: Some("  ".to_string()),
            api_key: None,
            base_url: None,
        };
        let backend = OpenAiBackend::new(Client::new(), &settings);
        assert_eq!(backend.model_name(), DEFAULT_OPENAI_MODEL);
        assert_eq!(
            backend.base_url,
            DEFAULT_OPENAI_BASE_URL.trim_end_matches('/')
        );
        assert_eq!(backend.kind(), BackendKind::OpenAi);
    }
}
