use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::traits::AnalysisBackend;
use super::types::{BackendKind, ChatTurn, CompletionOptions, FragmentStream};
use crate::utils::{AnalyzerError, Result};

/// Serve one canned HTTP/1.1 response on a local port.
///
/// Returns the base URL and a handle resolving to the raw request text.
pub(crate) async fn serve_once(
    status_line: &'static str,
    content_type: &'static str,
    body: String,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let head = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (url, handle)
}

/// Send response headers and `first_chunk`, then hold the connection open.
///
/// The handle resolves to `true` once the client closes its end.
pub(crate) async fn serve_until_closed(
    content_type: &'static str,
    first_chunk: &'static str,
) -> (String, JoinHandle<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(first_chunk.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        let mut buf = [0u8; 64];
        matches!(socket.read(&mut buf).await, Ok(0) | Err(_))
    });

    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| {
                    name.trim().eq_ignore_ascii_case("content-length")
                })
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&raw).to_string()
}

/// JSON body of a captured request
pub(crate) fn request_json(request: &str) -> serde_json::Value {
    let body = request.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("");
    serde_json::from_str(body).unwrap()
}

/// How a [`ScriptedBackend`] answers one request
pub(crate) enum Script {
    Fragments(Vec<&'static str>),
    /// Emit the fragments, then a stream error
    FailAfter(Vec<&'static str>, &'static str),
    /// Emit the fragments, then never finish until dropped
    Hang(Vec<&'static str>),
    /// Reject the request before streaming
    Reject(u16, &'static str),
}

/// In-process backend answering from a queue of scripts
pub(crate) struct ScriptedBackend {
    kind: BackendKind,
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<Vec<ChatTurn>>>,
    hung_stream_dropped: Arc<AtomicBool>,
}

/// Raises its flag when the owning stream is dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ScriptedBackend {
    pub(crate) fn new(kind: BackendKind, scripts: Vec<Script>) -> Self {
        Self {
            kind,
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
            hung_stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Histories passed to each `stream_complete` call
    pub(crate) fn requests(&self) -> Vec<Vec<ChatTurn>> {
        self.requests.lock().clone()
    }

    /// Whether a stream opened by [`Script::Hang`] has been dropped
    pub(crate) fn hung_stream_dropped(&self) -> bool {
        self.hung_stream_dropped.load(Ordering::SeqCst)
    }
}

fn fragments(parts: Vec<&'static str>) -> impl futures::Stream<Item = Result<String>> {
    stream::iter(parts.into_iter().map(|p| Ok(p.to_string())))
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn stream_complete(
        &self,
        history: &[ChatTurn],
        _options: &CompletionOptions,
    ) -> Result<FragmentStream> {
        self.requests.lock().push(history.to_vec());
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::Fragments(vec!["ok"]));

        match script {
            Script::Fragments(parts) => Ok(fragments(parts).boxed()),
            Script::FailAfter(parts, message) => Ok(fragments(parts)
                .chain(stream::once(async move {
                    Err(AnalyzerError::Stream(message.to_string()))
                }))
                .boxed()),
            Script::Hang(parts) => {
                let flag = DropFlag(Arc::clone(&self.hung_stream_dropped));
                Ok(fragments(parts)
                    .chain(stream::pending())
                    .map(move |item| {
                        let _held = &flag;
                        item
                    })
                    .boxed())
            }
            Script::Reject(status, body) => Err(AnalyzerError::Api {
                status,
                body: body.to_string(),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["scripted".to_string()])
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
