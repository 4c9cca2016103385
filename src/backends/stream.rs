use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Response;
use std::collections::VecDeque;

use super::types::FragmentStream;
use crate::utils::{AnalyzerError, Result};

/// What a single protocol line contributed
#[derive(Debug, PartialEq)]
pub(crate) enum LineOutcome {
    Fragment(String),
    /// Fragment carried by the terminating line
    Last(String),
    Skip,
    Done,
}

/// Turn a response body into fragments, one protocol line at a time.
///
/// Lines may straddle chunk boundaries; a fragment is emitted as soon as its
/// line is complete. The first error or terminating line ends the stream.
pub(crate) fn decode_lines<F>(bytes: BoxStream<'static, Result<Bytes>>, parse: F) -> FragmentStream
where
    F: FnMut(&str) -> Result<LineOutcome> + Send + 'static,
{
    let state = LineDecoder {
        bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
        parse,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.drain_lines(false);
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(e));
                    state.finished = true;
                }
                None => {
                    state.drain_lines(true);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

struct LineDecoder<F> {
    bytes: BoxStream<'static, Result<Bytes>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String>>,
    finished: bool,
    parse: F,
}

impl<F> LineDecoder<F>
where
    F: FnMut(&str) -> Result<LineOutcome>,
{
    fn drain_lines(&mut self, at_end: bool) {
        while !self.finished {
            // '\n' never occurs inside a multi-byte UTF-8 sequence
            let line: Vec<u8> = match self.buffer.iter().position(|b| *b == b'\n') {
                Some(pos) => self.buffer.drain(..=pos).collect(),
                None if at_end && !self.buffer.is_empty() => std::mem::take(&mut self.buffer),
                None => break,
            };

            let Ok(text) = String::from_utf8(line) else {
                self.fail(AnalyzerError::Stream(
                    "response is not valid UTF-8".to_string(),
                ));
                break;
            };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            match (self.parse)(text) {
                Ok(LineOutcome::Fragment(fragment)) => self.push(fragment),
                Ok(LineOutcome::Last(fragment)) => {
                    self.push(fragment);
                    self.finished = true;
                }
                Ok(LineOutcome::Skip) => {}
                Ok(LineOutcome::Done) => self.finished = true,
                Err(e) => self.fail(e),
            }
        }
    }

    fn push(&mut self, fragment: String) {
        if !fragment.is_empty() {
            self.pending.push_back(Ok(fragment));
        }
    }

    fn fail(&mut self, error: AnalyzerError) {
        self.pending.push_back(Err(error));
        self.finished = true;
    }
}

/// Non-2xx responses become [`AnalyzerError::Api`] carrying the body
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AnalyzerError::Api {
        status: status.as_u16(),
        body,
    })
}
