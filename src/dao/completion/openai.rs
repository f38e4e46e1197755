//! OpenAI-compatible `/chat/completions` client.

use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt, future::BoxFuture};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatTurn, CompletionClient, FragmentStream, UpstreamError, UpstreamResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Longest slice of an error body echoed back in [`UpstreamError::RequestStatus`].
const MAX_ERROR_BODY: usize = 512;

/// Connection and model settings for the provider.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl OpenAiConfig {
    /// Read credentials from the environment; model settings come from the application config.
    ///
    /// `OPENAI_*` variables win over their `AI_INTEGRATIONS_OPENAI_*` counterparts.
    pub fn from_env(model: impl Into<String>, max_tokens: u32) -> Self {
        let api_key = first_env(&["OPENAI_API_KEY", "AI_INTEGRATIONS_OPENAI_API_KEY"]);
        let base_url = first_env(&["OPENAI_BASE_URL", "AI_INTEGRATIONS_OPENAI_BASE_URL"])
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            api_key,
            base_url,
            model: model.into(),
            max_tokens,
        }
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// [`CompletionClient`] speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: Arc<str>,
    api_key: Option<Arc<str>>,
    model: Arc<str>,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Build the HTTP client. No request is sent until the first completion.
    pub fn new(config: OpenAiConfig) -> UpstreamResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| UpstreamError::ClientBuilder { source })?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint: Arc::from(endpoint),
            api_key: config.api_key.map(Arc::from),
            model: Arc::from(config.model),
            max_tokens: config.max_tokens,
        })
    }

    async fn send(&self, turns: Vec<ChatTurn>, stream: bool) -> UpstreamResult<Response> {
        let api_key = self.api_key.as_ref().ok_or(UpstreamError::MissingApiKey)?;
        let body = CompletionBody {
            model: &self.model,
            messages: turns,
            max_tokens: self.max_tokens,
            stream,
        };

        debug!(
            model = %self.model,
            turns = body.messages.len(),
            stream,
            "sending completion request"
        );

        let response = self
            .client
            .post(&*self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| UpstreamError::RequestSend { source })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|index| body.is_char_boundary(*index))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(UpstreamError::RequestStatus { status, body })
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, turns: Vec<ChatTurn>) -> BoxFuture<'static, UpstreamResult<String>> {
        let client = self.clone();
        Box::pin(async move {
            let response = client.send(turns, false).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|source| UpstreamError::Stream { source })?;
            let payload: CompletionResponse = serde_json::from_slice(&bytes)
                .map_err(|source| UpstreamError::Decode { source })?;

            if let Some(error) = payload.error {
                return Err(UpstreamError::Provider {
                    message: error.message,
                });
            }

            Ok(payload
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default())
        })
    }

    fn stream(&self, turns: Vec<ChatTurn>) -> BoxFuture<'static, UpstreamResult<FragmentStream>> {
        let client = self.clone();
        Box::pin(async move {
            let response = client.send(turns, true).await?;
            Ok(fragment_stream(response.bytes_stream()))
        })
    }
}

/// Turn a streamed `chat/completions` body into the fragments it carries.
fn fragment_stream<S, B>(body: S) -> FragmentStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let mut bytes = Box::pin(body);
    let fragments = stream! {
        let mut lines = LineBuffer::default();
        loop {
            let (batch, body_ended) = match bytes.next().await {
                Some(Ok(chunk)) => (lines.push(chunk.as_ref()), false),
                Some(Err(source)) => {
                    yield Err(UpstreamError::Stream { source });
                    return;
                }
                // A last line may arrive without its trailing newline.
                None => (lines.finish().into_iter().collect::<Vec<_>>(), true),
            };

            for line in batch {
                match parse_event_line(&line) {
                    Ok(Some(StreamLine::Fragment(text))) => yield Ok(text),
                    Ok(Some(StreamLine::Done)) => return,
                    Ok(None) => {}
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }

            if body_ended {
                return;
            }
        }
    };

    Box::pin(fragments)
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ProviderError {
    message: String,
}

/// Meaningful line of the provider's event stream.
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Fragment(String),
    Done,
}

/// Interpret one line of the event stream. Blank lines, comments, non-`data`
/// fields and chunks carrying no text yield `None`.
fn parse_event_line(line: &str) -> UpstreamResult<Option<StreamLine>> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(StreamLine::Done));
    }

    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|source| UpstreamError::Decode { source })?;
    if let Some(error) = chunk.error {
        return Err(UpstreamError::Provider {
            message: error.message,
        });
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|text| !text.is_empty());
    Ok(text.map(StreamLine::Fragment))
}

/// Splits a chunked byte stream into complete lines. Partial lines (and split
/// UTF-8 sequences) wait in the buffer for the next chunk.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(position) = self.pending.iter().position(|byte| *byte == b'\n') {
            let raw = self.pending.drain(..=position).collect::<Vec<_>>();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Take whatever is left once the body has ended.
    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_and_done_marker_are_recognised() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(
            parse_event_line(line).unwrap(),
            Some(StreamLine::Fragment("Hel".into()))
        );
        assert_eq!(parse_event_line("data: [DONE]").unwrap(), Some(StreamLine::Done));
    }

    #[test]
    fn role_only_and_finish_chunks_carry_no_fragment() {
        let role = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        let finish = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_event_line(role).unwrap(), None);
        assert_eq!(parse_event_line(finish).unwrap(), None);
        assert_eq!(parse_event_line("").unwrap(), None);
        assert_eq!(parse_event_line(": keep-alive").unwrap(), None);
    }

    #[test]
    fn provider_error_chunk_is_an_error() {
        let line = r#"data: {"error":{"message":"rate limited"}}"#;
        match parse_event_line(line) {
            Err(UpstreamError::Provider { message }) => assert_eq!(message, "rate limited"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            parse_event_line("data: {not json"),
            Err(UpstreamError::Decode { .. })
        ));
    }

    #[test]
    fn line_buffer_reassembles_split_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        assert_eq!(buffer.push(b":1}\r\n\ndata: [DO"), vec!["data: {\"a\":1}", ""]);
        assert_eq!(buffer.push(b"NE]\n"), vec!["data: [DONE]"]);
    }

    #[test]
    fn unterminated_last_line_is_flushed_at_end_of_body() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: [DONE]").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn line_buffer_keeps_multibyte_characters_intact_across_chunks() {
        let mut buffer = LineBuffer::default();
        let text = "data: é\n".as_bytes();
        let (head, tail) = text.split_at(7);
        assert!(buffer.push(head).is_empty());
        assert_eq!(buffer.push(tail), vec!["data: é"]);
    }

    #[tokio::test]
    async fn fragments_survive_a_body_without_final_newline() {
        let chunks = vec![
            Ok::<_, reqwest::Error>(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n".to_vec(),
            ),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}".to_vec()),
        ];

        let fragments = fragment_stream(futures::stream::iter(chunks))
            .map(|fragment| fragment.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let client = OpenAiClient::new(OpenAiConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".into(),
            model: "gpt-4o".into(),
            max_tokens: 16,
        })
        .unwrap();

        let err = client.complete(Vec::new()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::MissingApiKey));
    }
}
