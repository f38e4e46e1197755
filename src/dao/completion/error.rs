//! Error types raised while talking to the chat-completion provider.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`UpstreamError`] failures.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Failures that can occur while requesting or streaming a completion.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Neither `OPENAI_API_KEY` nor `AI_INTEGRATIONS_OPENAI_API_KEY` is set.
    #[error("no API key configured for the completion provider")]
    MissingApiKey,
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build completion HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or the connection dropped before headers arrived.
    #[error("failed to send completion request")]
    RequestSend {
        #[source]
        source: reqwest::Error,
    },
    /// The provider answered with a non-success status.
    #[error("completion provider returned status {status}: {body}")]
    RequestStatus { status: StatusCode, body: String },
    /// Reading the response body failed part way through.
    #[error("completion stream interrupted")]
    Stream {
        #[source]
        source: reqwest::Error,
    },
    /// A payload could not be decoded as the expected JSON shape.
    #[error("failed to decode completion payload")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
    /// The provider reported an error inside an otherwise successful response.
    #[error("completion provider error: {message}")]
    Provider { message: String },
}
