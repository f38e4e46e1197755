//! `data:` payloads of the chat event stream.

use serde::Serialize;
use utoipa::ToSchema;

/// `data:` payload carrying one model fragment.
#[derive(Debug, Serialize, ToSchema)]
pub struct FragmentEvent {
    pub content: String,
}

/// `data:` payload closing a successful stream.
#[derive(Debug, Serialize, ToSchema)]
pub struct DoneEvent {
    pub done: bool,
}

/// `data:` payload closing a stream that failed after it started.
#[derive(Debug, Serialize, ToSchema)]
pub struct StreamErrorEvent {
    pub error: String,
}
