use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::{
    dto::sse::{DoneEvent, FragmentEvent, StreamErrorEvent},
    services::chat_service::RelayEvent,
};

/// Convert the relay receiver into an SSE response.
///
/// When the client disconnects axum drops this stream, which closes the channel and
/// lets the relay task notice.
pub fn to_sse_stream(
    receiver: mpsc::Receiver<RelayEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(receiver).map(|event| Ok::<_, Infallible>(to_event(event)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(event: RelayEvent) -> Event {
    match event {
        RelayEvent::Fragment(content) => json_event(&FragmentEvent { content }),
        RelayEvent::Done => json_event(&DoneEvent { done: true }),
        RelayEvent::Failed(error) => json_event(&StreamErrorEvent { error }),
    }
}

fn json_event<T: Serialize>(payload: &T) -> Event {
    Event::default().json_data(payload).unwrap_or_else(|err| {
        warn!(error = %err, "failed to encode SSE payload");
        Event::default().data(r#"{"error":"failed to encode event"}"#)
    })
}

