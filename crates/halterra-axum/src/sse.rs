//! Server-Sent Events framing for generation sessions.

use std::time::Duration;

use axum::http::{HeaderName, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::{Stream, StreamExt};
use halterra_core::StreamEvent;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Frame session events as `data: <json>` SSE messages.
///
/// The body ends when `events` ends. Dropping the response (client
/// disconnect) drops `events` and with it the upstream stream.
pub fn session_response<S>(events: S) -> Response
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    let frames = events.map(|event| Event::default().json_data(&event));
    let sse = Sse::new(frames).keep_alive(KeepAlive::new().interval(KEEP_ALIVE));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn frames_each_event_as_json_data() {
        let events = stream::iter([
            StreamEvent::Chunk {
                content: "Breathe".into(),
            },
            StreamEvent::failed(),
        ]);
        let response = session_response(events);

        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(
            body,
            "data: {\"type\":\"chunk\",\"content\":\"Breathe\"}\n\n\
             data: {\"type\":\"error\",\"message\":\"Streaming failed\"}\n\n"
        );
    }
}
