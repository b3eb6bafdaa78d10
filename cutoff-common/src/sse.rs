//! Server-Sent Events (SSE) utilities

use crate::events::ProgressEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, warn};

/// Keep-alive interval for all SSE streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Standard keep-alive: a `heartbeat` comment every 15 seconds
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")
}

/// Serialize one progress event as an SSE `data:` frame
pub fn progress_frame(event: &ProgressEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize progress event: {}", e);
            None
        }
    }
}

/// Turn a finite progress stream into an SSE response
///
/// Every event becomes a JSON `data:` frame. Once the source ends (after its
/// terminal event) the response stays open for `close_delay` so the last
/// frame reaches the client, then closes. Dropping the response (client
/// disconnect) drops the source stream with it.
pub fn create_progress_sse_stream<S>(
    events: S,
    close_delay: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = ProgressEvent> + Send + 'static,
{
    let stream = async_stream::stream! {
        let events = events.filter_map(|event| async move { progress_frame(&event) });
        futures::pin_mut!(events);

        while let Some(frame) = events.next().await {
            yield Ok(frame);
        }

        debug!("SSE: Progress stream reached terminal event, closing in {:?}", close_delay);
        tokio::time::sleep(close_delay).await;
    };

    Sse::new(stream).keep_alive(keep_alive())
}
