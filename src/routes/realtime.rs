use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{extract::State, Router};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::response::AppError;
use crate::state::AppState;

/// Releases an SSE connection slot when the stream is dropped.
struct SseGuard(Arc<AtomicUsize>);

impl Drop for SseGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(sse_handler))
}

/// Streams every command the remote control emits, one SSE event per command
/// with the command kind as the event name.
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let max_sse = state.config().limits.max_sse_connections;
    let counter = state.sse_connections();
    let current = counter.fetch_add(1, Ordering::SeqCst);
    if current >= max_sse {
        counter.fetch_sub(1, Ordering::SeqCst);
        return Err(AppError::too_many_requests("Too many SSE connections"));
    }
    let guard = SseGuard(counter);

    let mut shutdown_rx = state.shutdown_rx();
    let mut events = state.subscribe_events();

    let stream = async_stream::stream! {
        let _guard = guard;
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(command) => {
                        match serde_json::to_string(&command) {
                            Ok(json) => yield Ok(Event::default().event(command.kind()).data(json)),
                            Err(e) => tracing::error!(error = %e, "Failed to serialize command"),
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "SSE subscriber lagged, commands dropped");
                        let notice = serde_json::json!({ "skipped": skipped }).to_string();
                        yield Ok(Event::default().event("lagged").data(notice));
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
