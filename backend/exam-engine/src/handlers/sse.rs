use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{timer::TimerEvent, SubmissionState},
    services::AppState,
};

use super::exam_sessions::error_response;

/// SSE endpoint relaying deadline ticks
/// GET /api/v1/exam-sessions/{id}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.session(&session_id).map_err(error_response)?;
    // Subscribe before checking the state so a submit landing in between
    // still reaches this receiver as its final event.
    let receiver = session.subscribe_timer();

    if session.submission_state() != SubmissionState::InProgress {
        return Err((
            StatusCode::CONFLICT,
            "Session is no longer in progress".to_string(),
        ));
    }

    tracing::info!("Client connected to timer stream: session={}", session_id);
    let stream = timer_stream(session_id, receiver);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Ends after the first final event (expired or stopped) or when the session
/// is dropped.
fn timer_stream(
    session_id: String,
    receiver: broadcast::Receiver<TimerEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    SSE_CONNECTIONS_ACTIVE.inc();
    let guard = ConnectionGuard;

    stream::unfold(
        (receiver, false, session_id, guard),
        |(mut receiver, finished, sid, guard)| async move {
            if finished {
                return None;
            }

            loop {
                match receiver.recv().await {
                    Ok(timer_event) => {
                        let event = Event::default()
                            .event(timer_event.event_name())
                            .data(timer_event.to_sse_data());
                        let finished = timer_event.is_final();
                        if finished {
                            tracing::info!(
                                "Timer stream finished: session={} event={}",
                                sid,
                                timer_event.event_name()
                            );
                        }
                        return Some((Ok(event), (receiver, finished, sid, guard)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Timer stream lagged: session={} skipped={}", sid, skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        },
    )
}

struct ConnectionGuard;

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}
