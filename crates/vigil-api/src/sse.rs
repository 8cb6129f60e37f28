//! Translates the workflow event bus into the ordered SSE stream of spec
//! §6.2/§4.9. Grounded in the teacher's `dashflow-langserve::handler::
//! stream_handler`: an `async_stream::stream!` pulling from an async
//! source, yielding `Event::default().event(name).json_data(value)`, wrapped
//! in `Sse::new(..).keep_alive(..)`.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::broadcast;
use tracing::warn;
use vigil_core::events::WorkflowEvent;

/// Builds the SSE response for one session's run. `receiver` must have been
/// subscribed to the session's [`vigil_core::workflow::EventBus`] before the
/// run was spawned, so no event is missed between subscription and the
/// `start` event (spec §4.9's ordering guarantee).
pub fn event_stream(
    mut receiver: broadcast::Receiver<WorkflowEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let terminal = matches!(event, WorkflowEvent::Complete { .. } | WorkflowEvent::Failed { .. });
                    if let Some(sse_event) = to_sse_event(&event) {
                        yield Ok(sse_event);
                    }
                    if terminal {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE subscriber lagged behind the workflow event bus");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Maps one [`WorkflowEvent`] onto the minimal payload shapes spec §6.2
/// names. Every variant has a direct counterpart except `Orchestrator`,
/// which is renamed `orchestrator` on the wire per that section.
fn to_sse_event(event: &WorkflowEvent) -> Option<Event> {
    let (name, payload) = match event {
        WorkflowEvent::Start { session_id, client_name, inn } => (
            "start",
            json!({ "session_id": session_id, "client_name": client_name, "inn": inn }),
        ),
        WorkflowEvent::Progress { percent, stage, .. } => ("progress", json!({ "percent": percent, "stage": stage })),
        WorkflowEvent::Orchestrator { plan, .. } => ("orchestrator", json!({ "plan": plan })),
        WorkflowEvent::SourceResult { result, .. } => (
            "source_result",
            json!({ "source": result.source, "status": result.status, "duration_ms": result.duration_ms }),
        ),
        WorkflowEvent::Report { report, .. } => ("report", json!({ "report": report })),
        WorkflowEvent::AwaitingFeedback { report_id, .. } => ("awaiting_feedback", json!({ "report_id": report_id })),
        WorkflowEvent::Result { report, saved_files, .. } => {
            ("result", json!({ "report": report, "saved_files": saved_files }))
        }
        WorkflowEvent::Complete { session_id } => ("complete", json!({ "session_id": session_id })),
        WorkflowEvent::Failed { error, .. } => ("error", json!({ "kind": error.kind, "message": error.message })),
    };

    Event::default().event(name).json_data(payload).ok()
}
