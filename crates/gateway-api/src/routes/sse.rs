//! `GET /sse/events` (spec §6, §4.1 / C1): extra query params beyond
//! `event_types` are metadata filters: repeated values OR within a key,
//! distinct keys AND across keys.

use std::collections::{HashMap, HashSet};

use axum::extract::{OriginalUri, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream, StreamExt};
use tokio_stream::wrappers::UnboundedReceiverStream;

use gateway_shared::event::{Event, EventFilter};

use crate::auth::AuthenticatedUser;
use crate::state::AppState;

async fn open_events(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    uri: OriginalUri,
) -> Sse<impl Stream<Item = Result<SseEvent, axum::Error>>> {
    let filter = parse_filter(uri.query().unwrap_or(""));
    let rx = state.orchestration.events.subscribe(auth.user_id, filter);

    let established = stream::once(async { Ok(frame("connection.established", serde_json::json!({}))) });
    let events = UnboundedReceiverStream::new(rx).map(|event| Ok(event_frame(&event)));

    Sse::new(established.chain(events)).keep_alive(KeepAlive::default())
}

fn parse_filter(query: &str) -> EventFilter {
    let mut event_types: HashSet<String> = HashSet::new();
    let mut metadata_filters: HashMap<String, HashSet<String>> = HashMap::new();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key == "event_types" {
            event_types.insert(value.into_owned());
        } else {
            metadata_filters.entry(key.into_owned()).or_default().insert(value.into_owned());
        }
    }

    EventFilter { event_types: (!event_types.is_empty()).then_some(event_types), metadata_filters }
}

fn event_frame(event: &Event) -> SseEvent {
    SseEvent::default().data(event_frame_body(event).to_string()).id(event.event_id.to_string())
}

fn event_frame_body(event: &Event) -> serde_json::Value {
    serde_json::json!({
        "type": event.event_type,
        "content": event.content,
        "metadata": event.metadata,
        "event_id": event.event_id,
    })
}

fn frame(event_type: &str, content: serde_json::Value) -> SseEvent {
    let body = serde_json::json!({
        "type": event_type,
        "content": content,
        "metadata": {},
        "event_id": uuid::Uuid::new_v4(),
    });
    SseEvent::default().data(body.to_string())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/sse/events", get(open_events))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_imposes_no_filter() {
        let filter = parse_filter("");
        assert!(filter.event_types.is_none());
        assert!(filter.metadata_filters.is_empty());
    }

    #[test]
    fn event_types_key_collects_into_a_set() {
        let filter = parse_filter("event_types=task.created&event_types=task.completed");
        let types = filter.event_types.unwrap();
        assert_eq!(types.len(), 2);
        assert!(types.contains("task.created"));
        assert!(types.contains("task.completed"));
    }

    #[test]
    fn other_keys_become_metadata_filters() {
        let filter = parse_filter("task_id=abc&task_id=def&thread_id=xyz");
        assert_eq!(filter.metadata_filters.len(), 2);
        assert_eq!(filter.metadata_filters["task_id"].len(), 2);
        assert_eq!(filter.metadata_filters["thread_id"].len(), 1);
    }

    #[test]
    fn event_frame_lifts_event_fields_to_the_top_level() {
        let event = Event::new("task.created", serde_json::json!({"id": "1"})).with_metadata("task_id", "1");
        let body = event_frame_body(&event);
        assert_eq!(body["type"], "task.created");
        assert_eq!(body["content"]["id"], "1");
        assert_eq!(body["metadata"]["task_id"], "1");
        assert_eq!(body["event_id"], serde_json::json!(event.event_id));
    }
}
