use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use domain::NodeId;
use futures::stream::Stream;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::state::AppState;

pub async fn sse_handler(
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.engine.subscribe();
    tracing::info!("SSE Connected: node={}", node_id);

    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.node_id() == node_id => Some(
            Event::default()
                .event(event.name())
                .json_data(&event)
                .map_err(|e| {
                    tracing::error!("SSE serialization error: {}", e);
                    axum::Error::new(e)
                }),
        ),
        Ok(_) => None,
        Err(lagged) => {
            tracing::warn!("SSE client on node {} lagged: {}", node_id, lagged);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(15)))
}
