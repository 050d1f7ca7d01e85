//! Live battle streaming and reconnection.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::api::AppState;
use crate::domain::BattleId;
use crate::engine::ReconnectionState;

/// Catch-up snapshot. Null when there is neither a live session nor a cached
/// fallback, which means the match is over.
pub async fn reconnect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Option<ReconnectionState>> {
    Json(state.engine.reconnection_state(&BattleId::new(id)))
}

/// Server-sent event stream of a battle's broadcasts. The stream ends when
/// the battle's channel closes after settlement.
pub async fn stream_battle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let battle_id = BattleId::new(id);
    let rx = state.bus.subscribe(&battle_id);

    let events = stream::unfold((rx, battle_id), |(mut rx, battle_id)| async move {
        loop {
            match rx.recv().await {
                Ok(message) => match Event::default().json_data(&message) {
                    Ok(event) => return Some((Ok::<_, Infallible>(event), (rx, battle_id))),
                    Err(e) => {
                        warn!(battle_id = %battle_id, error = %e, "Failed to encode stream event");
                        continue;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(battle_id = %battle_id, skipped, "Stream subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
