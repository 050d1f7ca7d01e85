//! Action submission endpoint. The body carries intent only; price and tick
//! index in the response are server-assigned.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::identity::CallerId;
use crate::api::AppState;
use crate::domain::{ActionRecord, ActionType, BattleId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub quantity: Option<f64>,
}

pub async fn submit_action(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<String>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionRecord>, AppError> {
    let record = state
        .engine
        .submit_action(
            &BattleId::new(id),
            &caller.0,
            request.action_type,
            request.quantity.unwrap_or(0.0),
        )
        .await?;
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request: ActionRequest =
            serde_json::from_str(r#"{"type": "BUY", "quantity": 2.5}"#).unwrap();
        assert_eq!(request.action_type, ActionType::Buy);
        assert_eq!(request.quantity, Some(2.5));

        let close: ActionRequest = serde_json::from_str(r#"{"type": "CLOSE"}"#).unwrap();
        assert_eq!(close.action_type, ActionType::Close);
        assert_eq!(close.quantity, None);
    }
}
