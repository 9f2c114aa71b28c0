//! Drowsiness Status Routes

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::SharedState;

/// Response for the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrowsyStatusResponse {
    pub is_drowsy: bool,
}

/// Get the latest published drowsiness flag
pub async fn get_drowsy_status(State(state): State<SharedState>) -> Json<DrowsyStatusResponse> {
    Json(DrowsyStatusResponse {
        is_drowsy: state.status.read().is_drowsy,
    })
}
