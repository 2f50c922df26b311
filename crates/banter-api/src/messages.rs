use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use banter_types::api::MessageResponse;
use banter_types::token::Claims;

use crate::AppState;
use crate::error::ApiError;

/// Initial history hydration: the full log, ascending, author username
/// joined in. Unbounded by design — single shared room, bounded volume.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    // Run the blocking DB query off the async runtime
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_all()).await??;

    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| MessageResponse {
            id: row.id,
            created_at: row.timestamp(),
            text: row.text,
            username: row.author_username,
        })
        .collect();

    Ok(Json(messages))
}
