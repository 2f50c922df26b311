use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::ApiError;

/// Request gate: extract and verify the bearer token before any handler
/// logic runs, then attach the claim as a request extension. The same
/// `TokenKeys` primitive gates the WebSocket handshake, so both
/// surfaces share one trust decision.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.tokens.verify(token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
