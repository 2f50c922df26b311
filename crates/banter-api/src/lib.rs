pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use banter_db::Database;
use banter_types::token::TokenKeys;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub tokens: TokenKeys,
}

/// The REST surface: public credential endpoints plus the token-gated
/// history endpoint. The gateway's WebSocket route is composed next to
/// this by the server binary.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/messages", get(messages::get_messages))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    public.merge(protected)
}
