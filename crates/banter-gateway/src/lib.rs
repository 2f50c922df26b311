pub mod connection;
pub mod hub;

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use banter_db::Database;
use banter_types::token::TokenKeys;

use hub::Hub;

#[derive(Clone)]
struct GatewayState {
    hub: Hub,
    db: Arc<Database>,
    tokens: TokenKeys,
}

/// The streaming surface: a single WebSocket upgrade route. Composed
/// next to the REST router by the server binary.
pub fn router(hub: Hub, db: Arc<Database>, tokens: TokenKeys) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(GatewayState { hub, db, tokens })
}

async fn ws_upgrade(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_socket(socket, state.hub, state.db, state.tokens)
    })
}
