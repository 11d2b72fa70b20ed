use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::one_to_one;

#[derive(Default, Clone)]
pub struct ServerState {
    one_to_one_connections: one_to_one::Connections,
    one_to_one_sessions: one_to_one::Sessions,
}

#[allow(clippy::unused_async)]
async fn health_handler() -> &'static str {
    "OK"
}

#[allow(clippy::unused_async)]
async fn one_to_one_handler(State(state): State<ServerState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| {
        one_to_one::user_connected(
            socket,
            state.one_to_one_connections,
            state.one_to_one_sessions,
        )
    })
}

/// `/health` answers `OK`, `/one-to-one` upgrades to the signaling WebSocket.
pub fn create(server_state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/one-to-one", get(one_to_one_handler))
        .with_state(server_state)
}
