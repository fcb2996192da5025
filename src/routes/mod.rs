use axum::Router;

use crate::state::SharedState;

/// Swagger documentation routes.
pub mod docs;
/// Game action routes.
pub mod game;
/// Health check routes.
pub mod health;
/// WebSocket upgrade route.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(game::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
