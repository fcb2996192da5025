use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    dto::{validation::validate_opaque_id, ws::ConnectQuery},
    error::AppError,
    services::websocket_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "ws",
    params(ConnectQuery),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Missing or malformed identity parameters"),
    )
)]
/// Upgrade the HTTP connection into a game WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    validate_opaque_id(&query.room_id)
        .map_err(|err| AppError::BadRequest(format!("roomId: {err}")))?;
    validate_opaque_id(&query.user_id)
        .map_err(|err| AppError::BadRequest(format!("userId: {err}")))?;

    let shared_state = state.clone();
    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(shared_state, socket, query.room_id, query.user_id)
    }))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
