use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        CloseAnsweringResponse, CloseGuessingResponse, FinishMatchResponse, RankingResponse,
        SessionStateResponse, StartMatchRequest, StartMatchResponse, StartRoundResponse,
        StateQuery, SubmitAnswerRequest, SubmitAnswerResponse, SubmitGuessRequest,
        SubmitGuessResponse,
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes implementing the game action surface.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room_id}/game", post(start_match))
        .route("/game/{session_id}/round", post(start_round))
        .route("/game/{session_id}/answer", post(submit_answer))
        .route("/game/{session_id}/answering/close", post(close_answering))
        .route("/game/{session_id}/guess", post(submit_guess))
        .route("/game/{session_id}/guessing/close", post(close_guessing))
        .route("/game/{session_id}/finish", post(finish_match))
        .route("/game/{session_id}", get(get_state))
        .route("/game/{session_id}/ranking", get(get_ranking))
}

/// Start a match in a room; restricted to the room host.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/game",
    tag = "game",
    params(("room_id" = String, Path, description = "Room to start the match in")),
    request_body = StartMatchRequest,
    responses(
        (status = 200, description = "Match started", body = StartMatchResponse),
        (status = 403, description = "Requester is not the host"),
        (status = 409, description = "Room not waiting, too few players, or pool too small"),
    )
)]
pub async fn start_match(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<StartMatchRequest>>,
) -> Result<Json<StartMatchResponse>, AppError> {
    let response = session_service::start_match(&state, room_id, payload).await?;
    Ok(Json(response))
}

/// Advance the session into the next round.
#[utoipa::path(
    post,
    path = "/game/{session_id}/round",
    tag = "game",
    params(("session_id" = Uuid, Path, description = "Session to advance")),
    responses(
        (status = 200, description = "Round started", body = StartRoundResponse),
        (status = 409, description = "A round is in progress or all rounds were played"),
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<StartRoundResponse>, AppError> {
    let response = session_service::start_round(&state, session_id).await?;
    Ok(Json(response))
}

/// Record a player's answer to the current question.
#[utoipa::path(
    post,
    path = "/game/{session_id}/answer",
    tag = "game",
    params(("session_id" = Uuid, Path, description = "Session the answer belongs to")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = SubmitAnswerResponse),
        (status = 400, description = "Option is not part of the current question"),
        (status = 409, description = "Wrong phase or already answered"),
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    let response = session_service::submit_answer(&state, session_id, payload).await?;
    Ok(Json(response))
}

/// Close the answering phase once every player answered.
#[utoipa::path(
    post,
    path = "/game/{session_id}/answering/close",
    tag = "game",
    params(("session_id" = Uuid, Path, description = "Session to transition")),
    responses(
        (status = 200, description = "Guessing phase opened", body = CloseAnsweringResponse),
        (status = 409, description = "Wrong phase or players still pending"),
    )
)]
pub async fn close_answering(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CloseAnsweringResponse>, AppError> {
    let response = session_service::close_answering(&state, session_id).await?;
    Ok(Json(response))
}

/// Record a player's guess about another player's answer.
#[utoipa::path(
    post,
    path = "/game/{session_id}/guess",
    tag = "game",
    params(("session_id" = Uuid, Path, description = "Session the guess belongs to")),
    request_body = SubmitGuessRequest,
    responses(
        (status = 200, description = "Guess recorded", body = SubmitGuessResponse),
        (status = 400, description = "Self guess or invalid option"),
        (status = 409, description = "Wrong phase, already guessed, or target has not answered"),
    )
)]
pub async fn submit_guess(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitGuessRequest>>,
) -> Result<Json<SubmitGuessResponse>, AppError> {
    let response = session_service::submit_guess(&state, session_id, payload).await?;
    Ok(Json(response))
}

/// Close the guessing phase, score the round, and publish the ranking.
#[utoipa::path(
    post,
    path = "/game/{session_id}/guessing/close",
    tag = "game",
    params(("session_id" = Uuid, Path, description = "Session to score")),
    responses(
        (status = 200, description = "Round scored", body = CloseGuessingResponse),
        (status = 409, description = "Wrong phase or players still pending"),
    )
)]
pub async fn close_guessing(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CloseGuessingResponse>, AppError> {
    let response = session_service::close_guessing(&state, session_id).await?;
    Ok(Json(response))
}

/// Finish the match after the last round closed.
#[utoipa::path(
    post,
    path = "/game/{session_id}/finish",
    tag = "game",
    params(("session_id" = Uuid, Path, description = "Session to finish")),
    responses(
        (status = 200, description = "Match finished", body = FinishMatchResponse),
        (status = 409, description = "Rounds remaining or last round not closed"),
    )
)]
pub async fn finish_match(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<FinishMatchResponse>, AppError> {
    let response = session_service::finish_match(&state, session_id).await?;
    Ok(Json(response))
}

/// Read-only session snapshot, optionally scoped to a viewer.
#[utoipa::path(
    get,
    path = "/game/{session_id}",
    tag = "game",
    params(
        ("session_id" = Uuid, Path, description = "Session to inspect"),
        StateQuery,
    ),
    responses(
        (status = 200, description = "Session snapshot", body = SessionStateResponse),
        (status = 404, description = "Unknown session"),
    )
)]
pub async fn get_state(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<StateQuery>,
) -> Result<Json<SessionStateResponse>, AppError> {
    let response = session_service::get_state(&state, session_id, query.user_id).await?;
    Ok(Json(response))
}

/// Detailed ranking with per-player accuracy.
#[utoipa::path(
    get,
    path = "/game/{session_id}/ranking",
    tag = "game",
    params(("session_id" = Uuid, Path, description = "Session to rank")),
    responses(
        (status = 200, description = "Detailed ranking", body = RankingResponse),
        (status = 404, description = "Unknown session"),
    )
)]
pub async fn get_ranking(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<RankingResponse>, AppError> {
    let response = session_service::get_ranking(&state, session_id).await?;
    Ok(Json(response))
}
