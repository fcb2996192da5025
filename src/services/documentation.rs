use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Second Guess Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::game::start_match,
        crate::routes::game::start_round,
        crate::routes::game::submit_answer,
        crate::routes::game::close_answering,
        crate::routes::game::submit_guess,
        crate::routes::game::close_guessing,
        crate::routes::game::finish_match,
        crate::routes::game::get_state,
        crate::routes::game::get_ranking,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::StartMatchRequest,
            crate::dto::game::StartMatchResponse,
            crate::dto::game::StartRoundResponse,
            crate::dto::game::SubmitAnswerRequest,
            crate::dto::game::SubmitAnswerResponse,
            crate::dto::game::CloseAnsweringResponse,
            crate::dto::game::SubmitGuessRequest,
            crate::dto::game::SubmitGuessResponse,
            crate::dto::game::CloseGuessingResponse,
            crate::dto::game::FinishMatchResponse,
            crate::dto::game::SessionStateResponse,
            crate::dto::game::RankingResponse,
            crate::dto::phase::VisiblePhase,
            crate::dto::phase::VisibleStatus,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ConnectedAck,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Round state machine and scoring operations"),
        (name = "ws", description = "WebSocket fan-out for game clients"),
    )
)]
pub struct ApiDoc;
