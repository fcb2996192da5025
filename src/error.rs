//! Error taxonomy: game-rule violations, service failures, and their HTTP
//! projections.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{models::SessionPhase, storage::StorageError},
    state::machine::InvalidTransition,
};

/// Game-rule violations surfaced to clients with a stable machine-readable
/// code, so they can resynchronize via the state endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameRuleError {
    /// Only the room host may start a match.
    #[error("only the host can start the match")]
    NotHost,
    /// The room is not waiting for a match to start.
    #[error("room is not waiting for a match (status: {status})")]
    NotWaitingState {
        /// Current room status.
        status: String,
    },
    /// Too few players to start.
    #[error("at least {min} players are required, the room has {actual}")]
    InsufficientPlayers {
        /// Configured minimum.
        min: usize,
        /// Seated players.
        actual: usize,
    },
    /// The topic's active pool is smaller than the configured round count.
    #[error("topic `{topic}` has {available} active question(s), {required} required")]
    InsufficientQuestions {
        /// Requested topic.
        topic: String,
        /// Pool size.
        available: usize,
        /// Rounds requested.
        required: usize,
    },
    /// The operation is not allowed in the session's current phase.
    #[error("operation not allowed in phase `{phase}`")]
    InvalidPhase {
        /// Phase the session is currently in.
        phase: SessionPhase,
    },
    /// Every configured round has already been played.
    #[error("all {total} round(s) have been played; finish the match")]
    AllRoundsPlayed {
        /// Configured round count.
        total: u32,
    },
    /// The player already answered this round.
    #[error("player `{player_id}` already answered this round")]
    AlreadyAnswered {
        /// Offending player.
        player_id: String,
    },
    /// The player already guessed this round.
    #[error("player `{player_id}` already guessed this round")]
    AlreadyGuessed {
        /// Offending player.
        player_id: String,
    },
    /// The submitted option is not one of the current question's options.
    #[error("`{option}` is not an option of the current question")]
    InvalidOption {
        /// Rejected option value.
        option: String,
    },
    /// Players cannot guess their own answer.
    #[error("players cannot guess their own answer")]
    SelfGuess,
    /// The guess target has no recorded answer.
    #[error("target `{target_id}` has not answered yet")]
    TargetNotAnswered {
        /// Targeted player.
        target_id: String,
    },
    /// A phase close was requested before every player submitted.
    #[error("{remaining} player(s) still pending")]
    IncompletePhase {
        /// How many submissions are still missing.
        remaining: usize,
    },
    /// The match cannot finish while rounds remain.
    #[error("{remaining} round(s) still to play")]
    RoundsRemaining {
        /// Unplayed rounds.
        remaining: u32,
    },
    /// The last round must be closed before finishing.
    #[error("close the last round before finishing the match")]
    LastRoundNotClosed,
    /// The user is not part of this match.
    #[error("player `{player_id}` is not part of this match")]
    NotAPlayer {
        /// Unknown player.
        player_id: String,
    },
    /// The session already finished; it accepts no further mutation.
    #[error("session is already finished")]
    SessionFinished,
}

impl GameRuleError {
    /// Stable code included in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            GameRuleError::NotHost => "NOT_HOST",
            GameRuleError::NotWaitingState { .. } => "NOT_WAITING_STATE",
            GameRuleError::InsufficientPlayers { .. } => "INSUFFICIENT_PLAYERS",
            GameRuleError::InsufficientQuestions { .. } => "INSUFFICIENT_QUESTIONS",
            GameRuleError::InvalidPhase { .. } => "INVALID_PHASE",
            GameRuleError::AllRoundsPlayed { .. } => "ALL_ROUNDS_PLAYED",
            GameRuleError::AlreadyAnswered { .. } => "ALREADY_ANSWERED",
            GameRuleError::AlreadyGuessed { .. } => "ALREADY_GUESSED",
            GameRuleError::InvalidOption { .. } => "INVALID_OPTION",
            GameRuleError::SelfGuess => "SELF_GUESS",
            GameRuleError::TargetNotAnswered { .. } => "TARGET_NOT_ANSWERED",
            GameRuleError::IncompletePhase { .. } => "INCOMPLETE_PHASE",
            GameRuleError::RoundsRemaining { .. } => "ROUNDS_REMAINING",
            GameRuleError::LastRoundNotClosed => "LAST_ROUND_NOT_CLOSED",
            GameRuleError::NotAPlayer { .. } => "NOT_A_PLAYER",
            GameRuleError::SessionFinished => "SESSION_FINISHED",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            GameRuleError::NotHost | GameRuleError::NotAPlayer { .. } => StatusCode::FORBIDDEN,
            GameRuleError::InvalidOption { .. } | GameRuleError::SelfGuess => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::CONFLICT,
        }
    }
}

impl From<InvalidTransition> for GameRuleError {
    fn from(err: InvalidTransition) -> Self {
        GameRuleError::InvalidPhase { phase: err.from }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// A game rule rejected the request.
    #[error(transparent)]
    Rule(#[from] GameRuleError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// An invariant the storage layer guarantees was observed broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Game rule violation; status and code derive from the rule.
    #[error(transparent)]
    Rule(GameRuleError),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Rule(rule) => AppError::Rule(rule),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Rule(rule) => (rule.status(), rule.code()),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let payload = Json(ErrorBody {
            code,
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_errors_carry_stable_codes() {
        assert_eq!(GameRuleError::NotHost.code(), "NOT_HOST");
        assert_eq!(
            GameRuleError::IncompletePhase { remaining: 2 }.code(),
            "INCOMPLETE_PHASE"
        );
        assert_eq!(GameRuleError::NotHost.status(), StatusCode::FORBIDDEN);
        assert_eq!(GameRuleError::SelfGuess.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GameRuleError::AlreadyAnswered {
                player_id: "alice".into()
            }
            .status(),
            StatusCode::CONFLICT
        );
    }
}
