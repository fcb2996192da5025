use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    common::{AnswerProgress, GuessProgress, GuessResultView, MatchStatsView, RankingEntryView},
    phase::VisiblePhase,
};

/// Wrapper stamped onto every push before it leaves the registry.
#[derive(Debug, Serialize)]
pub struct PushEnvelope<'a, T: Serialize> {
    /// Event name (`round_started`, `player_answered`, ...).
    pub event: &'a str,
    /// RFC3339 timestamp assigned at fan-out time.
    pub timestamp: String,
    /// Event payload.
    pub data: &'a T,
}

/// Identity supplied as query parameters of the WebSocket upgrade request.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ConnectQuery {
    /// Room the connection subscribes to.
    #[serde(rename = "roomId")]
    pub room_id: String,
    /// User behind the connection.
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Messages accepted from game WebSocket clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness probe; answered with a `pong` push.
    Ping,
    /// Anything else; ignored.
    #[serde(other)]
    Unknown,
}

/// Acknowledgement sent to a freshly registered connection.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectedAck {
    /// Identifier assigned to the connection.
    pub connection_id: Uuid,
    /// Room the connection is scoped to.
    pub room_id: String,
    /// User behind the connection.
    pub user_id: String,
}

/// Broadcast when a new round starts.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundStartedEvent {
    /// 1-based round number.
    pub round: u32,
    /// Total configured rounds.
    pub total_rounds: u32,
    /// Question text shown to players.
    pub question_text: String,
    /// Options to pick from.
    pub options: Vec<String>,
    /// Question category.
    pub category: String,
}

/// Broadcast after each accepted answer; progress only, no content.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerAnsweredEvent {
    /// Player whose answer was accepted.
    pub user_id: String,
    /// Collection progress.
    pub progress: AnswerProgress,
    /// Whether every player has now answered.
    pub all_answered: bool,
}

/// Broadcast whenever the session phase changes outside round boundaries.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseChangedEvent {
    /// Phase the session moved into.
    pub phase: VisiblePhase,
    /// Round the change applies to (0 before the first round).
    pub round: u32,
}

/// Broadcast after each accepted guess; progress only, no content.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerGuessedEvent {
    /// Player whose guess was accepted.
    pub user_id: String,
    /// Collection progress.
    pub progress: GuessProgress,
    /// Whether every player has now guessed.
    pub all_guessed: bool,
}

/// Broadcast when a round is scored.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundEndedEvent {
    /// 1-based round number.
    pub round: u32,
    /// Per-guess results.
    pub results: Vec<GuessResultView>,
    /// Updated ranking.
    pub ranking: Vec<RankingEntryView>,
}

/// Broadcast when the match finishes.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameEndedEvent {
    /// Winner, if any player scored.
    pub winner: Option<RankingEntryView>,
    /// Final ranking.
    pub ranking: Vec<RankingEntryView>,
    /// Final statistics.
    pub stats: MatchStatsView,
}

/// Private confirmation pushed to a player whose submission was accepted.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionAck {
    /// Round the submission belongs to.
    pub round: u32,
    /// What was recorded (`answer` or `guess`).
    pub kind: String,
}
