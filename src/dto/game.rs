use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    common::{
        AnswerProgress, GuessProgress, GuessResultView, MatchStatsView, PlayerSummary,
        QuestionSnapshot, RankingEntryView,
    },
    phase::{VisiblePhase, VisibleStatus},
    validation::{validate_opaque_id, validate_option_value},
};

/// Payload used by the host to start a match in a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartMatchRequest {
    /// Requesting user; must be the room host.
    #[validate(custom(function = validate_opaque_id))]
    pub user_id: String,
}

/// Payload carrying a player's answer to the current question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Answering player.
    #[validate(custom(function = validate_opaque_id))]
    pub user_id: String,
    /// Chosen option; must be one of the current question's options.
    #[validate(custom(function = validate_option_value))]
    pub option: String,
}

/// Payload carrying a player's guess about another player's answer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitGuessRequest {
    /// Guessing player.
    #[validate(custom(function = validate_opaque_id))]
    pub user_id: String,
    /// Player whose answer is being guessed.
    #[validate(custom(function = validate_opaque_id))]
    pub target_user_id: String,
    /// Option the guesser believes the target chose.
    #[validate(custom(function = validate_option_value))]
    pub guess: String,
}

/// Optional viewer identity for state snapshots.
#[derive(Debug, Deserialize, IntoParams)]
pub struct StateQuery {
    /// When present, the snapshot includes this player's own submissions.
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

/// Summary returned once a match has been started.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartMatchResponse {
    /// Identifier of the created session.
    pub session_id: Uuid,
    /// Room the match runs in.
    pub room_id: String,
    /// Topic questions were drawn from.
    pub topic: String,
    /// Number of rounds to play.
    pub rounds: u32,
    /// Seated players.
    pub players: usize,
}

/// Summary returned when a round starts.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartRoundResponse {
    /// 1-based round number.
    pub round: u32,
    /// Total configured rounds.
    pub total_rounds: u32,
    /// Phase after the transition (always answering).
    pub phase: VisiblePhase,
    /// Question for this round.
    pub question: QuestionSnapshot,
}

/// Acknowledgement of an accepted answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    /// Collection progress after this answer.
    pub progress: AnswerProgress,
    /// Whether every player has now answered.
    pub all_answered: bool,
}

/// Summary returned when the answering phase closes.
#[derive(Debug, Serialize, ToSchema)]
pub struct CloseAnsweringResponse {
    /// Phase after the transition (always guessing).
    pub phase: VisiblePhase,
    /// Question of the round, re-sent for guess screens.
    pub question: QuestionSnapshot,
    /// Players that can be guessed about; no answers are revealed.
    pub players: Vec<PlayerSummary>,
}

/// Acknowledgement of an accepted guess.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitGuessResponse {
    /// Collection progress after this guess.
    pub progress: GuessProgress,
    /// Whether every player has now guessed.
    pub all_guessed: bool,
}

/// Round results returned when the guessing phase closes.
#[derive(Debug, Serialize, ToSchema)]
pub struct CloseGuessingResponse {
    /// 1-based round number that was scored.
    pub round: u32,
    /// Total configured rounds.
    pub total_rounds: u32,
    /// Per-guess results.
    pub results: Vec<GuessResultView>,
    /// Updated ranking.
    pub ranking: Vec<RankingEntryView>,
}

/// Final summary returned when the match finishes.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinishMatchResponse {
    /// Winner, if any player is ranked.
    pub winner: Option<RankingEntryView>,
    /// Final ranking.
    pub ranking: Vec<RankingEntryView>,
    /// Final statistics.
    pub stats: MatchStatsView,
}

/// Collection counters included in state snapshots.
#[derive(Debug, Serialize, ToSchema)]
pub struct StateProgress {
    /// Players seated in the match.
    pub players_total: usize,
    /// Answers collected this round.
    pub answers_received: usize,
    /// Guesses collected this round.
    pub guesses_received: usize,
}

/// A viewer's recorded guess, visible only to the viewer.
#[derive(Debug, Serialize, ToSchema)]
pub struct ViewerGuess {
    /// Player the guess was about.
    pub target_user_id: String,
    /// Guessed option.
    pub guess: String,
}

/// Viewer-scoped fields of a state snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct ViewerState {
    /// Viewer identity.
    pub user_id: String,
    /// Viewer's running score.
    pub score: i64,
    /// Whether the viewer answered this round.
    pub has_answered: bool,
    /// Whether the viewer guessed this round.
    pub has_guessed: bool,
    /// The viewer's own answer, if submitted.
    pub answer: Option<String>,
    /// The viewer's own guess, if submitted.
    pub guess: Option<ViewerGuess>,
}

/// Full snapshot of a session, optionally scoped to a viewer.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStateResponse {
    /// Session identifier.
    pub session_id: Uuid,
    /// Room the match runs in.
    pub room_id: String,
    /// Match-level status.
    pub status: VisibleStatus,
    /// Current phase.
    pub phase: VisiblePhase,
    /// Rounds started so far.
    pub current_round: u32,
    /// Total configured rounds.
    pub total_rounds: u32,
    /// Topic questions were drawn from.
    pub topic: String,
    /// Ranking after the last closed round.
    pub ranking: Vec<RankingEntryView>,
    /// Match start timestamp (RFC3339).
    pub started_at: String,
    /// Round start timestamp (RFC3339), if a round is in progress.
    pub round_started_at: Option<String>,
    /// Question of the round in progress, if any.
    pub question: Option<QuestionSnapshot>,
    /// Collection counters.
    pub progress: StateProgress,
    /// Viewer-scoped fields, present when a viewer id was supplied.
    pub viewer: Option<ViewerState>,
}

/// Ranking row with positional decoration.
#[derive(Debug, Serialize, ToSchema)]
pub struct RankedPlayerView {
    /// 1-based position.
    pub position: usize,
    /// Ranked player.
    pub player_id: String,
    /// Display name.
    pub name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Current score.
    pub score: i64,
    /// Whether this row leads the ranking.
    pub is_first: bool,
    /// Whether this row trails the ranking.
    pub is_last: bool,
}

/// Per-player guessing accuracy aggregated from the round history.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerAccuracyView {
    /// Player the row describes.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Current score.
    pub score: i64,
    /// Correct guesses across played rounds.
    pub hits: u32,
    /// Incorrect guesses across played rounds.
    pub misses: u32,
    /// Total configured rounds.
    pub total_rounds: u32,
    /// Hit percentage over the configured rounds, rounded.
    pub accuracy_pct: u32,
}

/// Statistics block of the detailed ranking.
#[derive(Debug, Serialize, ToSchema)]
pub struct RankingStatsView {
    /// Total configured rounds.
    pub total_rounds: u32,
    /// Rounds started so far.
    pub rounds_played: u32,
    /// Topic questions were drawn from.
    pub topic: String,
    /// Highest current score.
    pub max_score: i64,
    /// Lowest current score.
    pub min_score: i64,
    /// Match duration in milliseconds, once finished.
    pub duration_ms: Option<u64>,
}

/// Detailed ranking returned by the ranking endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct RankingResponse {
    /// Session identifier.
    pub session_id: Uuid,
    /// Room the match runs in.
    pub room_id: String,
    /// Display name of the room.
    pub room_name: String,
    /// Match-level status.
    pub status: VisibleStatus,
    /// Ranking with positional decoration.
    pub ranking: Vec<RankedPlayerView>,
    /// Per-player accuracy details.
    pub details: Vec<PlayerAccuracyView>,
    /// Statistics block.
    pub stats: RankingStatsView,
    /// Winner, if any player is ranked.
    pub winner: Option<RankingEntryView>,
}
