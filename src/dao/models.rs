use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a player, assigned by the account collaborator.
pub type PlayerId = String;
/// Opaque identifier of a room, assigned by the room collaborator.
pub type RoomId = String;
/// Opaque identifier of a question in the catalog.
pub type QuestionId = String;
/// One of the four option strings of a question.
pub type ChosenOption = String;

/// Sub-state of a match as seen by the round state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Match created, no round started yet.
    Initialized,
    /// Players are submitting answers to the current question.
    Answering,
    /// Players are guessing which option another player chose.
    Guessing,
    /// The current round has been scored; the next round can start.
    RoundClosed,
    /// The match is over; terminal, no further mutation allowed.
    Finished,
}

impl SessionPhase {
    /// Storage representation of the phase, usable in store-level filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Initialized => "initialized",
            SessionPhase::Answering => "answering",
            SessionPhase::Guessing => "guessing",
            SessionPhase::RoundClosed => "round_closed",
            SessionPhase::Finished => "finished",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match-level lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The match is in progress.
    Active,
    /// The match ended; the session is kept until its TTL elapses.
    Finished,
}

/// A guess recorded during the guessing phase, keyed by the guesser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessEntity {
    /// Player whose answer is being guessed.
    pub target: PlayerId,
    /// Option the guesser believes the target chose.
    pub guess: ChosenOption,
}

/// Outcome of a single guess, produced by the scoring pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessResultEntity {
    /// Player who made the guess.
    pub guesser_id: PlayerId,
    /// Player the guess was about.
    pub target_id: PlayerId,
    /// Guessed option.
    pub guess: ChosenOption,
    /// Option the target actually chose.
    pub actual_answer: ChosenOption,
    /// Whether the guess matched the actual answer.
    pub correct: bool,
    /// Points credited to the guesser (0 when incorrect).
    pub points_awarded: i64,
}

/// Full snapshot of one scored round, appended to the session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecordEntity {
    /// 1-based round number.
    pub round: u32,
    /// Question played during this round.
    pub question_id: QuestionId,
    /// Answers collected during the round.
    pub answers: IndexMap<PlayerId, ChosenOption>,
    /// Guesses collected during the round.
    pub guesses: IndexMap<PlayerId, GuessEntity>,
    /// Per-guess scoring results.
    pub results: Vec<GuessResultEntity>,
    /// When the round was closed.
    pub recorded_at: SystemTime,
}

/// Ranking entry carrying the display metadata snapshotted from the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntryEntity {
    /// Ranked player.
    pub player_id: PlayerId,
    /// Display name at session creation time.
    pub name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Score after the most recent round close.
    pub score: i64,
}

/// Aggregate statistics computed when a match finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatsEntity {
    /// Number of rounds the match was configured with.
    pub total_rounds: u32,
    /// Wall-clock duration of the match in milliseconds.
    pub duration_ms: u64,
    /// Number of participating players.
    pub players: usize,
    /// Highest final score.
    pub max_score: i64,
    /// Lowest final score.
    pub min_score: i64,
    /// Mean final score across players.
    pub mean_score: f64,
}

/// One match document, the only mutable record shared across invocations.
///
/// Mutations go through the conditional-write primitives of
/// [`crate::dao::session_store::SessionStore`]; the entity itself is plain
/// data and carries no behaviour beyond a few read helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub session_id: Uuid,
    /// Room this match belongs to.
    pub room_id: RoomId,
    /// Topic the questions were drawn from.
    pub topic: String,
    /// Ordered question sequence, fixed at creation.
    pub question_ids: Vec<QuestionId>,
    /// Number of rounds started so far (never exceeds `question_ids.len()`).
    pub current_round: u32,
    /// Question of the round in progress, if any.
    pub current_question_id: Option<QuestionId>,
    /// Current phase of the round state machine.
    pub phase: SessionPhase,
    /// Answers of the round in progress, keyed by player (cleared per round).
    pub answers: IndexMap<PlayerId, ChosenOption>,
    /// Guesses of the round in progress, keyed by guesser (cleared per round).
    pub guesses: IndexMap<PlayerId, GuessEntity>,
    /// Running scores; key order fixed at creation, values never decrease.
    pub scores: IndexMap<PlayerId, i64>,
    /// Ranking recomputed at each round close, sorted by score descending.
    pub ranking: Vec<RankingEntryEntity>,
    /// Append-only history of scored rounds.
    pub round_history: Vec<RoundRecordEntity>,
    /// Match-level status.
    pub status: SessionStatus,
    /// When the match started.
    pub started_at: SystemTime,
    /// When the round in progress started, if any.
    pub round_started_at: Option<SystemTime>,
    /// When the match finished, if it has.
    pub finished_at: Option<SystemTime>,
    /// Last modification timestamp.
    pub updated_at: SystemTime,
    /// Final statistics, set by the finish transition.
    pub stats: Option<MatchStatsEntity>,
    /// Absolute expiry; the store treats the document as gone past this point.
    pub expires_at: SystemTime,
}

impl SessionEntity {
    /// Number of players seated in this match.
    pub fn player_count(&self) -> usize {
        self.scores.len()
    }

    /// Whether `player_id` is part of this match.
    pub fn is_player(&self, player_id: &str) -> bool {
        self.scores.contains_key(player_id)
    }

    /// Total number of rounds this match was configured with.
    pub fn total_rounds(&self) -> u32 {
        self.question_ids.len() as u32
    }
}

/// Lifecycle of a room as tracked by the room collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Waiting for the host to start a match.
    Waiting,
    /// A match is in progress.
    InGame,
    /// The last match ended.
    Finished,
}

impl RoomStatus {
    /// Storage representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::InGame => "in_game",
            RoomStatus::Finished => "finished",
        }
    }
}

/// Seat of a player inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPlayerEntity {
    /// Player occupying the seat.
    pub user_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Whether the player currently has a live connection. Disconnecting
    /// flips this flag but keeps the seat and score.
    pub connected: bool,
}

/// Per-room match configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfigEntity {
    /// Number of rounds to play.
    pub rounds: u32,
    /// Topic to draw questions from.
    pub topic: String,
    /// Points granted per correct guess; clamped to the configured bounds.
    pub points_per_guess: Option<i64>,
}

/// Room record owned by the room collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub room_id: RoomId,
    /// Display name of the room.
    pub name: String,
    /// Canonical host field; only the host can start a match.
    pub host_id: PlayerId,
    /// Room lifecycle status.
    pub status: RoomStatus,
    /// Seated players.
    pub players: Vec<RoomPlayerEntity>,
    /// Match configuration chosen for this room.
    pub config: RoomConfigEntity,
    /// Session currently (or last) attached to the room.
    pub session_id: Option<Uuid>,
}

impl RoomEntity {
    /// Look up a seated player by id.
    pub fn player(&self, user_id: &str) -> Option<&RoomPlayerEntity> {
        self.players.iter().find(|p| p.user_id == user_id)
    }
}

/// Immutable question record provided by the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEntity {
    /// Primary key of the question.
    pub question_id: QuestionId,
    /// Question text shown to players.
    pub text: String,
    /// The four options players pick from.
    pub options: Vec<ChosenOption>,
    /// Topic used for pool selection.
    pub topic: String,
    /// Display category.
    pub category: String,
    /// Whether the question is eligible for new matches.
    pub active: bool,
    /// How many rounds have used this question (best-effort counter).
    pub times_used: u64,
}

impl QuestionEntity {
    /// Whether `option` is one of this question's options.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}
