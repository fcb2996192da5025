use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{
    GuessResultEntity, MatchStatsEntity, QuestionEntity, RankingEntryEntity, RoomPlayerEntity,
};

/// Question projection pushed to players when a round starts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionSnapshot {
    /// Catalog id of the question.
    pub question_id: String,
    /// Question text.
    pub text: String,
    /// The four options to pick from.
    pub options: Vec<String>,
    /// Display category.
    pub category: String,
}

impl From<QuestionEntity> for QuestionSnapshot {
    fn from(question: QuestionEntity) -> Self {
        Self {
            question_id: question.question_id,
            text: question.text,
            options: question.options,
            category: question.category,
        }
    }
}

/// Player identity without any submission data; safe to share mid-round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Seat owner.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
}

impl From<&RoomPlayerEntity> for PlayerSummary {
    fn from(player: &RoomPlayerEntity) -> Self {
        Self {
            user_id: player.user_id.clone(),
            name: player.name.clone(),
            avatar_url: player.avatar_url.clone(),
        }
    }
}

/// Progress of answer collection in the current round.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct AnswerProgress {
    /// Players who answered so far.
    pub answered: usize,
    /// Players seated in the match.
    pub total: usize,
    /// Players still to answer.
    pub remaining: usize,
}

impl AnswerProgress {
    /// Build the progress triple from the collected and total counts.
    pub fn new(answered: usize, total: usize) -> Self {
        Self {
            answered,
            total,
            remaining: total.saturating_sub(answered),
        }
    }
}

/// Progress of guess collection in the current round.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct GuessProgress {
    /// Players who guessed so far.
    pub guessed: usize,
    /// Players seated in the match.
    pub total: usize,
    /// Players still to guess.
    pub remaining: usize,
}

impl GuessProgress {
    /// Build the progress triple from the collected and total counts.
    pub fn new(guessed: usize, total: usize) -> Self {
        Self {
            guessed,
            total,
            remaining: total.saturating_sub(guessed),
        }
    }
}

/// Ranking row exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankingEntryView {
    /// Ranked player.
    pub player_id: String,
    /// Display name.
    pub name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Current score.
    pub score: i64,
}

impl From<RankingEntryEntity> for RankingEntryView {
    fn from(entry: RankingEntryEntity) -> Self {
        Self {
            player_id: entry.player_id,
            name: entry.name,
            avatar_url: entry.avatar_url,
            score: entry.score,
        }
    }
}

/// Per-guess result revealed when a round closes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GuessResultView {
    /// Player who made the guess.
    pub guesser_id: String,
    /// Player the guess was about.
    pub target_id: String,
    /// Guessed option.
    pub guess: String,
    /// Option the target actually chose.
    pub actual_answer: String,
    /// Whether the guess was correct.
    pub correct: bool,
    /// Points credited to the guesser.
    pub points_awarded: i64,
}

impl From<GuessResultEntity> for GuessResultView {
    fn from(result: GuessResultEntity) -> Self {
        Self {
            guesser_id: result.guesser_id,
            target_id: result.target_id,
            guess: result.guess,
            actual_answer: result.actual_answer,
            correct: result.correct,
            points_awarded: result.points_awarded,
        }
    }
}

/// Final match statistics exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchStatsView {
    /// Rounds the match was configured with.
    pub total_rounds: u32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Participating players.
    pub players: usize,
    /// Highest final score.
    pub max_score: i64,
    /// Lowest final score.
    pub min_score: i64,
    /// Mean final score.
    pub mean_score: f64,
}

impl From<MatchStatsEntity> for MatchStatsView {
    fn from(stats: MatchStatsEntity) -> Self {
        Self {
            total_rounds: stats.total_rounds,
            duration_ms: stats.duration_ms,
            players: stats.players,
            max_score: stats.max_score,
            min_score: stats.min_score,
            mean_score: stats.mean_score,
        }
    }
}
