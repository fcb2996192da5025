//! Session store abstraction.
//!
//! The session document is the only shared mutable state in the system, so
//! every mutation is expressed as a conditional write: either a map-entry
//! insert guarded by key absence, or a phase transition guarded by the
//! expected current phase. Backends must apply the guard and the write as one
//! atomic step; callers reload and diagnose when a guard is not met.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use uuid::Uuid;

use crate::dao::{
    models::{
        ChosenOption, GuessEntity, MatchStatsEntity, PlayerId, QuestionId, RankingEntryEntity,
        RoundRecordEntity, SessionEntity, SessionPhase, SessionStatus,
    },
    storage::StorageResult,
};

/// Outcome of a conditional write against the session document.
#[derive(Debug)]
pub enum ConditionalWrite {
    /// Precondition held; carries the document after the write.
    Applied(SessionEntity),
    /// Precondition failed (key present, phase or round mismatch, or the
    /// document is gone); nothing was written.
    Unmet,
}

/// Field set applied together with a phase transition.
///
/// A transition writes `phase` unconditionally; every other field is applied
/// only when present, so each state-machine step describes exactly the fields
/// it owns. Constructors below cover the four transitions.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    /// Phase to transition into.
    pub phase: Option<SessionPhase>,
    /// New round counter.
    pub current_round: Option<u32>,
    /// New current question (set on round start).
    pub current_question_id: Option<QuestionId>,
    /// Clear the answers and guesses maps (round start).
    pub clear_submissions: bool,
    /// Round start timestamp.
    pub round_started_at: Option<SystemTime>,
    /// Replacement scores map (round close).
    pub scores: Option<IndexMap<PlayerId, i64>>,
    /// Replacement ranking (round close).
    pub ranking: Option<Vec<RankingEntryEntity>>,
    /// Round record to append to the history (round close).
    pub push_round_record: Option<RoundRecordEntity>,
    /// Match-level status change (finish).
    pub status: Option<SessionStatus>,
    /// Final statistics (finish).
    pub stats: Option<MatchStatsEntity>,
    /// Finish timestamp.
    pub finished_at: Option<SystemTime>,
}

impl SessionUpdate {
    /// Transition into a new round: advance the counter, set the question,
    /// clear submissions, and enter the answering phase.
    pub fn start_round(round: u32, question_id: QuestionId, at: SystemTime) -> Self {
        Self {
            phase: Some(SessionPhase::Answering),
            current_round: Some(round),
            current_question_id: Some(question_id),
            clear_submissions: true,
            round_started_at: Some(at),
            ..Self::default()
        }
    }

    /// Transition from answering to guessing; no other field changes.
    pub fn open_guessing() -> Self {
        Self {
            phase: Some(SessionPhase::Guessing),
            ..Self::default()
        }
    }

    /// Close the round: store the new scores and ranking and append the
    /// round record, atomically with the phase change.
    pub fn close_round(
        scores: IndexMap<PlayerId, i64>,
        ranking: Vec<RankingEntryEntity>,
        record: RoundRecordEntity,
    ) -> Self {
        Self {
            phase: Some(SessionPhase::RoundClosed),
            scores: Some(scores),
            ranking: Some(ranking),
            push_round_record: Some(record),
            ..Self::default()
        }
    }

    /// Terminal transition: mark the match finished and record statistics.
    pub fn finish(stats: MatchStatsEntity, at: SystemTime) -> Self {
        Self {
            phase: Some(SessionPhase::Finished),
            status: Some(SessionStatus::Finished),
            stats: Some(stats),
            finished_at: Some(at),
            ..Self::default()
        }
    }
}

/// Abstraction over the persistence layer for session documents.
pub trait SessionStore: Send + Sync {
    /// Persist a freshly created session document.
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Fetch a session by id. Documents past their expiry are reported as
    /// absent; eviction is the backend's concern.
    fn find_session(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;

    /// Record `player_id`'s answer, iff the session is in the answering phase
    /// of `round` and the player has not answered yet. Guard and write are one
    /// atomic step.
    fn insert_answer(
        &self,
        session_id: Uuid,
        round: u32,
        player_id: PlayerId,
        option: ChosenOption,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>>;

    /// Record `guesser_id`'s guess, iff the session is in the guessing phase
    /// of `round` and the guesser has not guessed yet.
    fn insert_guess(
        &self,
        session_id: Uuid,
        round: u32,
        guesser_id: PlayerId,
        guess: GuessEntity,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>>;

    /// Apply `update` iff the session currently sits in `expected` phase, so
    /// concurrent transitions resolve to exactly one winner.
    fn apply_transition(
        &self,
        session_id: Uuid,
        expected: SessionPhase,
        update: SessionUpdate,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>>;

    /// Verify the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish the backend connection after a failed health
    /// check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
