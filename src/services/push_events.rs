//! Typed push-event constructors over the connection registry.
//!
//! Every state-changing session operation calls one of these after its
//! mutation has committed, so all clients of a room converge on the same
//! phase and progress view without polling. Fan-out statistics are logged,
//! never returned to the action's caller.

use tracing::debug;

use crate::{
    dao::models::SessionEntity,
    dto::{
        common::{AnswerProgress, GuessProgress, GuessResultView, MatchStatsView, RankingEntryView},
        ws::{
            GameEndedEvent, PhaseChangedEvent, PlayerAnsweredEvent, PlayerGuessedEvent,
            RoundEndedEvent, RoundStartedEvent, SubmissionAck,
        },
    },
    state::SharedState,
};

const EVENT_ROUND_STARTED: &str = "round_started";
const EVENT_PLAYER_ANSWERED: &str = "player_answered";
const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_PLAYER_GUESSED: &str = "player_guessed";
const EVENT_ROUND_ENDED: &str = "round_ended";
const EVENT_GAME_ENDED: &str = "game_ended";
const EVENT_SUBMISSION_ACK: &str = "submission_ack";

/// Broadcast that a new round started, including the question.
pub async fn round_started(state: &SharedState, session: &SessionEntity, event: RoundStartedEvent) {
    let stats = state
        .connections()
        .broadcast(&session.room_id, EVENT_ROUND_STARTED, &event, None)
        .await;
    debug!(room_id = %session.room_id, ?stats, "round_started fan-out");
}

/// Broadcast answer-collection progress; the submitter gets a private ack
/// instead.
pub async fn player_answered(state: &SharedState, session: &SessionEntity, user_id: &str) {
    let progress = AnswerProgress::new(session.answers.len(), session.player_count());
    let event = PlayerAnsweredEvent {
        user_id: user_id.to_string(),
        progress,
        all_answered: progress.remaining == 0,
    };
    let stats = state
        .connections()
        .broadcast(&session.room_id, EVENT_PLAYER_ANSWERED, &event, Some(user_id))
        .await;
    debug!(room_id = %session.room_id, ?stats, "player_answered fan-out");

    let ack = SubmissionAck {
        round: session.current_round,
        kind: "answer".to_string(),
    };
    state
        .connections()
        .send_to_user(user_id, EVENT_SUBMISSION_ACK, &ack)
        .await;
}

/// Broadcast guess-collection progress; the submitter gets a private ack
/// instead.
pub async fn player_guessed(state: &SharedState, session: &SessionEntity, user_id: &str) {
    let progress = GuessProgress::new(session.guesses.len(), session.player_count());
    let event = PlayerGuessedEvent {
        user_id: user_id.to_string(),
        progress,
        all_guessed: progress.remaining == 0,
    };
    let stats = state
        .connections()
        .broadcast(&session.room_id, EVENT_PLAYER_GUESSED, &event, Some(user_id))
        .await;
    debug!(room_id = %session.room_id, ?stats, "player_guessed fan-out");

    let ack = SubmissionAck {
        round: session.current_round,
        kind: "guess".to_string(),
    };
    state
        .connections()
        .send_to_user(user_id, EVENT_SUBMISSION_ACK, &ack)
        .await;
}

/// Broadcast a phase change that is not already covered by a round event.
pub async fn phase_changed(state: &SharedState, session: &SessionEntity) {
    let event = PhaseChangedEvent {
        phase: session.phase.into(),
        round: session.current_round,
    };
    let stats = state
        .connections()
        .broadcast(&session.room_id, EVENT_PHASE_CHANGED, &event, None)
        .await;
    debug!(room_id = %session.room_id, phase = %session.phase, ?stats, "phase_changed fan-out");
}

/// Broadcast the results and updated ranking of a scored round.
pub async fn round_ended(state: &SharedState, session: &SessionEntity) {
    let record = session.round_history.last();
    let event = RoundEndedEvent {
        round: session.current_round,
        results: record
            .map(|r| r.results.iter().cloned().map(GuessResultView::from).collect())
            .unwrap_or_default(),
        ranking: session
            .ranking
            .iter()
            .cloned()
            .map(RankingEntryView::from)
            .collect(),
    };
    let stats = state
        .connections()
        .broadcast(&session.room_id, EVENT_ROUND_ENDED, &event, None)
        .await;
    debug!(room_id = %session.room_id, round = session.current_round, ?stats, "round_ended fan-out");
}

/// Broadcast the final outcome of the match.
pub async fn game_ended(state: &SharedState, session: &SessionEntity, stats_view: MatchStatsView) {
    let ranking: Vec<RankingEntryView> = session
        .ranking
        .iter()
        .cloned()
        .map(RankingEntryView::from)
        .collect();
    let event = GameEndedEvent {
        winner: ranking.first().cloned(),
        ranking,
        stats: stats_view,
    };
    let stats = state
        .connections()
        .broadcast(&session.room_id, EVENT_GAME_ENDED, &event, None)
        .await;
    debug!(room_id = %session.room_id, ?stats, "game_ended fan-out");
}
