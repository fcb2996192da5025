//! Public operations of the session state machine.
//!
//! Every operation loads the session document, validates the request against
//! the loaded snapshot, and then applies the mutation through one of the
//! store's conditional-write primitives. When a precondition is not met the
//! session is reloaded to diagnose the precise conflict, so racing callers
//! get an accurate error instead of a lost update. Fan-out runs only after
//! the mutation has committed and never rolls it back.

use std::{sync::Arc, time::SystemTime};

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            GuessEntity, QuestionEntity, RoomEntity, RoomStatus, RoundRecordEntity, SessionEntity,
            SessionPhase, SessionStatus,
        },
        session_store::{ConditionalWrite, SessionUpdate},
    },
    dto::{
        common::{
            AnswerProgress, GuessProgress, GuessResultView, PlayerSummary, QuestionSnapshot,
            RankingEntryView,
        },
        format_system_time,
        game::{
            CloseAnsweringResponse, CloseGuessingResponse, FinishMatchResponse, PlayerAccuracyView,
            RankedPlayerView, RankingResponse, RankingStatsView, SessionStateResponse,
            StartMatchRequest, StartMatchResponse, StartRoundResponse, StateProgress,
            SubmitAnswerRequest, SubmitAnswerResponse, SubmitGuessRequest, SubmitGuessResponse,
            ViewerGuess, ViewerState,
        },
        ws::RoundStartedEvent,
    },
    error::{GameRuleError, ServiceError},
    services::{push_events, scoring},
    state::{
        Backends, SharedState,
        machine::{SessionEvent, compute_transition},
    },
};

const FALLBACK_TOPIC: &str = "general-knowledge";

/// Start a match in a room. Only the host may do this, the room must be
/// waiting with enough players, and the topic pool must cover the configured
/// round count.
pub async fn start_match(
    state: &SharedState,
    room_id: String,
    request: StartMatchRequest,
) -> Result<StartMatchResponse, ServiceError> {
    let backends = state.require_backends().await?;

    let room = backends
        .rooms
        .find_room(room_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))?;

    if room.host_id != request.user_id {
        return Err(GameRuleError::NotHost.into());
    }
    if room.status != RoomStatus::Waiting {
        return Err(GameRuleError::NotWaitingState {
            status: room.status.as_str().to_string(),
        }
        .into());
    }
    let min_players = state.config().min_players;
    if room.players.len() < min_players {
        return Err(GameRuleError::InsufficientPlayers {
            min: min_players,
            actual: room.players.len(),
        }
        .into());
    }

    let rounds = if room.config.rounds == 0 {
        state.config().default_rounds
    } else {
        room.config.rounds
    };
    let topic = if room.config.topic.trim().is_empty() {
        FALLBACK_TOPIC.to_string()
    } else {
        room.config.topic.clone()
    };

    let pool = backends.questions.list_active_by_topic(topic.clone()).await?;
    if pool.len() < rounds as usize {
        return Err(GameRuleError::InsufficientQuestions {
            topic,
            available: pool.len(),
            required: rounds as usize,
        }
        .into());
    }

    // Sampling without replacement: shuffle the pool ids once, keep a prefix.
    let mut question_ids: Vec<String> = pool.into_iter().map(|q| q.question_id).collect();
    question_ids.shuffle(&mut rand::rng());
    question_ids.truncate(rounds as usize);

    let now = SystemTime::now();
    let scores: IndexMap<String, i64> = room
        .players
        .iter()
        .map(|player| (player.user_id.clone(), 0))
        .collect();
    let ranking = scoring::rebuild_ranking(&scores, &room.players);

    let session = SessionEntity {
        session_id: Uuid::new_v4(),
        room_id: room.room_id.clone(),
        topic: topic.clone(),
        question_ids,
        current_round: 0,
        current_question_id: None,
        phase: SessionPhase::Initialized,
        answers: IndexMap::new(),
        guesses: IndexMap::new(),
        scores,
        ranking,
        round_history: Vec::new(),
        status: SessionStatus::Active,
        started_at: now,
        round_started_at: None,
        finished_at: None,
        updated_at: now,
        stats: None,
        expires_at: now + state.config().session_ttl,
    };

    backends.sessions.create_session(session.clone()).await?;
    backends
        .rooms
        .mark_in_game(room.room_id.clone(), session.session_id)
        .await?;

    info!(
        session_id = %session.session_id,
        room_id = %room.room_id,
        rounds,
        players = session.player_count(),
        "match started"
    );
    push_events::phase_changed(state, &session).await;

    Ok(StartMatchResponse {
        session_id: session.session_id,
        room_id: room.room_id,
        topic,
        rounds,
        players: session.player_count(),
    })
}

/// Advance the session into the next round's answering phase.
pub async fn start_round(
    state: &SharedState,
    session_id: Uuid,
) -> Result<StartRoundResponse, ServiceError> {
    let backends = state.require_backends().await?;
    let session = load_session(&backends, session_id).await?;
    ensure_active(&session)?;

    compute_transition(session.phase, SessionEvent::StartRound).map_err(GameRuleError::from)?;
    if session.current_round >= session.total_rounds() {
        return Err(GameRuleError::AllRoundsPlayed {
            total: session.total_rounds(),
        }
        .into());
    }

    let question_id = session
        .question_ids
        .get(session.current_round as usize)
        .cloned()
        .ok_or_else(|| ServiceError::Internal("round index out of bounds".into()))?;
    let question = backends
        .questions
        .find_question(question_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("question `{question_id}` not found")))?;

    let next_round = session.current_round + 1;
    let update = SessionUpdate::start_round(next_round, question_id.clone(), SystemTime::now());
    let updated = match backends
        .sessions
        .apply_transition(session_id, session.phase, update)
        .await?
    {
        ConditionalWrite::Applied(updated) => updated,
        ConditionalWrite::Unmet => return Err(transition_conflict(&backends, session_id).await),
    };

    // Usage counters are best-effort bookkeeping; never block round start.
    spawn_usage_increment(backends.questions.clone(), question_id);

    info!(session_id = %session_id, round = next_round, "round started");
    push_events::round_started(
        state,
        &updated,
        RoundStartedEvent {
            round: next_round,
            total_rounds: updated.total_rounds(),
            question_text: question.text.clone(),
            options: question.options.clone(),
            category: question.category.clone(),
        },
    )
    .await;

    Ok(StartRoundResponse {
        round: next_round,
        total_rounds: updated.total_rounds(),
        phase: updated.phase.into(),
        question: question.into(),
    })
}

/// Record a player's answer to the current question.
pub async fn submit_answer(
    state: &SharedState,
    session_id: Uuid,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ServiceError> {
    let backends = state.require_backends().await?;
    let session = load_session(&backends, session_id).await?;
    ensure_active(&session)?;

    if session.phase != SessionPhase::Answering {
        return Err(GameRuleError::InvalidPhase {
            phase: session.phase,
        }
        .into());
    }
    if !session.is_player(&request.user_id) {
        return Err(GameRuleError::NotAPlayer {
            player_id: request.user_id,
        }
        .into());
    }
    if session.answers.contains_key(&request.user_id) {
        return Err(GameRuleError::AlreadyAnswered {
            player_id: request.user_id,
        }
        .into());
    }

    let question = current_question(&backends, &session).await?;
    if !question.has_option(&request.option) {
        return Err(GameRuleError::InvalidOption {
            option: request.option,
        }
        .into());
    }

    let updated = match backends
        .sessions
        .insert_answer(
            session_id,
            session.current_round,
            request.user_id.clone(),
            request.option,
        )
        .await?
    {
        ConditionalWrite::Applied(updated) => updated,
        ConditionalWrite::Unmet => {
            return Err(diagnose_answer_conflict(&backends, session_id, &request.user_id).await);
        }
    };

    let progress = AnswerProgress::new(updated.answers.len(), updated.player_count());
    push_events::player_answered(state, &updated, &request.user_id).await;

    Ok(SubmitAnswerResponse {
        progress,
        all_answered: progress.remaining == 0,
    })
}

/// Close the answering phase once every player answered, opening guessing.
pub async fn close_answering(
    state: &SharedState,
    session_id: Uuid,
) -> Result<CloseAnsweringResponse, ServiceError> {
    let backends = state.require_backends().await?;
    let session = load_session(&backends, session_id).await?;
    ensure_active(&session)?;

    compute_transition(session.phase, SessionEvent::CloseAnswering)
        .map_err(GameRuleError::from)?;
    let remaining = session.player_count().saturating_sub(session.answers.len());
    if remaining > 0 {
        return Err(GameRuleError::IncompletePhase { remaining }.into());
    }

    let updated = match backends
        .sessions
        .apply_transition(
            session_id,
            SessionPhase::Answering,
            SessionUpdate::open_guessing(),
        )
        .await?
    {
        ConditionalWrite::Applied(updated) => updated,
        ConditionalWrite::Unmet => return Err(transition_conflict(&backends, session_id).await),
    };

    let question = current_question(&backends, &updated).await?;
    let roster = find_roster(&backends, &updated.room_id).await;
    let players = updated
        .answers
        .keys()
        .map(|user_id| player_summary(&roster, user_id))
        .collect();

    push_events::phase_changed(state, &updated).await;

    Ok(CloseAnsweringResponse {
        phase: updated.phase.into(),
        question: question.into(),
        players,
    })
}

/// Record a player's guess about another player's answer.
pub async fn submit_guess(
    state: &SharedState,
    session_id: Uuid,
    request: SubmitGuessRequest,
) -> Result<SubmitGuessResponse, ServiceError> {
    if request.user_id == request.target_user_id {
        return Err(GameRuleError::SelfGuess.into());
    }

    let backends = state.require_backends().await?;
    let session = load_session(&backends, session_id).await?;
    ensure_active(&session)?;

    if session.phase != SessionPhase::Guessing {
        return Err(GameRuleError::InvalidPhase {
            phase: session.phase,
        }
        .into());
    }
    if !session.is_player(&request.user_id) {
        return Err(GameRuleError::NotAPlayer {
            player_id: request.user_id,
        }
        .into());
    }
    if !session.is_player(&request.target_user_id) {
        return Err(GameRuleError::NotAPlayer {
            player_id: request.target_user_id,
        }
        .into());
    }
    if !session.answers.contains_key(&request.target_user_id) {
        return Err(GameRuleError::TargetNotAnswered {
            target_id: request.target_user_id,
        }
        .into());
    }
    if session.guesses.contains_key(&request.user_id) {
        return Err(GameRuleError::AlreadyGuessed {
            player_id: request.user_id,
        }
        .into());
    }

    let question = current_question(&backends, &session).await?;
    if !question.has_option(&request.guess) {
        return Err(GameRuleError::InvalidOption {
            option: request.guess,
        }
        .into());
    }

    let updated = match backends
        .sessions
        .insert_guess(
            session_id,
            session.current_round,
            request.user_id.clone(),
            GuessEntity {
                target: request.target_user_id,
                guess: request.guess,
            },
        )
        .await?
    {
        ConditionalWrite::Applied(updated) => updated,
        ConditionalWrite::Unmet => {
            return Err(diagnose_guess_conflict(&backends, session_id, &request.user_id).await);
        }
    };

    let progress = GuessProgress::new(updated.guesses.len(), updated.player_count());
    push_events::player_guessed(state, &updated, &request.user_id).await;

    Ok(SubmitGuessResponse {
        progress,
        all_guessed: progress.remaining == 0,
    })
}

/// Close the guessing phase once every player guessed; scores the round and
/// recomputes the ranking atomically with the phase change.
pub async fn close_guessing(
    state: &SharedState,
    session_id: Uuid,
) -> Result<CloseGuessingResponse, ServiceError> {
    let backends = state.require_backends().await?;
    let session = load_session(&backends, session_id).await?;
    ensure_active(&session)?;

    compute_transition(session.phase, SessionEvent::CloseGuessing).map_err(GameRuleError::from)?;
    let remaining = session.player_count().saturating_sub(session.guesses.len());
    if remaining > 0 {
        return Err(GameRuleError::IncompletePhase { remaining }.into());
    }

    let room = find_room(&backends, &session.room_id).await;
    let points = state
        .config()
        .points_per_guess(room.as_ref().and_then(|r| r.config.points_per_guess));
    let roster = room.map(|r| r.players).unwrap_or_default();

    let outcome = scoring::score_round(&session.answers, &session.guesses, &session.scores, points)
        .map_err(|err| ServiceError::Internal(err.to_string()))?;
    let ranking = scoring::rebuild_ranking(&outcome.scores, &roster);
    let question_id = session
        .current_question_id
        .clone()
        .ok_or_else(|| ServiceError::Internal("round in progress has no question".into()))?;
    let record = RoundRecordEntity {
        round: session.current_round,
        question_id,
        answers: session.answers.clone(),
        guesses: session.guesses.clone(),
        results: outcome.results,
        recorded_at: SystemTime::now(),
    };

    let updated = match backends
        .sessions
        .apply_transition(
            session_id,
            SessionPhase::Guessing,
            SessionUpdate::close_round(outcome.scores, ranking, record),
        )
        .await?
    {
        ConditionalWrite::Applied(updated) => updated,
        ConditionalWrite::Unmet => return Err(transition_conflict(&backends, session_id).await),
    };

    info!(session_id = %session_id, round = updated.current_round, "round closed");
    push_events::round_ended(state, &updated).await;

    let results = updated
        .round_history
        .last()
        .map(|record| {
            record
                .results
                .iter()
                .cloned()
                .map(GuessResultView::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(CloseGuessingResponse {
        round: updated.current_round,
        total_rounds: updated.total_rounds(),
        results,
        ranking: updated
            .ranking
            .into_iter()
            .map(RankingEntryView::from)
            .collect(),
    })
}

/// Finish the match after its last round closed.
pub async fn finish_match(
    state: &SharedState,
    session_id: Uuid,
) -> Result<FinishMatchResponse, ServiceError> {
    let backends = state.require_backends().await?;
    let session = load_session(&backends, session_id).await?;
    ensure_active(&session)?;

    let total = session.total_rounds();
    if session.current_round < total {
        return Err(GameRuleError::RoundsRemaining {
            remaining: total - session.current_round,
        }
        .into());
    }
    if session.phase != SessionPhase::RoundClosed {
        return Err(GameRuleError::LastRoundNotClosed.into());
    }

    let now = SystemTime::now();
    let stats = scoring::final_stats(&session, now);
    let updated = match backends
        .sessions
        .apply_transition(
            session_id,
            SessionPhase::RoundClosed,
            SessionUpdate::finish(stats.clone(), now),
        )
        .await?
    {
        ConditionalWrite::Applied(updated) => updated,
        ConditionalWrite::Unmet => return Err(transition_conflict(&backends, session_id).await),
    };

    backends
        .rooms
        .mark_finished(updated.room_id.clone())
        .await?;

    info!(session_id = %session_id, "match finished");
    push_events::game_ended(state, &updated, stats.clone().into()).await;

    let ranking: Vec<RankingEntryView> = updated
        .ranking
        .into_iter()
        .map(RankingEntryView::from)
        .collect();
    Ok(FinishMatchResponse {
        winner: ranking.first().cloned(),
        ranking,
        stats: stats.into(),
    })
}

/// Read-only snapshot of the session, optionally scoped to one viewer.
///
/// Other players' answers and guesses are never included before the round
/// closes; a viewer only ever sees their own submissions.
pub async fn get_state(
    state: &SharedState,
    session_id: Uuid,
    viewer_id: Option<String>,
) -> Result<SessionStateResponse, ServiceError> {
    let backends = state.require_backends().await?;
    let session = load_session(&backends, session_id).await?;

    let question = match &session.current_question_id {
        Some(question_id) => backends
            .questions
            .find_question(question_id.clone())
            .await?
            .map(QuestionSnapshot::from),
        None => None,
    };

    let viewer = match viewer_id {
        Some(user_id) => {
            if !session.is_player(&user_id) {
                return Err(GameRuleError::NotAPlayer { player_id: user_id }.into());
            }
            Some(ViewerState {
                score: session.scores.get(&user_id).copied().unwrap_or(0),
                has_answered: session.answers.contains_key(&user_id),
                has_guessed: session.guesses.contains_key(&user_id),
                answer: session.answers.get(&user_id).cloned(),
                guess: session.guesses.get(&user_id).map(|g| ViewerGuess {
                    target_user_id: g.target.clone(),
                    guess: g.guess.clone(),
                }),
                user_id,
            })
        }
        None => None,
    };

    Ok(SessionStateResponse {
        session_id: session.session_id,
        room_id: session.room_id,
        status: session.status.into(),
        phase: session.phase.into(),
        current_round: session.current_round,
        total_rounds: session.question_ids.len() as u32,
        topic: session.topic,
        ranking: session
            .ranking
            .into_iter()
            .map(RankingEntryView::from)
            .collect(),
        started_at: format_system_time(session.started_at),
        round_started_at: session.round_started_at.map(format_system_time),
        question,
        progress: StateProgress {
            players_total: session.scores.len(),
            answers_received: session.answers.len(),
            guesses_received: session.guesses.len(),
        },
        viewer,
    })
}

/// Detailed ranking with per-player accuracy derived from the round history.
pub async fn get_ranking(
    state: &SharedState,
    session_id: Uuid,
) -> Result<RankingResponse, ServiceError> {
    let backends = state.require_backends().await?;
    let session = load_session(&backends, session_id).await?;
    let room = find_room(&backends, &session.room_id).await;

    let total_rounds = session.total_rounds();
    let last_index = session.ranking.len().saturating_sub(1);
    let ranking: Vec<RankedPlayerView> = session
        .ranking
        .iter()
        .enumerate()
        .map(|(index, entry)| RankedPlayerView {
            position: index + 1,
            player_id: entry.player_id.clone(),
            name: entry.name.clone(),
            avatar_url: entry.avatar_url.clone(),
            score: entry.score,
            is_first: index == 0,
            is_last: index == last_index,
        })
        .collect();

    let details: Vec<PlayerAccuracyView> = session
        .ranking
        .iter()
        .map(|entry| {
            let (hits, misses) = scoring::accuracy(&entry.player_id, &session);
            let accuracy_pct = if total_rounds > 0 {
                ((hits as f64 / total_rounds as f64) * 100.0).round() as u32
            } else {
                0
            };
            PlayerAccuracyView {
                user_id: entry.player_id.clone(),
                name: entry.name.clone(),
                avatar_url: entry.avatar_url.clone(),
                score: entry.score,
                hits,
                misses,
                total_rounds,
                accuracy_pct,
            }
        })
        .collect();

    let duration_ms = session
        .finished_at
        .and_then(|finished| finished.duration_since(session.started_at).ok())
        .map(|d| d.as_millis() as u64);
    let winner = session.ranking.first().cloned().map(RankingEntryView::from);

    Ok(RankingResponse {
        session_id: session.session_id,
        room_id: session.room_id.clone(),
        room_name: room
            .map(|r| r.name)
            .unwrap_or_else(|| "Unknown room".to_string()),
        status: session.status.into(),
        stats: RankingStatsView {
            total_rounds,
            rounds_played: session.current_round,
            topic: session.topic.clone(),
            max_score: session.ranking.first().map(|e| e.score).unwrap_or(0),
            min_score: session.ranking.last().map(|e| e.score).unwrap_or(0),
            duration_ms,
        },
        ranking,
        details,
        winner,
    })
}

async fn load_session(
    backends: &Backends,
    session_id: Uuid,
) -> Result<SessionEntity, ServiceError> {
    backends
        .sessions
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))
}

fn ensure_active(session: &SessionEntity) -> Result<(), ServiceError> {
    if session.status == SessionStatus::Finished {
        return Err(GameRuleError::SessionFinished.into());
    }
    Ok(())
}

async fn current_question(
    backends: &Backends,
    session: &SessionEntity,
) -> Result<QuestionEntity, ServiceError> {
    let question_id = session
        .current_question_id
        .clone()
        .ok_or_else(|| ServiceError::Internal("round in progress has no question".into()))?;
    backends
        .questions
        .find_question(question_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("question `{question_id}` not found")))
}

async fn find_room(backends: &Backends, room_id: &str) -> Option<RoomEntity> {
    match backends.rooms.find_room(room_id.to_string()).await {
        Ok(room) => room,
        Err(err) => {
            warn!(room_id, error = %err, "room lookup failed; continuing without roster");
            None
        }
    }
}

async fn find_roster(backends: &Backends, room_id: &str) -> Vec<crate::dao::models::RoomPlayerEntity> {
    find_room(backends, room_id)
        .await
        .map(|room| room.players)
        .unwrap_or_default()
}

fn player_summary(
    roster: &[crate::dao::models::RoomPlayerEntity],
    user_id: &str,
) -> PlayerSummary {
    roster
        .iter()
        .find(|p| p.user_id == user_id)
        .map(PlayerSummary::from)
        .unwrap_or_else(|| PlayerSummary {
            user_id: user_id.to_string(),
            name: "Unknown player".to_string(),
            avatar_url: None,
        })
}

/// Reload after a failed transition CAS and report the phase the loser lost
/// to; the session vanishing mid-flight reads as not-found.
async fn transition_conflict(backends: &Backends, session_id: Uuid) -> ServiceError {
    match load_session(backends, session_id).await {
        Ok(session) => GameRuleError::InvalidPhase {
            phase: session.phase,
        }
        .into(),
        Err(err) => err,
    }
}

async fn diagnose_answer_conflict(
    backends: &Backends,
    session_id: Uuid,
    player_id: &str,
) -> ServiceError {
    match load_session(backends, session_id).await {
        Ok(session) => {
            if session.answers.contains_key(player_id) {
                GameRuleError::AlreadyAnswered {
                    player_id: player_id.to_string(),
                }
                .into()
            } else {
                GameRuleError::InvalidPhase {
                    phase: session.phase,
                }
                .into()
            }
        }
        Err(err) => err,
    }
}

async fn diagnose_guess_conflict(
    backends: &Backends,
    session_id: Uuid,
    player_id: &str,
) -> ServiceError {
    match load_session(backends, session_id).await {
        Ok(session) => {
            if session.guesses.contains_key(player_id) {
                GameRuleError::AlreadyGuessed {
                    player_id: player_id.to_string(),
                }
                .into()
            } else {
                GameRuleError::InvalidPhase {
                    phase: session.phase,
                }
                .into()
            }
        }
        Err(err) => err,
    }
}

fn spawn_usage_increment(
    questions: Arc<dyn crate::dao::catalog::QuestionCatalog>,
    question_id: String,
) {
    tokio::spawn(async move {
        if let Err(err) = questions.increment_usage(question_id.clone()).await {
            warn!(question_id, error = %err, "failed to increment question usage counter");
        }
    });
}
