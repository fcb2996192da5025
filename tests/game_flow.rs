//! End-to-end exercises of the round state machine against the in-process
//! backend: full match flow, concurrent submission races, and phase-close
//! guards.

use second_guess_back::{
    config::AppConfig,
    dao::{
        models::{
            QuestionEntity, RoomConfigEntity, RoomEntity, RoomPlayerEntity, RoomStatus,
            SessionStatus,
        },
        session_store::{SessionStore, memory::MemoryBackend},
    },
    dto::game::{StartMatchRequest, SubmitAnswerRequest, SubmitGuessRequest},
    error::{GameRuleError, ServiceError},
    services::session_service,
    state::{AppState, Backends, SharedState},
};
use uuid::Uuid;

const OPTIONS: [&str; 4] = ["Red", "Blue", "Green", "Yellow"];

fn seat(user_id: &str, name: &str) -> RoomPlayerEntity {
    RoomPlayerEntity {
        user_id: user_id.into(),
        name: name.into(),
        avatar_url: None,
        connected: true,
    }
}

fn room(players: Vec<RoomPlayerEntity>, rounds: u32) -> RoomEntity {
    RoomEntity {
        room_id: "room-1".into(),
        name: "Friday quiz".into(),
        host_id: "alice".into(),
        status: RoomStatus::Waiting,
        players,
        config: RoomConfigEntity {
            rounds,
            topic: "colors".into(),
            points_per_guess: None,
        },
        session_id: None,
    }
}

fn question(index: u32) -> QuestionEntity {
    QuestionEntity {
        question_id: format!("q-{index}"),
        text: format!("Favorite color #{index}?"),
        options: OPTIONS.iter().map(|o| o.to_string()).collect(),
        topic: "colors".into(),
        category: "taste".into(),
        active: true,
        times_used: 0,
    }
}

async fn setup(rounds: u32, question_count: u32) -> (SharedState, MemoryBackend) {
    let backend = MemoryBackend::new();
    backend.seed_room(room(
        vec![seat("alice", "Alice"), seat("bob", "Bob"), seat("carol", "Carol")],
        rounds,
    ));
    for index in 0..question_count {
        backend.seed_question(question(index));
    }
    let state = AppState::with_backends(
        AppConfig::default(),
        Backends::from_single(backend.clone()),
    )
    .await;
    (state, backend)
}

async fn start(state: &SharedState) -> Uuid {
    session_service::start_match(
        state,
        "room-1".into(),
        StartMatchRequest {
            user_id: "alice".into(),
        },
    )
    .await
    .expect("start_match")
    .session_id
}

async fn answer(state: &SharedState, session_id: Uuid, user_id: &str, option: &str) {
    session_service::submit_answer(
        state,
        session_id,
        SubmitAnswerRequest {
            user_id: user_id.into(),
            option: option.into(),
        },
    )
    .await
    .expect("submit_answer");
}

async fn guess(state: &SharedState, session_id: Uuid, user_id: &str, target: &str, option: &str) {
    session_service::submit_guess(
        state,
        session_id,
        SubmitGuessRequest {
            user_id: user_id.into(),
            target_user_id: target.into(),
            guess: option.into(),
        },
    )
    .await
    .expect("submit_guess");
}

fn rule_error(err: ServiceError) -> GameRuleError {
    match err {
        ServiceError::Rule(rule) => rule,
        other => panic!("expected a rule error, got {other:?}"),
    }
}

#[tokio::test]
async fn full_match_flow_scores_and_ranks() {
    let (state, backend) = setup(2, 5).await;
    let session_id = start(&state).await;

    let round = session_service::start_round(&state, session_id)
        .await
        .expect("start_round");
    assert_eq!(round.round, 1);
    assert_eq!(round.total_rounds, 2);
    assert_eq!(round.question.options.len(), 4);

    // Round 1: A answers Blue, B answers Red, C answers Blue.
    answer(&state, session_id, "alice", "Blue").await;
    answer(&state, session_id, "bob", "Red").await;
    answer(&state, session_id, "carol", "Blue").await;

    let opened = session_service::close_answering(&state, session_id)
        .await
        .expect("close_answering");
    assert_eq!(opened.players.len(), 3);

    // A guesses B->Red (correct), B guesses C->Blue (correct),
    // C guesses A->Red (incorrect).
    guess(&state, session_id, "alice", "bob", "Red").await;
    guess(&state, session_id, "bob", "carol", "Blue").await;
    guess(&state, session_id, "carol", "alice", "Red").await;

    let closed = session_service::close_guessing(&state, session_id)
        .await
        .expect("close_guessing");
    assert_eq!(closed.results.len(), 3);
    let order: Vec<&str> = closed.ranking.iter().map(|e| e.player_id.as_str()).collect();
    assert_eq!(order, ["alice", "bob", "carol"]);
    assert_eq!(closed.ranking[0].score, 10);
    assert_eq!(closed.ranking[1].score, 10);
    assert_eq!(closed.ranking[2].score, 0);

    // One round still to play.
    let err = session_service::finish_match(&state, session_id)
        .await
        .unwrap_err();
    assert_eq!(rule_error(err), GameRuleError::RoundsRemaining { remaining: 1 });

    // Round 2: everyone answers Green; A and C guess right, B guesses wrong.
    session_service::start_round(&state, session_id)
        .await
        .expect("second start_round");
    for player in ["alice", "bob", "carol"] {
        answer(&state, session_id, player, "Green").await;
    }
    session_service::close_answering(&state, session_id)
        .await
        .expect("second close_answering");
    guess(&state, session_id, "alice", "bob", "Green").await;
    guess(&state, session_id, "bob", "alice", "Red").await;
    guess(&state, session_id, "carol", "bob", "Green").await;
    session_service::close_guessing(&state, session_id)
        .await
        .expect("second close_guessing");

    let finished = session_service::finish_match(&state, session_id)
        .await
        .expect("finish_match");
    let winner = finished.winner.expect("winner");
    assert_eq!(winner.player_id, "alice");
    assert_eq!(winner.score, 20);
    assert_eq!(finished.stats.total_rounds, 2);
    assert_eq!(finished.stats.max_score, 20);
    assert_eq!(finished.stats.min_score, 10);

    // Score conservation: sum(scores) equals correct guesses x points.
    let session = backend
        .find_session(session_id)
        .await
        .unwrap()
        .expect("session persists");
    let total: i64 = session.scores.values().sum();
    let correct: i64 = session
        .round_history
        .iter()
        .flat_map(|round| round.results.iter())
        .filter(|result| result.correct)
        .count() as i64;
    assert_eq!(total, correct * 10);
    assert_eq!(session.status, SessionStatus::Finished);

    // Terminal state: no further mutation.
    let err = session_service::start_round(&state, session_id)
        .await
        .unwrap_err();
    assert_eq!(rule_error(err), GameRuleError::SessionFinished);

    // Detailed ranking: accuracy derived from the history.
    let ranking = session_service::get_ranking(&state, session_id)
        .await
        .expect("get_ranking");
    assert_eq!(ranking.ranking[0].position, 1);
    assert!(ranking.ranking[0].is_first);
    assert!(ranking.ranking[2].is_last);
    let alice = ranking
        .details
        .iter()
        .find(|d| d.user_id == "alice")
        .expect("alice detail");
    assert_eq!(alice.hits, 2);
    assert_eq!(alice.misses, 0);
    assert_eq!(alice.accuracy_pct, 100);
    let bob = ranking
        .details
        .iter()
        .find(|d| d.user_id == "bob")
        .expect("bob detail");
    assert_eq!(bob.hits, 1);
    assert_eq!(bob.misses, 1);
    assert_eq!(bob.accuracy_pct, 50);
}

#[tokio::test]
async fn concurrent_duplicate_answers_accept_exactly_one() {
    let (state, backend) = setup(1, 3).await;
    let session_id = start(&state).await;
    session_service::start_round(&state, session_id)
        .await
        .expect("start_round");

    let (first, second) = tokio::join!(
        session_service::submit_answer(
            &state,
            session_id,
            SubmitAnswerRequest {
                user_id: "alice".into(),
                option: "Blue".into(),
            },
        ),
        session_service::submit_answer(
            &state,
            session_id,
            SubmitAnswerRequest {
                user_id: "alice".into(),
                option: "Red".into(),
            },
        ),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = outcomes
        .into_iter()
        .find_map(Result::err)
        .expect("one rejection");
    assert_eq!(
        rule_error(failure),
        GameRuleError::AlreadyAnswered {
            player_id: "alice".into()
        }
    );

    let session = backend
        .find_session(session_id)
        .await
        .unwrap()
        .expect("session");
    assert_eq!(session.answers.len(), 1);
}

#[tokio::test]
async fn close_answering_rejects_every_partial_count() {
    let (state, _backend) = setup(1, 3).await;
    let session_id = start(&state).await;
    session_service::start_round(&state, session_id)
        .await
        .expect("start_round");

    for (answered, player) in [(0usize, "alice"), (1, "bob"), (2, "carol")] {
        let err = session_service::close_answering(&state, session_id)
            .await
            .unwrap_err();
        assert_eq!(
            rule_error(err),
            GameRuleError::IncompletePhase {
                remaining: 3 - answered
            }
        );
        answer(&state, session_id, player, "Red").await;
    }

    session_service::close_answering(&state, session_id)
        .await
        .expect("close after everyone answered");
}

#[tokio::test]
async fn concurrent_phase_closes_score_exactly_once() {
    let (state, backend) = setup(1, 3).await;
    let session_id = start(&state).await;
    session_service::start_round(&state, session_id)
        .await
        .expect("start_round");
    for player in ["alice", "bob", "carol"] {
        answer(&state, session_id, player, "Yellow").await;
    }
    session_service::close_answering(&state, session_id)
        .await
        .expect("close_answering");
    guess(&state, session_id, "alice", "bob", "Yellow").await;
    guess(&state, session_id, "bob", "carol", "Yellow").await;
    guess(&state, session_id, "carol", "alice", "Yellow").await;

    let (first, second) = tokio::join!(
        session_service::close_guessing(&state, session_id),
        session_service::close_guessing(&state, session_id),
    );
    let outcomes = [first.map(|_| ()), second.map(|_| ())];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);

    // A single scoring pass: every guess was correct, 3 x 10 points total.
    let session = backend
        .find_session(session_id)
        .await
        .unwrap()
        .expect("session");
    let total: i64 = session.scores.values().sum();
    assert_eq!(total, 30);
    assert_eq!(session.round_history.len(), 1);
}

#[tokio::test]
async fn guess_guards_reject_self_target_and_unanswered() {
    let (state, _backend) = setup(1, 3).await;
    let session_id = start(&state).await;
    session_service::start_round(&state, session_id)
        .await
        .expect("start_round");

    // Guessing before the phase opened.
    let err = session_service::submit_guess(
        &state,
        session_id,
        SubmitGuessRequest {
            user_id: "alice".into(),
            target_user_id: "bob".into(),
            guess: "Red".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        rule_error(err),
        GameRuleError::InvalidPhase { .. }
    ));

    for player in ["alice", "bob", "carol"] {
        answer(&state, session_id, player, "Red").await;
    }
    session_service::close_answering(&state, session_id)
        .await
        .expect("close_answering");

    let err = session_service::submit_guess(
        &state,
        session_id,
        SubmitGuessRequest {
            user_id: "alice".into(),
            target_user_id: "alice".into(),
            guess: "Red".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(rule_error(err), GameRuleError::SelfGuess);

    let err = session_service::submit_guess(
        &state,
        session_id,
        SubmitGuessRequest {
            user_id: "alice".into(),
            target_user_id: "mallory".into(),
            guess: "Red".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        rule_error(err),
        GameRuleError::NotAPlayer {
            player_id: "mallory".into()
        }
    );

    guess(&state, session_id, "alice", "bob", "Red").await;
    let err = session_service::submit_guess(
        &state,
        session_id,
        SubmitGuessRequest {
            user_id: "alice".into(),
            target_user_id: "carol".into(),
            guess: "Red".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        rule_error(err),
        GameRuleError::AlreadyGuessed {
            player_id: "alice".into()
        }
    );
}

#[tokio::test]
async fn state_snapshot_scopes_submissions_to_the_viewer() {
    let (state, _backend) = setup(1, 3).await;
    let session_id = start(&state).await;
    session_service::start_round(&state, session_id)
        .await
        .expect("start_round");
    answer(&state, session_id, "alice", "Blue").await;

    let snapshot = session_service::get_state(&state, session_id, Some("alice".into()))
        .await
        .expect("viewer snapshot");
    let viewer = snapshot.viewer.expect("viewer block");
    assert!(viewer.has_answered);
    assert_eq!(viewer.answer.as_deref(), Some("Blue"));
    assert_eq!(snapshot.progress.answers_received, 1);

    let snapshot = session_service::get_state(&state, session_id, Some("bob".into()))
        .await
        .expect("other viewer snapshot");
    let viewer = snapshot.viewer.expect("viewer block");
    assert!(!viewer.has_answered);
    assert_eq!(viewer.answer, None);

    let anonymous = session_service::get_state(&state, session_id, None)
        .await
        .expect("anonymous snapshot");
    assert!(anonymous.viewer.is_none());

    let err = session_service::get_state(&state, session_id, Some("mallory".into()))
        .await
        .unwrap_err();
    assert_eq!(
        rule_error(err),
        GameRuleError::NotAPlayer {
            player_id: "mallory".into()
        }
    );
}

#[tokio::test]
async fn start_match_guards() {
    let (state, backend) = setup(3, 2).await;

    // Host gate.
    let err = session_service::start_match(
        &state,
        "room-1".into(),
        StartMatchRequest {
            user_id: "bob".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(rule_error(err), GameRuleError::NotHost);

    // Pool smaller than the configured round count (2 questions, 3 rounds).
    let err = session_service::start_match(
        &state,
        "room-1".into(),
        StartMatchRequest {
            user_id: "alice".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        rule_error(err),
        GameRuleError::InsufficientQuestions {
            topic: "colors".into(),
            available: 2,
            required: 3,
        }
    );

    // Too few players.
    backend.seed_room(room(vec![seat("alice", "Alice")], 1));
    let err = session_service::start_match(
        &state,
        "room-1".into(),
        StartMatchRequest {
            user_id: "alice".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        rule_error(err),
        GameRuleError::InsufficientPlayers { min: 2, actual: 1 }
    );

    // Room already in a match.
    backend.seed_room(room(
        vec![seat("alice", "Alice"), seat("bob", "Bob"), seat("carol", "Carol")],
        1,
    ));
    session_service::start_match(
        &state,
        "room-1".into(),
        StartMatchRequest {
            user_id: "alice".into(),
        },
    )
    .await
    .expect("start");
    let err = session_service::start_match(
        &state,
        "room-1".into(),
        StartMatchRequest {
            user_id: "alice".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        rule_error(err),
        GameRuleError::NotWaitingState {
            status: "in_game".into()
        }
    );

    // Unknown room.
    let err = session_service::start_match(
        &state,
        "room-404".into(),
        StartMatchRequest {
            user_id: "alice".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
