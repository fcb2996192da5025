//! In-process backend used by tests and database-less development runs.
//!
//! Mutations happen while holding the map entry's shard lock, which gives the
//! same "guard and write are one atomic step" contract the remote backends
//! provide through filtered updates.

use std::{
    sync::Arc,
    time::SystemTime,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    catalog::QuestionCatalog,
    models::{
        ChosenOption, GuessEntity, PlayerId, QuestionEntity, QuestionId, RoomEntity, RoomId,
        RoomStatus, SessionEntity, SessionPhase,
    },
    rooms::RoomDirectory,
    session_store::{ConditionalWrite, SessionStore, SessionUpdate},
    storage::StorageResult,
};

/// Backend bundle keeping sessions, rooms, and questions in process memory.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    sessions: DashMap<Uuid, SessionEntity>,
    rooms: DashMap<RoomId, RoomEntity>,
    questions: DashMap<QuestionId, QuestionEntity>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a room record.
    pub fn seed_room(&self, room: RoomEntity) {
        self.inner.rooms.insert(room.room_id.clone(), room);
    }

    /// Insert or replace a question record.
    pub fn seed_question(&self, question: QuestionEntity) {
        self.inner
            .questions
            .insert(question.question_id.clone(), question);
    }
}

/// Apply an update's field set to a session in place.
fn apply_update(session: &mut SessionEntity, update: SessionUpdate, now: SystemTime) {
    if let Some(phase) = update.phase {
        session.phase = phase;
    }
    if let Some(round) = update.current_round {
        session.current_round = round;
    }
    if let Some(question_id) = update.current_question_id {
        session.current_question_id = Some(question_id);
    }
    if update.clear_submissions {
        session.answers.clear();
        session.guesses.clear();
    }
    if let Some(at) = update.round_started_at {
        session.round_started_at = Some(at);
    }
    if let Some(scores) = update.scores {
        session.scores = scores;
    }
    if let Some(ranking) = update.ranking {
        session.ranking = ranking;
    }
    if let Some(record) = update.push_round_record {
        session.round_history.push(record);
    }
    if let Some(status) = update.status {
        session.status = status;
    }
    if let Some(stats) = update.stats {
        session.stats = Some(stats);
    }
    if let Some(at) = update.finished_at {
        session.finished_at = Some(at);
    }
    session.updated_at = now;
}

fn is_expired(session: &SessionEntity, now: SystemTime) -> bool {
    session.expires_at <= now
}

impl SessionStore for MemoryBackend {
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.sessions.insert(session.session_id, session);
            Ok(())
        })
    }

    fn find_session(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let now = SystemTime::now();
            let expired = match inner.sessions.get(&session_id) {
                Some(entry) if is_expired(entry.value(), now) => true,
                Some(entry) => return Ok(Some(entry.value().clone())),
                None => return Ok(None),
            };
            if expired {
                inner.sessions.remove(&session_id);
            }
            Ok(None)
        })
    }

    fn insert_answer(
        &self,
        session_id: Uuid,
        round: u32,
        player_id: PlayerId,
        option: ChosenOption,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let now = SystemTime::now();
            let Some(mut entry) = inner.sessions.get_mut(&session_id) else {
                return Ok(ConditionalWrite::Unmet);
            };
            let met = !is_expired(entry.value(), now)
                && entry.phase == SessionPhase::Answering
                && entry.current_round == round
                && !entry.answers.contains_key(&player_id);
            if !met {
                return Ok(ConditionalWrite::Unmet);
            }
            entry.answers.insert(player_id, option);
            entry.updated_at = now;
            Ok(ConditionalWrite::Applied(entry.value().clone()))
        })
    }

    fn insert_guess(
        &self,
        session_id: Uuid,
        round: u32,
        guesser_id: PlayerId,
        guess: GuessEntity,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let now = SystemTime::now();
            let Some(mut entry) = inner.sessions.get_mut(&session_id) else {
                return Ok(ConditionalWrite::Unmet);
            };
            let met = !is_expired(entry.value(), now)
                && entry.phase == SessionPhase::Guessing
                && entry.current_round == round
                && !entry.guesses.contains_key(&guesser_id);
            if !met {
                return Ok(ConditionalWrite::Unmet);
            }
            entry.guesses.insert(guesser_id, guess);
            entry.updated_at = now;
            Ok(ConditionalWrite::Applied(entry.value().clone()))
        })
    }

    fn apply_transition(
        &self,
        session_id: Uuid,
        expected: SessionPhase,
        update: SessionUpdate,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let now = SystemTime::now();
            let Some(mut entry) = inner.sessions.get_mut(&session_id) else {
                return Ok(ConditionalWrite::Unmet);
            };
            if is_expired(entry.value(), now) || entry.phase != expected {
                return Ok(ConditionalWrite::Unmet);
            }
            apply_update(&mut entry, update, now);
            Ok(ConditionalWrite::Applied(entry.value().clone()))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

impl QuestionCatalog for MemoryBackend {
    fn find_question(
        &self,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.questions.get(&question_id).map(|q| q.value().clone())) })
    }

    fn list_active_by_topic(
        &self,
        topic: String,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .questions
                .iter()
                .filter(|q| q.active && q.topic == topic)
                .map(|q| q.value().clone())
                .collect())
        })
    }

    fn increment_usage(&self, question_id: QuestionId) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(mut question) = inner.questions.get_mut(&question_id) {
                question.times_used += 1;
            }
            Ok(())
        })
    }
}

impl RoomDirectory for MemoryBackend {
    fn find_room(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.rooms.get(&room_id).map(|r| r.value().clone())) })
    }

    fn mark_in_game(
        &self,
        room_id: RoomId,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(mut room) = inner.rooms.get_mut(&room_id) {
                room.status = RoomStatus::InGame;
                room.session_id = Some(session_id);
            }
            Ok(())
        })
    }

    fn mark_finished(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(mut room) = inner.rooms.get_mut(&room_id) {
                room.status = RoomStatus::Finished;
            }
            Ok(())
        })
    }

    fn set_participant_connected(
        &self,
        room_id: RoomId,
        user_id: PlayerId,
        connected: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(mut room) = inner.rooms.get_mut(&room_id) {
                if let Some(player) = room.players.iter_mut().find(|p| p.user_id == user_id) {
                    player.connected = connected;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use indexmap::IndexMap;

    use super::*;
    use crate::dao::models::SessionStatus;

    fn session(phase: SessionPhase, round: u32) -> SessionEntity {
        let now = SystemTime::now();
        SessionEntity {
            session_id: Uuid::new_v4(),
            room_id: "room-1".into(),
            topic: "general".into(),
            question_ids: vec!["q-1".into(), "q-2".into()],
            current_round: round,
            current_question_id: Some("q-1".into()),
            phase,
            answers: IndexMap::new(),
            guesses: IndexMap::new(),
            scores: IndexMap::from_iter([("alice".into(), 0), ("bob".into(), 0)]),
            ranking: Vec::new(),
            round_history: Vec::new(),
            status: SessionStatus::Active,
            started_at: now,
            round_started_at: Some(now),
            finished_at: None,
            updated_at: now,
            stats: None,
            expires_at: now + Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn duplicate_answer_is_rejected_atomically() {
        let store = MemoryBackend::new();
        let session = session(SessionPhase::Answering, 1);
        let id = session.session_id;
        store.create_session(session).await.unwrap();

        let first = store
            .insert_answer(id, 1, "alice".into(), "Blue".into())
            .await
            .unwrap();
        assert!(matches!(first, ConditionalWrite::Applied(_)));

        let second = store
            .insert_answer(id, 1, "alice".into(), "Red".into())
            .await
            .unwrap();
        assert!(matches!(second, ConditionalWrite::Unmet));

        let stored = store.find_session(id).await.unwrap().unwrap();
        assert_eq!(stored.answers.get("alice").map(String::as_str), Some("Blue"));
        assert_eq!(stored.answers.len(), 1);
    }

    #[tokio::test]
    async fn answer_outside_answering_phase_is_rejected() {
        let store = MemoryBackend::new();
        let session = session(SessionPhase::Guessing, 1);
        let id = session.session_id;
        store.create_session(session).await.unwrap();

        let outcome = store
            .insert_answer(id, 1, "alice".into(), "Blue".into())
            .await
            .unwrap();
        assert!(matches!(outcome, ConditionalWrite::Unmet));
    }

    #[tokio::test]
    async fn concurrent_transitions_resolve_to_one_winner() {
        let store = MemoryBackend::new();
        let session = session(SessionPhase::Answering, 1);
        let id = session.session_id;
        store.create_session(session).await.unwrap();

        let (a, b) = tokio::join!(
            store.apply_transition(id, SessionPhase::Answering, SessionUpdate::open_guessing()),
            store.apply_transition(id, SessionPhase::Answering, SessionUpdate::open_guessing()),
        );
        let applied = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|w| matches!(w, ConditionalWrite::Applied(_)))
            .count();
        assert_eq!(applied, 1);

        let stored = store.find_session(id).await.unwrap().unwrap();
        assert_eq!(stored.phase, SessionPhase::Guessing);
    }

    #[tokio::test]
    async fn expired_session_reads_as_absent() {
        let store = MemoryBackend::new();
        let mut session = session(SessionPhase::Initialized, 0);
        session.expires_at = SystemTime::now() - Duration::from_secs(1);
        let id = session.session_id;
        store.create_session(session).await.unwrap();

        assert!(store.find_session(id).await.unwrap().is_none());
        let outcome = store
            .apply_transition(
                id,
                SessionPhase::Initialized,
                SessionUpdate::start_round(1, "q-1".into(), SystemTime::now()),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ConditionalWrite::Unmet));
    }
}
