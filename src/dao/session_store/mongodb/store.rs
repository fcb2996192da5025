use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, Document, doc, serialize_to_bson},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoSessionDocument, session_doc_id},
};
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

const SESSION_COLLECTION_NAME: &str = "sessions";
const ROOM_COLLECTION_NAME: &str = "rooms";
const QUESTION_COLLECTION_NAME: &str = "questions";

/// MongoDB-backed implementation of the three storage roles.
///
/// Conditional writes are expressed as filtered `findOneAndUpdate` calls, so
/// the precondition and the mutation execute as one server-side step.
#[derive(Clone)]
pub struct MongoBackend {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoBackend {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let backend = Self { inner };
        backend.ensure_indexes().await?;
        Ok(backend)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Expired sessions are reaped by the server through the TTL index;
        // reads additionally treat stale documents as absent.
        let sessions = database.collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME);
        let ttl_index = IndexModel::builder()
            .keys(doc! {"ttl_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_ttl_idx".to_owned()))
                    .expire_after(Some(std::time::Duration::ZERO))
                    .build(),
            )
            .build();
        sessions
            .create_index(ttl_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "ttl_at",
                source,
            })?;
        let room_index = IndexModel::builder()
            .keys(doc! {"room_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_room_idx".to_owned()))
                    .build(),
            )
            .build();
        sessions
            .create_index(room_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "room_id",
                source,
            })?;

        let rooms = database.collection::<RoomEntity>(ROOM_COLLECTION_NAME);
        let rooms_index = IndexModel::builder()
            .keys(doc! {"room_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_id_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        rooms
            .create_index(rooms_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "room_id",
                source,
            })?;

        let questions = database.collection::<QuestionEntity>(QUESTION_COLLECTION_NAME);
        let topic_index = IndexModel::builder()
            .keys(doc! {"topic": 1, "active": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("question_topic_idx".to_owned()))
                    .build(),
            )
            .build();
        questions
            .create_index(topic_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: QUESTION_COLLECTION_NAME,
                index: "topic,active",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        self.database().await.collection(SESSION_COLLECTION_NAME)
    }

    async fn rooms(&self) -> Collection<RoomEntity> {
        self.database().await.collection(ROOM_COLLECTION_NAME)
    }

    async fn questions(&self) -> Collection<QuestionEntity> {
        self.database().await.collection(QUESTION_COLLECTION_NAME)
    }
}

/// Render a conditional-update result, discarding documents past expiry.
fn into_conditional(found: Option<MongoSessionDocument>, now: SystemTime) -> ConditionalWrite {
    match found {
        Some(document) if document.session.expires_at > now => {
            ConditionalWrite::Applied(document.session)
        }
        _ => ConditionalWrite::Unmet,
    }
}

/// Translate a [`SessionUpdate`] into `$set`/`$push` clauses.
fn update_document(update: &SessionUpdate, now: SystemTime) -> MongoResult<Document> {
    let mut set = Document::new();
    if let Some(phase) = update.phase {
        set.insert("phase", phase.as_str());
    }
    if let Some(round) = update.current_round {
        set.insert("current_round", i64::from(round));
    }
    if let Some(ref question_id) = update.current_question_id {
        set.insert("current_question_id", question_id.as_str());
    }
    if update.clear_submissions {
        set.insert("answers", Document::new());
        set.insert("guesses", Document::new());
    }
    if let Some(at) = update.round_started_at {
        set.insert("round_started_at", bson_value("round_started_at", &at)?);
    }
    if let Some(ref scores) = update.scores {
        set.insert("scores", bson_value("scores", scores)?);
    }
    if let Some(ref ranking) = update.ranking {
        set.insert("ranking", bson_value("ranking", ranking)?);
    }
    if let Some(status) = update.status {
        set.insert("status", bson_value("status", &status)?);
    }
    if let Some(ref stats) = update.stats {
        set.insert("stats", bson_value("stats", stats)?);
    }
    if let Some(at) = update.finished_at {
        set.insert("finished_at", bson_value("finished_at", &at)?);
    }
    set.insert("updated_at", bson_value("updated_at", &now)?);

    let mut document = doc! {"$set": set};
    if let Some(ref record) = update.push_round_record {
        document.insert(
            "$push",
            doc! {"round_history": bson_value("round_history", record)?},
        );
    }
    Ok(document)
}

fn bson_value<T: serde::Serialize>(context: &'static str, value: &T) -> MongoResult<Bson> {
    serialize_to_bson(value).map_err(|source| MongoDaoError::Serialize { context, source })
}

impl SessionStore for MongoBackend {
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let id = session.session_id;
            let document = MongoSessionDocument::from(session);
            backend
                .sessions()
                .await
                .replace_one(doc! {"_id": &document.id}, &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::SaveSession { id, source })?;
            Ok(())
        })
    }

    fn find_session(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let backend = self.clone();
        Box::pin(async move {
            let found = backend
                .sessions()
                .await
                .find_one(doc! {"_id": session_doc_id(session_id)})
                .await
                .map_err(|source| MongoDaoError::LoadSession {
                    id: session_id,
                    source,
                })?;

            match found {
                Some(document) if document.session.expires_at > SystemTime::now() => {
                    Ok(Some(document.session))
                }
                _ => Ok(None),
            }
        })
    }

    fn insert_answer(
        &self,
        session_id: Uuid,
        round: u32,
        player_id: PlayerId,
        option: ChosenOption,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>> {
        let backend = self.clone();
        Box::pin(async move {
            let now = SystemTime::now();
            let mut filter = doc! {
                "_id": session_doc_id(session_id),
                "phase": SessionPhase::Answering.as_str(),
                "current_round": i64::from(round),
            };
            filter.insert(format!("answers.{player_id}"), doc! {"$exists": false});

            let mut set = Document::new();
            set.insert(format!("answers.{player_id}"), option);
            set.insert("updated_at", bson_value("updated_at", &now)?);

            let found = backend
                .sessions()
                .await
                .find_one_and_update(filter, doc! {"$set": set})
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::UpdateSession {
                    id: session_id,
                    source,
                })?;

            Ok(into_conditional(found, now))
        })
    }

    fn insert_guess(
        &self,
        session_id: Uuid,
        round: u32,
        guesser_id: PlayerId,
        guess: GuessEntity,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>> {
        let backend = self.clone();
        Box::pin(async move {
            let now = SystemTime::now();
            let mut filter = doc! {
                "_id": session_doc_id(session_id),
                "phase": SessionPhase::Guessing.as_str(),
                "current_round": i64::from(round),
            };
            filter.insert(format!("guesses.{guesser_id}"), doc! {"$exists": false});

            let mut set = Document::new();
            set.insert(format!("guesses.{guesser_id}"), bson_value("guess", &guess)?);
            set.insert("updated_at", bson_value("updated_at", &now)?);

            let found = backend
                .sessions()
                .await
                .find_one_and_update(filter, doc! {"$set": set})
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::UpdateSession {
                    id: session_id,
                    source,
                })?;

            Ok(into_conditional(found, now))
        })
    }

    fn apply_transition(
        &self,
        session_id: Uuid,
        expected: SessionPhase,
        update: SessionUpdate,
    ) -> BoxFuture<'static, StorageResult<ConditionalWrite>> {
        let backend = self.clone();
        Box::pin(async move {
            let now = SystemTime::now();
            let filter = doc! {
                "_id": session_doc_id(session_id),
                "phase": expected.as_str(),
            };
            let update = update_document(&update, now)?;

            let found = backend
                .sessions()
                .await
                .find_one_and_update(filter, update)
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::UpdateSession {
                    id: session_id,
                    source,
                })?;

            Ok(into_conditional(found, now))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ping().await?;
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.reconnect().await?;
            Ok(())
        })
    }
}

impl QuestionCatalog for MongoBackend {
    fn find_question(
        &self,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let backend = self.clone();
        Box::pin(async move {
            let found = backend
                .questions()
                .await
                .find_one(doc! {"question_id": &question_id})
                .await
                .map_err(|source| MongoDaoError::LoadQuestion {
                    id: question_id,
                    source,
                })?;
            Ok(found)
        })
    }

    fn list_active_by_topic(
        &self,
        topic: String,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let backend = self.clone();
        Box::pin(async move {
            let cursor = backend
                .questions()
                .await
                .find(doc! {"topic": &topic, "active": true})
                .await
                .map_err(|source| MongoDaoError::ListQuestions {
                    topic: topic.clone(),
                    source,
                })?;
            let questions = cursor
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::ListQuestions { topic, source })?;
            Ok(questions)
        })
    }

    fn increment_usage(&self, question_id: QuestionId) -> BoxFuture<'static, StorageResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend
                .questions()
                .await
                .update_one(
                    doc! {"question_id": &question_id},
                    doc! {"$inc": {"times_used": 1_i64}},
                )
                .await
                .map_err(|source| MongoDaoError::UpdateQuestion {
                    id: question_id,
                    source,
                })?;
            Ok(())
        })
    }
}

impl RoomDirectory for MongoBackend {
    fn find_room(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let backend = self.clone();
        Box::pin(async move {
            let found = backend
                .rooms()
                .await
                .find_one(doc! {"room_id": &room_id})
                .await
                .map_err(|source| MongoDaoError::LoadRoom {
                    id: room_id,
                    source,
                })?;
            Ok(found)
        })
    }

    fn mark_in_game(
        &self,
        room_id: RoomId,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend
                .rooms()
                .await
                .update_one(
                    doc! {"room_id": &room_id},
                    doc! {"$set": {
                        "status": RoomStatus::InGame.as_str(),
                        "session_id": session_id.to_string(),
                    }},
                )
                .await
                .map_err(|source| MongoDaoError::UpdateRoom {
                    id: room_id,
                    source,
                })?;
            Ok(())
        })
    }

    fn mark_finished(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend
                .rooms()
                .await
                .update_one(
                    doc! {"room_id": &room_id},
                    doc! {"$set": {"status": RoomStatus::Finished.as_str()}},
                )
                .await
                .map_err(|source| MongoDaoError::UpdateRoom {
                    id: room_id,
                    source,
                })?;
            Ok(())
        })
    }

    fn set_participant_connected(
        &self,
        room_id: RoomId,
        user_id: PlayerId,
        connected: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend
                .rooms()
                .await
                .update_one(
                    doc! {"room_id": &room_id},
                    doc! {"$set": {"players.$[seat].connected": connected}},
                )
                .array_filters(vec![doc! {"seat.user_id": &user_id}])
                .await
                .map_err(|source| MongoDaoError::UpdateRoom {
                    id: room_id,
                    source,
                })?;
            Ok(())
        })
    }
}
