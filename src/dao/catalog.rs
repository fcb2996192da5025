use futures::future::BoxFuture;

use crate::dao::{
    models::{QuestionEntity, QuestionId},
    storage::StorageResult,
};

/// Read-mostly access to the question bank.
///
/// The catalog is an external collaborator: records are immutable apart from
/// the best-effort usage counter, and no operation here participates in the
/// session's conditional-write protocol.
pub trait QuestionCatalog: Send + Sync {
    /// Fetch a question by id.
    fn find_question(
        &self,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;

    /// List the active questions of a topic, the pool matches sample from.
    fn list_active_by_topic(
        &self,
        topic: String,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;

    /// Increment the usage counter of a question. Best-effort; callers fire
    /// and forget.
    fn increment_usage(&self, question_id: QuestionId) -> BoxFuture<'static, StorageResult<()>>;
}
