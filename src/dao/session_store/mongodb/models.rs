use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::SessionEntity;

/// Stored shape of a session document.
///
/// The entity is flattened next to the string primary key and a BSON-date
/// mirror of the expiry, which the TTL index reaps on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    /// Primary key (`session_id` rendered as a string).
    #[serde(rename = "_id")]
    pub id: String,
    /// BSON date mirror of `expires_at`, targeted by the TTL index.
    pub ttl_at: DateTime,
    /// The session itself.
    #[serde(flatten)]
    pub session: SessionEntity,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(session: SessionEntity) -> Self {
        Self {
            id: session.session_id.to_string(),
            ttl_at: DateTime::from_system_time(session.expires_at),
            session,
        }
    }
}

/// Render a session id the way it is stored in `_id`.
pub fn session_doc_id(session_id: Uuid) -> String {
    session_id.to_string()
}
