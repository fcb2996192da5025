use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Errors raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The client could not be constructed from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The initial ping never succeeded.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made before giving up.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A health-check ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Index description.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A session document could not be written.
    #[error("failed to save session `{id}`")]
    SaveSession {
        /// Session primary key.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A session document could not be read.
    #[error("failed to load session `{id}`")]
    LoadSession {
        /// Session primary key.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A conditional session update could not be executed.
    #[error("failed to update session `{id}`")]
    UpdateSession {
        /// Session primary key.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A question document could not be read.
    #[error("failed to load question `{id}`")]
    LoadQuestion {
        /// Question primary key.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The topic pool query failed.
    #[error("failed to list questions for topic `{topic}`")]
    ListQuestions {
        /// Requested topic.
        topic: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The usage counter update failed.
    #[error("failed to update question `{id}`")]
    UpdateQuestion {
        /// Question primary key.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A room document could not be read.
    #[error("failed to load room `{id}`")]
    LoadRoom {
        /// Room primary key.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A room document could not be updated.
    #[error("failed to update room `{id}`")]
    UpdateRoom {
        /// Room primary key.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A value could not be converted to its BSON representation.
    #[error("failed to serialize `{context}` to BSON")]
    Serialize {
        /// What was being converted.
        context: &'static str,
        /// BSON serializer error.
        #[source]
        source: mongodb::bson::error::Error,
    },
}
