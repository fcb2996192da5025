/// Question catalog collaborator abstraction.
pub mod catalog;
/// Database model definitions.
pub mod models;
/// Room directory collaborator abstraction.
pub mod rooms;
/// Session storage and conditional-write operations.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
