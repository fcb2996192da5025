use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{PlayerId, RoomEntity, RoomId},
    storage::StorageResult,
};

/// Access to room membership, host identity, and configuration.
///
/// An external collaborator; the core only reads rooms and flips their
/// lifecycle status around match boundaries.
pub trait RoomDirectory: Send + Sync {
    /// Fetch a room by id.
    fn find_room(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Mark the room as in-game and attach the session that runs in it.
    fn mark_in_game(
        &self,
        room_id: RoomId,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Mark the room as finished once its match ends.
    fn mark_finished(&self, room_id: RoomId) -> BoxFuture<'static, StorageResult<()>>;

    /// Flip a participant's connected flag. The seat and score persist either
    /// way.
    fn set_participant_connected(
        &self,
        room_id: RoomId,
        user_id: PlayerId,
        connected: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;
}
