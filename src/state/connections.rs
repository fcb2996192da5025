//! Registry of live WebSocket connections and room/user fan-out.
//!
//! Connections are weakly associated with sessions: the registry only knows
//! `(connection, room, user)` triples and how to push to them. Pushes run
//! through a bounded-concurrency group that joins before statistics are
//! returned; a push that fails because the endpoint is gone removes the
//! connection on the spot, so the registry heals itself. Delivery problems
//! are counted, never raised.

use std::time::{Duration, SystemTime};

use axum::extract::ws::Message;
use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::{format_system_time, ws::PushEnvelope};

/// Handle used to push messages to one connected client.
#[derive(Clone)]
pub struct ConnectionHandle {
    /// Identifier assigned at registration.
    pub connection_id: Uuid,
    /// Room the connection is scoped to.
    pub room_id: String,
    /// User behind the connection.
    pub user_id: String,
    /// Registration timestamp.
    pub connected_at: SystemTime,
    /// Absolute expiry after which the connection counts as stale.
    pub expires_at: SystemTime,
    tx: mpsc::Sender<Message>,
}

/// Outcome counters of one fan-out call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastStats {
    /// Connections targeted.
    pub total: usize,
    /// Pushes that reached their writer.
    pub delivered: usize,
    /// Pushes that failed or timed out.
    pub failed: usize,
}

enum PushOutcome {
    Delivered,
    /// The writer side is gone; the connection must be pruned.
    Gone(Uuid),
    TimedOut(Uuid),
}

/// Tracks live connections and pushes events to rooms and users.
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, ConnectionHandle>,
    connection_ttl: Duration,
    push_concurrency: usize,
    push_timeout: Duration,
}

impl ConnectionRegistry {
    /// Create an empty registry with the given fan-out tuning.
    pub fn new(connection_ttl: Duration, push_concurrency: usize, push_timeout: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            connection_ttl,
            push_concurrency: push_concurrency.max(1),
            push_timeout,
        }
    }

    /// Register a connection. Idempotent on the connection id: re-registering
    /// refreshes the sender and expiry but keeps the original timestamps.
    pub fn register(
        &self,
        connection_id: Uuid,
        room_id: String,
        user_id: String,
        tx: mpsc::Sender<Message>,
    ) {
        let now = SystemTime::now();
        let connected_at = self
            .connections
            .get(&connection_id)
            .map(|existing| existing.connected_at)
            .unwrap_or(now);

        self.connections.insert(
            connection_id,
            ConnectionHandle {
                connection_id,
                room_id,
                user_id,
                connected_at,
                expires_at: now + self.connection_ttl,
                tx,
            },
        );
    }

    /// Remove a connection, returning its room/user association when it was
    /// still registered.
    pub fn unregister(&self, connection_id: Uuid) -> Option<(String, String)> {
        self.connections
            .remove(&connection_id)
            .map(|(_, handle)| (handle.room_id, handle.user_id))
    }

    /// Number of currently registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Push an event to every live connection of a room.
    pub async fn broadcast<T: Serialize>(
        &self,
        room_id: &str,
        event: &str,
        payload: &T,
        exclude_user: Option<&str>,
    ) -> BroadcastStats {
        let targets = self.collect_targets(|handle| {
            handle.room_id == room_id && exclude_user != Some(handle.user_id.as_str())
        });
        self.push_to_targets(event, payload, targets).await
    }

    /// Push an event to every live connection of one user, across rooms.
    pub async fn send_to_user<T: Serialize>(
        &self,
        user_id: &str,
        event: &str,
        payload: &T,
    ) -> BroadcastStats {
        let targets = self.collect_targets(|handle| handle.user_id == user_id);
        self.push_to_targets(event, payload, targets).await
    }

    /// Snapshot the live senders matching `filter`, pruning expired entries
    /// encountered along the way.
    fn collect_targets(
        &self,
        filter: impl Fn(&ConnectionHandle) -> bool,
    ) -> Vec<(Uuid, mpsc::Sender<Message>)> {
        let now = SystemTime::now();
        let mut expired = Vec::new();
        let targets: Vec<_> = self
            .connections
            .iter()
            .filter_map(|entry| {
                let handle = entry.value();
                if handle.expires_at <= now {
                    expired.push(handle.connection_id);
                    return None;
                }
                filter(handle).then(|| (handle.connection_id, handle.tx.clone()))
            })
            .collect();

        for connection_id in expired {
            self.connections.remove(&connection_id);
            debug!(connection_id = %connection_id, "pruned expired connection");
        }

        targets
    }

    async fn push_to_targets<T: Serialize>(
        &self,
        event: &str,
        payload: &T,
        targets: Vec<(Uuid, mpsc::Sender<Message>)>,
    ) -> BroadcastStats {
        let mut stats = BroadcastStats {
            total: targets.len(),
            ..BroadcastStats::default()
        };
        if targets.is_empty() {
            return stats;
        }

        let envelope = PushEnvelope {
            event,
            timestamp: format_system_time(SystemTime::now()),
            data: payload,
        };
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(err) => {
                warn!(event, error = %err, "failed to serialize push payload");
                stats.failed = stats.total;
                return stats;
            }
        };

        let push_timeout = self.push_timeout;
        let outcomes: Vec<PushOutcome> = futures::stream::iter(targets)
            .map(|(connection_id, tx)| {
                let message = Message::Text(text.clone().into());
                async move {
                    match timeout(push_timeout, tx.send(message)).await {
                        Ok(Ok(())) => PushOutcome::Delivered,
                        Ok(Err(_)) => PushOutcome::Gone(connection_id),
                        Err(_) => PushOutcome::TimedOut(connection_id),
                    }
                }
            })
            .buffer_unordered(self.push_concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                PushOutcome::Delivered => stats.delivered += 1,
                PushOutcome::Gone(connection_id) => {
                    stats.failed += 1;
                    self.connections.remove(&connection_id);
                    debug!(connection_id = %connection_id, event, "removed dead connection");
                }
                PushOutcome::TimedOut(connection_id) => {
                    stats.failed += 1;
                    warn!(connection_id = %connection_id, event, "push timed out");
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(Duration::from_secs(60), 8, Duration::from_millis(200))
    }

    fn channel() -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
        mpsc::channel(8)
    }

    #[derive(Serialize)]
    struct Payload {
        round: u32,
    }

    #[tokio::test]
    async fn broadcast_reports_and_prunes_dead_connections() {
        let registry = registry();
        let (live_tx, mut live_rx) = channel();
        let (dead_tx, dead_rx) = channel();
        drop(dead_rx);

        registry.register(Uuid::new_v4(), "room-1".into(), "alice".into(), live_tx);
        registry.register(Uuid::new_v4(), "room-1".into(), "bob".into(), dead_tx);

        let stats = registry
            .broadcast("room-1", "round_started", &Payload { round: 1 }, None)
            .await;
        assert_eq!(
            stats,
            BroadcastStats {
                total: 2,
                delivered: 1,
                failed: 1
            }
        );
        assert_eq!(registry.len(), 1);

        let stats = registry
            .broadcast("room-1", "round_started", &Payload { round: 1 }, None)
            .await;
        assert_eq!(
            stats,
            BroadcastStats {
                total: 1,
                delivered: 1,
                failed: 0
            }
        );

        let Some(Message::Text(text)) = live_rx.recv().await else {
            panic!("expected a text push");
        };
        let envelope: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(envelope["event"], "round_started");
        assert_eq!(envelope["data"]["round"], 1);
        assert!(envelope["timestamp"].is_string());
    }

    #[tokio::test]
    async fn broadcast_is_scoped_to_the_room_and_excludes_users() {
        let registry = registry();
        let (alice_tx, mut alice_rx) = channel();
        let (bob_tx, mut bob_rx) = channel();
        let (carol_tx, mut carol_rx) = channel();

        registry.register(Uuid::new_v4(), "room-1".into(), "alice".into(), alice_tx);
        registry.register(Uuid::new_v4(), "room-1".into(), "bob".into(), bob_tx);
        registry.register(Uuid::new_v4(), "room-2".into(), "carol".into(), carol_tx);

        let stats = registry
            .broadcast("room-1", "phase_changed", &Payload { round: 2 }, Some("bob"))
            .await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.delivered, 1);

        assert!(alice_rx.recv().await.is_some());
        assert!(bob_rx.try_recv().is_err());
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_user_hits_every_connection_of_that_user() {
        let registry = registry();
        let (first_tx, mut first_rx) = channel();
        let (second_tx, mut second_rx) = channel();
        let (other_tx, mut other_rx) = channel();

        registry.register(Uuid::new_v4(), "room-1".into(), "alice".into(), first_tx);
        registry.register(Uuid::new_v4(), "room-2".into(), "alice".into(), second_tx);
        registry.register(Uuid::new_v4(), "room-1".into(), "bob".into(), other_tx);

        let stats = registry
            .send_to_user("alice", "pong", &Payload { round: 0 })
            .await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.delivered, 2);
        assert!(first_rx.recv().await.is_some());
        assert!(second_rx.recv().await.is_some());
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn register_is_idempotent_per_connection_id() {
        let registry = registry();
        let connection_id = Uuid::new_v4();
        let (first_tx, _first_rx) = channel();
        let (second_tx, mut second_rx) = channel();

        registry.register(connection_id, "room-1".into(), "alice".into(), first_tx);
        registry.register(connection_id, "room-1".into(), "alice".into(), second_tx);
        assert_eq!(registry.len(), 1);

        registry
            .broadcast("room-1", "phase_changed", &Payload { round: 1 }, None)
            .await;
        assert!(second_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn expired_connections_are_skipped_and_pruned() {
        let registry = ConnectionRegistry::new(Duration::ZERO, 8, Duration::from_millis(200));
        let (tx, mut rx) = channel();
        registry.register(Uuid::new_v4(), "room-1".into(), "alice".into(), tx);

        let stats = registry
            .broadcast("room-1", "round_started", &Payload { round: 1 }, None)
            .await;
        assert_eq!(stats.total, 0);
        assert!(registry.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
