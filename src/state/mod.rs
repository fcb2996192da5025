pub mod connections;
pub mod machine;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{catalog::QuestionCatalog, rooms::RoomDirectory, session_store::SessionStore},
    error::ServiceError,
    state::connections::ConnectionRegistry,
};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Storage handles installed together once a backend connects.
#[derive(Clone)]
pub struct Backends {
    /// Session document store.
    pub sessions: Arc<dyn SessionStore>,
    /// Question catalog collaborator.
    pub questions: Arc<dyn QuestionCatalog>,
    /// Room directory collaborator.
    pub rooms: Arc<dyn RoomDirectory>,
}

impl Backends {
    /// Bundle a backend that implements all three storage roles.
    pub fn from_single<B>(backend: B) -> Self
    where
        B: SessionStore + QuestionCatalog + RoomDirectory + Clone + 'static,
    {
        Self {
            sessions: Arc::new(backend.clone()),
            questions: Arc::new(backend.clone()),
            rooms: Arc::new(backend),
        }
    }
}

/// Central application state storing configuration, storage handles, and the
/// connection registry.
pub struct AppState {
    config: AppConfig,
    backends: RwLock<Option<Backends>>,
    connections: ConnectionRegistry,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let connections = ConnectionRegistry::new(
            config.connection_ttl,
            config.push_concurrency,
            config.push_timeout,
        );
        Arc::new(Self {
            config,
            backends: RwLock::new(None),
            connections,
            degraded: degraded_tx,
        })
    }

    /// Construct a state with backends pre-installed; used by tests and the
    /// database-less development mode.
    pub async fn with_backends(config: AppConfig, backends: Backends) -> SharedState {
        let state = Self::new(config);
        state.install_backends(backends).await;
        state
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live WebSocket connections.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Obtain the installed storage handles, if any.
    pub async fn backends(&self) -> Option<Backends> {
        let guard = self.backends.read().await;
        guard.clone()
    }

    /// Obtain the installed storage handles or fail with the degraded-mode
    /// error.
    pub async fn require_backends(&self) -> Result<Backends, ServiceError> {
        self.backends().await.ok_or(ServiceError::Degraded)
    }

    /// Install storage handles and leave degraded mode.
    pub async fn install_backends(&self, backends: Backends) {
        {
            let mut guard = self.backends.write().await;
            *guard = Some(backends);
        }
        self.update_degraded(false);
    }

    /// Remove the storage handles and enter degraded mode.
    pub async fn clear_backends(&self) {
        {
            let mut guard = self.backends.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.backends.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }
}
