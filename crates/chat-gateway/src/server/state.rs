//! Gateway state
//!
//! Application state for the gateway server.

use crate::broadcast::{EventDispatcher, GroupBroker, SubscriptionRegistry};
use crate::connection::SessionContext;
use crate::handlers::{MembershipGuard, MessageIngestor};
use chat_common::AppConfig;
use chat_core::{IdentityVerifier, MessageRepository, RoomRepository};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server.
#[derive(Clone)]
pub struct GatewayState {
    /// Collaborators handed to every session
    session_context: SessionContext,
    /// Set to `true` to close every open session with GoingAway
    shutdown_tx: Arc<watch::Sender<bool>>,
    /// Sessions whose socket task is still running
    active_sessions: Arc<AtomicUsize>,
    /// Present with the Redis broker
    event_dispatcher: Option<Arc<EventDispatcher>>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(
        config: AppConfig,
        verifier: Arc<dyn IdentityVerifier>,
        rooms: Arc<dyn RoomRepository>,
        messages: Arc<dyn MessageRepository>,
        broker: Arc<dyn GroupBroker>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let session_context = SessionContext {
            verifier,
            guard: MembershipGuard::new(rooms.clone()),
            ingestor: MessageIngestor::new(messages, rooms),
            broker,
            config: config.session.clone(),
            shutdown: shutdown_rx,
        };

        Self {
            session_context,
            shutdown_tx: Arc::new(shutdown_tx),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            event_dispatcher: None,
            config: Arc::new(config),
        }
    }

    /// Attach the dispatcher feeding the registry from Redis
    pub fn with_event_dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.event_dispatcher = Some(dispatcher);
        self
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.session_context
    }

    pub fn broker(&self) -> &dyn GroupBroker {
        &*self.session_context.broker
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        self.session_context.broker.registry()
    }

    pub fn event_dispatcher(&self) -> Option<&Arc<EventDispatcher>> {
        self.event_dispatcher.as_ref()
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Signal every open session to close
    pub fn begin_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Count a session until the returned guard drops
    pub(crate) fn track_session(&self) -> ActiveSession {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        ActiveSession(self.active_sessions.clone())
    }

    /// Wait for running sessions to finish, up to `timeout`.
    ///
    /// Returns the number still running when it gave up.
    pub async fn drain_sessions(&self, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.active_sessions() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        self.active_sessions()
    }
}

/// Decrements the active session count on drop
pub(crate) struct ActiveSession(Arc<AtomicUsize>);

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("broker", &self.broker().name())
            .field("active_sessions", &self.active_sessions())
            .field("config", &"AppConfig")
            .finish()
    }
}
