//! Gateway server setup
//!
//! Provides the WebSocket server configuration and routes.

mod handler;
mod signal;
mod state;

pub use handler::{chat_handler, ConnectQuery};
pub use signal::shutdown_signal;
pub use state::GatewayState;

use crate::broadcast::{
    EventDispatcher, EventDispatcherConfig, GroupBroker, LocalBroker, RedisBroker,
    SubscriptionRegistry,
};
use axum::{routing::get, Router};
use chat_cache::{Publisher, RedisPool};
use chat_common::{AppConfig, AppError, BrokerKind, JwtService, StoreKind};
use chat_core::{MessageRepository, RoomRepository};
use chat_db::{
    InMemoryMessageRepository, InMemoryRoomRepository, PgMessageRepository, PgRoomRepository,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// How long shutdown waits for sessions to run their cleanup
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/ws/chat/:room_id", get(chat_handler))
        .route("/ws/chat/:room_id/", get(chat_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies and create `GatewayState`
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    let (rooms, messages): (Arc<dyn RoomRepository>, Arc<dyn MessageRepository>) =
        match config.store {
            StoreKind::Postgres => {
                let database = config
                    .database
                    .as_ref()
                    .ok_or_else(|| AppError::Config("DATABASE_URL is not set".to_string()))?;

                tracing::info!("Connecting to PostgreSQL...");
                let pool = chat_db::create_pool(&chat_db::DatabaseConfig::from(database))
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                tracing::info!("PostgreSQL connection established");

                (
                    Arc::new(PgRoomRepository::new(pool.clone())),
                    Arc::new(PgMessageRepository::new(pool)),
                )
            }
            StoreKind::Memory => {
                tracing::warn!("Using in-memory store; rooms start empty");
                (
                    Arc::new(InMemoryRoomRepository::new()),
                    Arc::new(InMemoryMessageRepository::new()),
                )
            }
        };

    let verifier = Arc::new(JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expiry,
    ));

    let registry = SubscriptionRegistry::new_shared();

    let (broker, dispatcher): (Arc<dyn GroupBroker>, Option<Arc<EventDispatcher>>) =
        match config.broker {
            BrokerKind::Local => (Arc::new(LocalBroker::new(registry)), None),
            BrokerKind::Redis => {
                let redis = config
                    .redis
                    .as_ref()
                    .ok_or_else(|| AppError::Config("REDIS_URL is not set".to_string()))?;

                tracing::info!("Connecting to Redis...");
                let pool = RedisPool::from_config(redis).map_err(|e| AppError::Cache(e.to_string()))?;
                pool.health_check()
                    .await
                    .map_err(|e| AppError::Cache(e.to_string()))?;
                tracing::info!("Redis connection established");

                let dispatcher = Arc::new(EventDispatcher::new(
                    EventDispatcherConfig {
                        redis_url: redis.url.clone(),
                        ..EventDispatcherConfig::default()
                    },
                    registry.clone(),
                ));
                dispatcher.clone().start();

                let broker = RedisBroker::new(registry, Publisher::new(pool), dispatcher.clone());
                (Arc::new(broker), Some(dispatcher))
            }
        };

    let state = GatewayState::new(config, verifier, rooms, messages, broker);
    Ok(match dispatcher {
        Some(dispatcher) => state.with_event_dispatcher(dispatcher),
        None => state,
    })
}

/// Serve on an already-bound listener until `signal` resolves.
///
/// On shutdown every open session is closed with GoingAway and given time to
/// unsubscribe before this returns.
pub async fn serve<F>(listener: TcpListener, state: GatewayState, signal: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state.clone());

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            shutdown_state.begin_shutdown();
        })
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    // Upgraded sockets outlive the HTTP server; let them finish cleanup
    state.begin_shutdown();
    let remaining = state.drain_sessions(SESSION_DRAIN_TIMEOUT).await;
    if remaining > 0 {
        tracing::warn!(remaining, "Sessions still running at shutdown");
    }

    if let Some(dispatcher) = state.event_dispatcher() {
        dispatcher.stop().await;
    }

    tracing::info!("Gateway shutdown complete");
    Ok(())
}

/// Run the gateway server
pub async fn run_server(state: GatewayState, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/ws/chat/{{room_id}}", addr);

    serve(listener, state, shutdown_signal()).await
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid gateway address: {e}")))?;

    // Create gateway state
    let state = create_gateway_state(config).await?;

    tracing::info!(broker = state.broker().name(), "Gateway state ready");

    run_server(state, addr).await
}
