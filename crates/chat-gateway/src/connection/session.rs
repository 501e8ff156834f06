//! Connection session
//!
//! Drives one connection through its lifecycle: verify the credential, check
//! membership, subscribe, then ingest and publish frames until the transport
//! closes. Cleanup (unsubscribe) runs on every exit from `Open`, including
//! when the session future itself is dropped.

use super::{Connection, SessionState};
use crate::broadcast::GroupBroker;
use crate::handlers::{Credential, IdentifyHandler, IngestError, MembershipGuard, MessageIngestor};
use crate::protocol::{ChatFrame, CloseCode};
use axum::extract::ws::{CloseFrame, Message};
use chat_common::SessionConfig;
use chat_core::{Identity, IdentityVerifier, RoomId};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// How long the writer may take to flush and send the close frame
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionContext {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub guard: MembershipGuard,
    pub ingestor: MessageIngestor,
    pub broker: Arc<dyn GroupBroker>,
    pub config: SessionConfig,
    /// Flips to `true` when the server shuts down
    pub shutdown: watch::Receiver<bool>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("broker", &self.broker.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Refused before subscribing
    Rejected(CloseCode),
    /// Was open; `None` when the client closed or the transport failed
    Closed(Option<CloseCode>),
}

/// One connection's state machine
pub struct ConnectionSession {
    ctx: SessionContext,
    connection: Arc<Connection>,
    room_id: RoomId,
    credential: Credential,
}

impl ConnectionSession {
    pub fn new(ctx: SessionContext, room_id: RoomId, credential: Credential) -> Self {
        let connection = Connection::new(ctx.config.outbound_queue_capacity);
        Self {
            ctx,
            connection,
            room_id,
            credential,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Run the session to completion over a split transport
    pub async fn run<W, R, E>(self, mut sink: W, stream: R) -> SessionOutcome
    where
        W: Sink<Message> + Unpin + Send + 'static,
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let conn_id = self.connection.id();
        self.advance(SessionState::Authenticating);

        let identity = match IdentifyHandler::handle(&*self.ctx.verifier, &self.credential) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::info!(
                    connection_id = %conn_id,
                    room_id = %self.room_id,
                    reason = e.code(),
                    "Authentication failed"
                );
                return self.reject(&mut sink, CloseCode::AuthenticationFailed).await;
            }
        };
        self.connection.attach_identity(identity.clone());
        self.advance(SessionState::Authorizing);

        if !self.ctx.guard.authorize(&identity, self.room_id).await {
            tracing::info!(
                connection_id = %conn_id,
                room_id = %self.room_id,
                user_id = %identity.id(),
                "Access denied"
            );
            return self.reject(&mut sink, CloseCode::AccessDenied).await;
        }

        let cleanup = SubscriptionGuard::new(&self.ctx.broker, &self.connection, self.room_id);
        if let Err(e) = self.ctx.broker.subscribe(self.room_id, &self.connection).await {
            tracing::warn!(
                connection_id = %conn_id,
                room_id = %self.room_id,
                error = %e,
                "Subscribe failed"
            );
            cleanup.disarm();
            return self.reject(&mut sink, CloseCode::UnknownError).await;
        }
        self.connection.set_room(Some(self.room_id));
        self.advance(SessionState::Open);

        tracing::info!(
            connection_id = %conn_id,
            room_id = %self.room_id,
            user_id = %identity.id(),
            "Session open"
        );

        let code = self.run_open(sink, stream, identity).await;

        self.advance(SessionState::Closing);
        if let Err(e) = self
            .ctx
            .broker
            .unsubscribe(self.room_id, conn_id)
            .await
        {
            tracing::warn!(
                connection_id = %conn_id,
                room_id = %self.room_id,
                error = %e,
                "Unsubscribe failed"
            );
        }
        self.connection.set_room(None);
        self.advance(SessionState::Closed);
        cleanup.disarm();

        tracing::info!(
            connection_id = %conn_id,
            room_id = %self.room_id,
            close_code = ?code,
            "Session closed"
        );

        SessionOutcome::Closed(code)
    }

    /// The `Open` phase; returns the close code the server sends, if any
    async fn run_open<W, R, E>(&self, sink: W, stream: R, identity: Identity) -> Option<CloseCode>
    where
        W: Sink<Message> + Unpin + Send + 'static,
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let (close_tx, close_rx) = oneshot::channel();

        let mut reader = AbortOnDrop(tokio::spawn(read_loop(
            self.ctx.clone(),
            self.connection.clone(),
            identity,
            self.room_id,
            stream,
        )));
        let mut writer = AbortOnDrop(tokio::spawn(write_loop(
            self.connection.clone(),
            sink,
            self.ctx.config.ping_interval(),
            close_rx,
        )));
        let mut shutdown = self.ctx.shutdown.clone();

        let code = tokio::select! {
            _ = &mut reader.0 => None,
            _ = &mut writer.0 => None,
            () = idle_watchdog(&self.connection, self.ctx.config.idle_timeout()) => {
                tracing::info!(
                    connection_id = %self.connection.id(),
                    idle_ms = self.connection.idle_for().as_millis(),
                    "Connection idle, closing"
                );
                Some(CloseCode::SessionTimeout)
            }
            () = wait_for_shutdown(&mut shutdown) => Some(CloseCode::GoingAway),
        };

        // Cancels any ingestion still in flight
        reader.0.abort();

        let _ = close_tx.send(code);
        self.connection.close_outbound();
        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer.0).await.is_err() {
            writer.0.abort();
        }

        code
    }

    async fn reject<W>(&self, sink: &mut W, code: CloseCode) -> SessionOutcome
    where
        W: Sink<Message> + Unpin,
    {
        self.advance(SessionState::Rejected);
        self.connection.close_outbound();
        let _ = sink.send(Message::Close(Some(close_frame(code)))).await;
        let _ = sink.close().await;
        SessionOutcome::Rejected(code)
    }

    fn advance(&self, next: SessionState) {
        if let Err(e) = self.connection.transition(next) {
            tracing::warn!(connection_id = %self.connection.id(), error = %e, "Unexpected transition");
        }
    }
}

/// Aborts the task when the owning session goes away
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Releases the subscription if the session is dropped before its own cleanup ran
struct SubscriptionGuard {
    broker: Arc<dyn GroupBroker>,
    connection: Arc<Connection>,
    room_id: RoomId,
    armed: bool,
}

impl SubscriptionGuard {
    fn new(broker: &Arc<dyn GroupBroker>, connection: &Arc<Connection>, room_id: RoomId) -> Self {
        Self {
            broker: broker.clone(),
            connection: connection.clone(),
            room_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let conn_id = self.connection.id();
        self.broker.registry().unsubscribe(self.room_id, conn_id);
        self.connection.close_outbound();
        self.connection.set_room(None);
        if self.connection.state() == SessionState::Open {
            let _ = self.connection.transition(SessionState::Closing);
        }
        if self.connection.state() == SessionState::Closing {
            let _ = self.connection.transition(SessionState::Closed);
        }

        tracing::info!(
            connection_id = %conn_id,
            room_id = %self.room_id,
            "Session cancelled, subscription released"
        );

        // The registry entry is gone; the broker may still hold the room's channel
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let broker = self.broker.clone();
            let room_id = self.room_id;
            runtime.spawn(async move {
                if let Err(e) = broker.unsubscribe(room_id, conn_id).await {
                    tracing::warn!(room_id = %room_id, error = %e, "Unsubscribe failed");
                }
            });
        }
    }
}

fn close_frame(code: CloseCode) -> CloseFrame<'static> {
    CloseFrame {
        code: code.as_u16(),
        reason: code.name().into(),
    }
}

async fn read_loop<R, E>(
    ctx: SessionContext,
    connection: Arc<Connection>,
    identity: Identity,
    room_id: RoomId,
    mut stream: R,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(msg) = stream.next().await {
        connection.touch();
        match msg {
            Ok(Message::Text(text)) => {
                handle_text(&ctx, &connection, &identity, room_id, &text).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection_id = %connection.id(), "Binary frame dropped");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                tracing::trace!(connection_id = %connection.id(), "Ping/pong received");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection.id(), "Client closed connection");
                return;
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection.id(), error = %e, "WebSocket error");
                return;
            }
        }
    }
}

async fn handle_text(
    ctx: &SessionContext,
    connection: &Connection,
    identity: &Identity,
    room_id: RoomId,
    text: &str,
) {
    match ctx.ingestor.ingest(identity, room_id, text).await {
        Ok(Some(message)) => {
            let frame = ChatFrame::from_message(&message, identity);
            if let Err(e) = ctx.broker.publish(room_id, &frame).await {
                tracing::warn!(
                    connection_id = %connection.id(),
                    room_id = %room_id,
                    message_id = %message.id,
                    error = %e,
                    "Failed to publish message"
                );
            }
        }
        Ok(None) => {
            tracing::trace!(connection_id = %connection.id(), "Empty message dropped");
        }
        Err(e @ IngestError::BadFrame(_)) => {
            tracing::debug!(connection_id = %connection.id(), error = %e, "Frame dropped");
        }
        Err(e @ IngestError::Persistence(_)) => {
            tracing::warn!(
                connection_id = %connection.id(),
                room_id = %room_id,
                error = %e,
                "Message dropped"
            );
        }
    }
}

async fn write_loop<W>(
    connection: Arc<Connection>,
    mut sink: W,
    ping_interval: Duration,
    close_rx: oneshot::Receiver<Option<CloseCode>>,
) where
    W: Sink<Message> + Unpin,
{
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = connection.next_outbound() => {
                let Some(json) = frame else { break };
                if sink.send(Message::Text(json.to_string())).await.is_err() {
                    tracing::debug!(connection_id = %connection.id(), "Send failed");
                    return;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
            }
        }
    }

    // Outbound queue closed and drained
    if let Ok(Some(code)) = close_rx.await {
        let _ = sink.send(Message::Close(Some(close_frame(code)))).await;
    }
    let _ = sink.close().await;
}

/// Resolves once nothing has arrived for `timeout`
async fn idle_watchdog(connection: &Connection, timeout: Duration) {
    loop {
        let idle = connection.idle_for();
        if idle >= timeout {
            return;
        }
        tokio::time::sleep(timeout - idle).await;
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without signalling: never shut down from here
            std::future::pending::<()>().await;
        }
    }
}
