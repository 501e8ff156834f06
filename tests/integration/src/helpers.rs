//! Test helpers for integration tests
//!
//! Provides a gateway bound to an ephemeral port with in-memory stores, and a
//! thin WebSocket client for driving it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chat_common::{AppConfig, AppError, JwtService};
use chat_core::UserId;
use chat_db::{InMemoryMessageRepository, InMemoryRoomRepository};
use chat_gateway::broadcast::{LocalBroker, SubscriptionRegistry};
use chat_gateway::protocol::ChatFrame;
use chat_gateway::{serve, GatewayState};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Secret shared by the test server and the tokens the tests mint
pub const TEST_JWT_SECRET: &str = "integration-test-secret-that-is-long-enough";

/// How long a client waits for an expected frame
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: GatewayState,
    pub rooms: Arc<InMemoryRoomRepository>,
    pub messages: Arc<InMemoryMessageRepository>,
    pub jwt: JwtService,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), AppError>>,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()?).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let jwt = JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry);
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let broker = Arc::new(LocalBroker::new(SubscriptionRegistry::new_shared()));

        let state = GatewayState::new(
            config,
            Arc::new(jwt.clone()),
            rooms.clone(),
            messages.clone(),
            broker,
        );

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, state.clone(), async move {
            let _ = shutdown_rx.await;
        }));

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            state,
            rooms,
            messages,
            jwt,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL for a room, with the token in the query string
    pub fn ws_url(&self, room: &str, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws/chat/{room}?token={token}", self.addr),
            None => format!("ws://{}/ws/chat/{room}", self.addr),
        }
    }

    /// Mint an access token for a user
    pub fn token_for(&self, user_id: i64, username: &str) -> Result<String> {
        Ok(self
            .jwt
            .issue_access_token(UserId::new(user_id), Some(username))?)
    }

    /// Connect to a room with a query-string token
    pub async fn connect(&self, room: i64, token: &str) -> Result<TestClient> {
        TestClient::connect(&self.ws_url(&room.to_string(), Some(token)), None).await
    }

    /// Connect to a room with a bearer token in the `Authorization` header
    pub async fn connect_with_header(&self, room: i64, token: &str) -> Result<TestClient> {
        TestClient::connect(&self.ws_url(&room.to_string(), None), Some(token)).await
    }

    /// Connect as a member that the room already knows about
    pub async fn join(&self, room: i64, user_id: i64, username: &str) -> Result<TestClient> {
        let token = self.token_for(user_id, username)?;
        let client = self.connect(room, &token).await?;
        self.wait_for_subscribers(room, self.subscriber_count(room) + 1)
            .await?;
        Ok(client)
    }

    /// Number of connections subscribed to a room
    pub fn subscriber_count(&self, room: i64) -> usize {
        self.state
            .registry()
            .subscriber_count(chat_core::RoomId::new(room))
    }

    /// Wait until a room has exactly `expected` subscribers
    pub async fn wait_for_subscribers(&self, room: i64, expected: usize) -> Result<()> {
        let reached = wait_until(FRAME_TIMEOUT, || self.subscriber_count(room) == expected).await;
        if reached {
            Ok(())
        } else {
            bail!(
                "room {room} has {} subscribers, expected {expected}",
                self.subscriber_count(room)
            )
        }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Trigger graceful shutdown and wait for the server to finish draining
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(15), &mut self.handle)
            .await
            .map_err(|_| anyhow!("server did not shut down in time"))???;
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// WebSocket client connected to the gateway
pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Open a connection; `bearer` goes into the `Authorization` header
    pub async fn connect(url: &str, bearer: Option<&str>) -> Result<Self> {
        let mut request = url.into_client_request()?;
        if let Some(token) = bearer {
            request.headers_mut().insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }

        let (stream, _) = connect_async(request).await?;
        Ok(Self { stream })
    }

    /// Send a raw text frame
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    /// Send a chat frame with the given content
    pub async fn send_chat(&mut self, content: &str) -> Result<()> {
        self.send_text(crate::fixtures::chat_frame(content)).await
    }

    /// Wait for the next chat frame, skipping control frames
    pub async fn next_chat(&mut self) -> Result<ChatFrame> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow!("timed out waiting for a chat frame"))?
                .ok_or_else(|| anyhow!("connection ended before a chat frame"))??;

            match message {
                WsMessage::Text(text) => return Ok(ChatFrame::from_json(&text)?),
                WsMessage::Close(frame) => bail!("connection closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Wait for the server's close frame and return its code
    pub async fn expect_close(&mut self) -> Result<u16> {
        loop {
            let next = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow!("timed out waiting for close"))?;

            match next {
                Some(Ok(WsMessage::Close(Some(frame)))) => return Ok(u16::from(frame.code)),
                Some(Ok(WsMessage::Close(None))) => bail!("close frame without a code"),
                Some(Ok(WsMessage::Text(text))) => bail!("unexpected text frame: {text}"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => bail!("connection ended without a close frame"),
            }
        }
    }

    /// Assert that no chat frame arrives within `window`
    pub async fn expect_silence(&mut self, window: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return Ok(()),
                Ok(Some(Ok(WsMessage::Text(text)))) => bail!("unexpected text frame: {text}"),
                Ok(Some(Ok(WsMessage::Close(frame)))) => bail!("unexpected close: {frame:?}"),
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(None) => bail!("connection ended"),
            }
        }
    }

    /// Close from the client side
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Attempt an upgrade and return the HTTP status of a refused handshake
pub async fn refused_status(url: &str) -> Result<u16> {
    match connect_async(url).await {
        Ok(_) => bail!("handshake unexpectedly succeeded"),
        Err(WsError::Http(response)) => Ok(response.status().as_u16()),
        Err(e) => Err(e.into()),
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Create test configuration: in-memory store, in-process broker
pub fn test_config() -> Result<AppConfig> {
    Ok(AppConfig::from_lookup(|key| match key {
        "GATEWAY_PORT" => Some("0".to_string()),
        "JWT_SECRET" => Some(TEST_JWT_SECRET.to_string()),
        "STORE" => Some("memory".to_string()),
        "BROKER" => Some("local".to_string()),
        _ => None,
    })?)
}
