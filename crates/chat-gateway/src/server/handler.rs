//! WebSocket handler
//!
//! Upgrades `/ws/chat/{room_id}` requests and hands the socket to a session.

use crate::connection::ConnectionSession;
use crate::handlers::Credential;
use crate::server::GatewayState;
use axum::{
    extract::{ws::WebSocket, Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chat_core::RoomId;
use futures_util::StreamExt;
use serde::Deserialize;

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// WebSocket chat handler
pub async fn chat_handler(
    State(state): State<GatewayState>,
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Ok(room_id) = RoomId::parse(&room_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid room id").into_response();
    };
    let credential = Credential::from_request(&headers, query.token.as_deref());

    ws.on_upgrade(move |socket| handle_socket(state, socket, room_id, credential))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(
    state: GatewayState,
    socket: WebSocket,
    room_id: RoomId,
    credential: Credential,
) {
    let _active = state.track_session();
    let session = ConnectionSession::new(state.session_context().clone(), room_id, credential);
    let connection_id = session.connection().id();

    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        "WebSocket connection established"
    );

    let (sink, stream) = socket.split();
    let outcome = session.run(sink, stream).await;

    tracing::debug!(connection_id = %connection_id, outcome = ?outcome, "Session finished");
}
