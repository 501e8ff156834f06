//! End-to-end tests for the WebSocket gateway
//!
//! Every test starts its own server on an ephemeral port with in-memory
//! stores and the in-process broker.

use std::time::Duration;

use anyhow::Result;
use chat_core::{MessageQuery, MessageRepository, RoomId, UserId};
use integration_tests::*;

const GOING_AWAY: u16 = 1001;
const ACCESS_DENIED: u16 = 4003;
const AUTHENTICATION_FAILED: u16 = 4004;

/// Seed a room with the given members and return its id
fn seed_room(server: &TestServer, members: &[i64]) -> i64 {
    let room = unique_id();
    server.rooms.insert_room(
        RoomId::new(room),
        members.iter().copied().map(UserId::new),
    );
    room
}

// ============================================================================
// HTTP surface
// ============================================================================

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let server = TestServer::start().await?;

    let response = server.get("/health").await?;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn test_non_numeric_room_is_refused_before_upgrade() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.token_for(unique_id(), "alice")?;

    let status = refused_status(&server.ws_url("general", Some(&token))).await?;
    assert_eq!(status, 400);
    assert_eq!(server.state.registry().total_subscriptions(), 0);
    Ok(())
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_member_connects_with_query_token() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = unique_id();
    let room = seed_room(&server, &[alice]);

    let _client = server.join(room, alice, "alice").await?;
    assert_eq!(server.subscriber_count(room), 1);
    Ok(())
}

#[tokio::test]
async fn test_member_connects_with_authorization_header() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = unique_id();
    let room = seed_room(&server, &[alice]);
    let token = server.token_for(alice, "alice")?;

    let mut client = server.connect_with_header(room, &token).await?;
    server.wait_for_subscribers(room, 1).await?;

    client.send_chat("via header").await?;
    let frame = client.next_chat().await?;
    assert_eq!(frame.sender, UserId::new(alice));
    assert_eq!(frame.content, "via header");
    Ok(())
}

#[tokio::test]
async fn test_missing_token_closes_with_authentication_failed() -> Result<()> {
    let server = TestServer::start().await?;
    let room = seed_room(&server, &[unique_id()]);

    let mut client = TestClient::connect(&server.ws_url(&room.to_string(), None), None).await?;
    assert_eq!(client.expect_close().await?, AUTHENTICATION_FAILED);
    assert_eq!(server.subscriber_count(room), 0);
    Ok(())
}

#[tokio::test]
async fn test_expired_token_closes_before_subscribing() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = unique_id();
    let room = seed_room(&server, &[alice]);
    let token = expired_token(&server.jwt, alice)?;

    let mut client = server.connect(room, &token).await?;
    assert_eq!(client.expect_close().await?, AUTHENTICATION_FAILED);
    assert_eq!(server.subscriber_count(room), 0);
    assert_eq!(server.state.registry().total_subscriptions(), 0);
    Ok(())
}

#[tokio::test]
async fn test_refresh_token_is_not_a_connection_credential() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = unique_id();
    let room = seed_room(&server, &[alice]);
    let token = refresh_token(&server.jwt, alice)?;

    let mut client = server.connect(room, &token).await?;
    assert_eq!(client.expect_close().await?, AUTHENTICATION_FAILED);
    Ok(())
}

#[tokio::test]
async fn test_token_signed_with_another_secret_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = unique_id();
    let room = seed_room(&server, &[alice]);
    let forged = chat_common::JwtService::new("some-other-secret", 60)
        .issue_access_token(UserId::new(alice), Some("alice"))?;

    let mut client = server.connect(room, &forged).await?;
    assert_eq!(client.expect_close().await?, AUTHENTICATION_FAILED);
    Ok(())
}

#[tokio::test]
async fn test_non_member_closes_with_access_denied() -> Result<()> {
    let server = TestServer::start().await?;
    let room = seed_room(&server, &[unique_id()]);
    let token = server.token_for(unique_id(), "mallory")?;

    let mut client = server.connect(room, &token).await?;
    assert_eq!(client.expect_close().await?, ACCESS_DENIED);
    assert_eq!(server.subscriber_count(room), 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_room_closes_with_access_denied() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.token_for(unique_id(), "alice")?;

    let mut client = server.connect(unique_id(), &token).await?;
    assert_eq!(client.expect_close().await?, ACCESS_DENIED);
    Ok(())
}

// ============================================================================
// Messaging
// ============================================================================

#[tokio::test]
async fn test_message_reaches_every_member_including_sender() -> Result<()> {
    let server = TestServer::start().await?;
    let (alice, bob) = (unique_id(), unique_id());
    let room = seed_room(&server, &[alice, bob]);

    let mut alice_client = server.join(room, alice, "alice").await?;
    let mut bob_client = server.join(room, bob, "bob").await?;

    alice_client.send_chat("hi").await?;

    let to_bob = bob_client.next_chat().await?;
    let echo = alice_client.next_chat().await?;

    assert_eq!(to_bob.id, echo.id);
    assert_eq!(to_bob.sender, UserId::new(alice));
    assert_eq!(to_bob.sender_username, "alice");
    assert_eq!(to_bob.content, "hi");
    assert!(to_bob.attachment.is_none());
    assert_eq!(server.messages.count(RoomId::new(room)), 1);
    Ok(())
}

#[tokio::test]
async fn test_blank_content_is_neither_stored_nor_broadcast() -> Result<()> {
    let server = TestServer::start().await?;
    let (alice, bob) = (unique_id(), unique_id());
    let room = seed_room(&server, &[alice, bob]);

    let mut alice_client = server.join(room, alice, "alice").await?;
    let mut bob_client = server.join(room, bob, "bob").await?;

    alice_client.send_chat("   ").await?;

    bob_client.expect_silence(Duration::from_millis(300)).await?;
    assert_eq!(server.messages.count(RoomId::new(room)), 0);

    // The session stays usable afterwards
    alice_client.send_chat("after").await?;
    assert_eq!(bob_client.next_chat().await?.content, "after");
    Ok(())
}

#[tokio::test]
async fn test_malformed_frames_do_not_close_the_session() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = unique_id();
    let room = seed_room(&server, &[alice]);

    let mut client = server.join(room, alice, "alice").await?;

    client.send_text("not json").await?;
    client.send_text(r#"{"type":"typing"}"#).await?;
    client.send_chat("still here").await?;

    assert_eq!(client.next_chat().await?.content, "still here");
    assert_eq!(server.messages.count(RoomId::new(room)), 1);
    Ok(())
}

#[tokio::test]
async fn test_content_is_trimmed_and_attachment_kept() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = unique_id();
    let room = seed_room(&server, &[alice]);

    let mut client = server.join(room, alice, "alice").await?;
    client
        .send_text(chat_frame_with_attachment("  photo  ", "uploads/cat.png"))
        .await?;

    let frame = client.next_chat().await?;
    assert_eq!(frame.content, "photo");
    assert_eq!(frame.attachment.as_deref(), Some("uploads/cat.png"));

    let stored = server
        .messages
        .list_by_room(RoomId::new(room), MessageQuery::default())
        .await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, frame.id);
    assert_eq!(stored[0].content, "photo");
    Ok(())
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() -> Result<()> {
    let server = TestServer::start().await?;
    let (alice, bob) = (unique_id(), unique_id());
    let room = seed_room(&server, &[alice, bob]);

    let mut alice_client = server.join(room, alice, "alice").await?;
    let mut bob_client = server.join(room, bob, "bob").await?;

    for i in 0..20 {
        alice_client.send_chat(&format!("m{i}")).await?;
    }

    let mut last_id = None;
    for i in 0..20 {
        let frame = bob_client.next_chat().await?;
        assert_eq!(frame.content, format!("m{i}"));
        assert!(last_id < Some(frame.id));
        last_id = Some(frame.id);
    }
    Ok(())
}

#[tokio::test]
async fn test_rooms_are_isolated() -> Result<()> {
    let server = TestServer::start().await?;
    let (alice, bob) = (unique_id(), unique_id());
    let room_a = seed_room(&server, &[alice]);
    let room_b = seed_room(&server, &[bob]);

    let mut alice_client = server.join(room_a, alice, "alice").await?;
    let mut bob_client = server.join(room_b, bob, "bob").await?;

    alice_client.send_chat("only room a").await?;
    assert_eq!(alice_client.next_chat().await?.content, "only room a");
    bob_client.expect_silence(Duration::from_millis(300)).await?;
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_revoked_member_keeps_session_until_reconnect() -> Result<()> {
    let server = TestServer::start().await?;
    let (alice, bob) = (unique_id(), unique_id());
    let room = seed_room(&server, &[alice, bob]);

    let mut alice_client = server.join(room, alice, "alice").await?;
    let mut bob_client = server.join(room, bob, "bob").await?;

    assert!(server
        .rooms
        .remove_member(RoomId::new(room), UserId::new(alice)));

    bob_client.send_chat("still reaching alice").await?;
    assert_eq!(
        alice_client.next_chat().await?.content,
        "still reaching alice"
    );

    alice_client.close().await?;
    server.wait_for_subscribers(room, 1).await?;

    let token = server.token_for(alice, "alice")?;
    let mut again = server.connect(room, &token).await?;
    assert_eq!(again.expect_close().await?, ACCESS_DENIED);
    assert_eq!(server.subscriber_count(room), 1);
    Ok(())
}

#[tokio::test]
async fn test_client_disconnect_unsubscribes() -> Result<()> {
    let server = TestServer::start().await?;
    let (alice, bob) = (unique_id(), unique_id());
    let room = seed_room(&server, &[alice, bob]);

    let alice_client = server.join(room, alice, "alice").await?;
    let _bob_client = server.join(room, bob, "bob").await?;
    assert_eq!(server.subscriber_count(room), 2);

    alice_client.close().await?;
    server.wait_for_subscribers(room, 1).await?;
    assert!(wait_until(Duration::from_secs(5), || server.state.active_sessions() == 1).await);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_sessions_with_going_away() -> Result<()> {
    let server = TestServer::start().await?;
    let (alice, bob) = (unique_id(), unique_id());
    let room = seed_room(&server, &[alice, bob]);

    let mut alice_client = server.join(room, alice, "alice").await?;
    let mut bob_client = server.join(room, bob, "bob").await?;

    let state = server.state.clone();
    let shutdown = tokio::spawn(server.shutdown());

    assert_eq!(alice_client.expect_close().await?, GOING_AWAY);
    assert_eq!(bob_client.expect_close().await?, GOING_AWAY);

    shutdown.await??;
    assert_eq!(state.registry().total_subscriptions(), 0);
    assert_eq!(state.active_sessions(), 0);
    Ok(())
}
