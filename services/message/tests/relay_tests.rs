//! Relay routing, connection lifecycle and the TCP accept loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use message_service::{
    Disconnect, Envelope, MailboxStore, MemoryMailbox, Relay, RelaySettings, RouteOutcome,
    ServerSettings, serve,
};
use serde_json::Value;
use squeak_common::StoreError;
use squeak_token::{Issuer, Verifier};
use test_utils::signing_key;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Client = BufReader<DuplexStream>;

fn relay_with(mailbox: Arc<dyn MailboxStore>, settings: RelaySettings) -> Arc<Relay> {
    Arc::new(Relay::new(mailbox, settings))
}

fn envelope(recipient: &str, payload: &str) -> Envelope {
    Envelope {
        recipient: recipient.to_string(),
        payload: payload.to_string(),
        key_id: "k1".to_string(),
        sender: "alice".to_string(),
    }
}

fn connect_with(relay: &Arc<Relay>, subject: &str, buffer: usize) -> (Client, JoinHandle<Disconnect>) {
    let (client, server) = tokio::io::duplex(buffer);
    let relay = Arc::clone(relay);
    let subject = subject.to_string();
    let handle = tokio::spawn(async move { relay.handle_connection(&subject, server).await });
    (BufReader::new(client), handle)
}

fn connect(relay: &Arc<Relay>, subject: &str) -> (Client, JoinHandle<Disconnect>) {
    connect_with(relay, subject, 16 * 1024)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn read_frame<R: AsyncBufReadExt + Unpin>(client: &mut R) -> Value {
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), client.read_line(&mut line))
        .await
        .expect("no frame in time")
        .unwrap();
    serde_json::from_str(&line).unwrap()
}

async fn read_eof<R: AsyncBufReadExt + Unpin>(client: &mut R) -> bool {
    let mut line = String::new();
    matches!(
        tokio::time::timeout(Duration::from_secs(2), client.read_line(&mut line)).await,
        Ok(Ok(0))
    )
}

#[derive(Debug)]
struct FailingMailbox;

#[async_trait]
impl MailboxStore for FailingMailbox {
    async fn append(&self, _: &str, _: Envelope) -> Result<(), StoreError> {
        Err(StoreError::backend("mailbox unavailable"))
    }

    async fn append_many(&self, _: Vec<Envelope>) -> Result<(), StoreError> {
        Err(StoreError::backend("mailbox unavailable"))
    }

    async fn drain_all(&self, _: &str) -> Result<Vec<Envelope>, StoreError> {
        Err(StoreError::backend("mailbox unavailable"))
    }
}

#[tokio::test]
async fn test_live_delivery_skips_mailbox() {
    let mailbox = Arc::new(MemoryMailbox::new());
    let relay = relay_with(mailbox.clone(), RelaySettings::default());
    let (mut bob, _conn) = connect(&relay, "bob");
    wait_until(|| relay.registry().is_connected("bob")).await;

    assert_eq!(relay.route(envelope("bob", "hello")).await, RouteOutcome::Live);

    let frame = read_frame(&mut bob).await;
    assert_eq!(frame["type"], "deliver");
    assert_eq!(frame["payload"], "hello");
    assert_eq!(frame["keyId"], "k1");
    assert_eq!(mailbox.pending("bob"), 0);
}

#[tokio::test]
async fn test_offline_recipient_is_stored_and_drained_once() {
    let mailbox = Arc::new(MemoryMailbox::new());
    let relay = relay_with(mailbox.clone(), RelaySettings::default());

    assert_eq!(relay.route(envelope("carol", "later")).await, RouteOutcome::Stored);
    assert_eq!(mailbox.pending("carol"), 1);

    let drained = mailbox.drain_all("carol").await.unwrap();
    assert_eq!(drained, vec![envelope("carol", "later")]);
    assert!(mailbox.drain_all("carol").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sender_is_connection_subject() {
    let mailbox = Arc::new(MemoryMailbox::new());
    let relay = relay_with(mailbox.clone(), RelaySettings::default());
    let (mut bob, _bob_conn) = connect(&relay, "bob");
    let (mut alice, _alice_conn) = connect(&relay, "alice");
    wait_until(|| relay.registry().len() == 2).await;

    alice
        .write_all(
            b"{\"type\":\"send\",\"recipient\":\"bob\",\"payload\":\"hi\",\"keyId\":\"k9\",\"sender\":\"mallory\"}\n",
        )
        .await
        .unwrap();

    let frame = read_frame(&mut bob).await;
    assert_eq!(frame["sender"], "alice");
    assert_eq!(frame["keyId"], "k9");
    assert_eq!(mailbox.pending("bob"), 0);
}

#[tokio::test]
async fn test_send_to_offline_falls_back_to_mailbox() {
    let mailbox = Arc::new(MemoryMailbox::new());
    let relay = relay_with(mailbox.clone(), RelaySettings::default());
    let (mut alice, _conn) = connect(&relay, "alice");
    wait_until(|| relay.registry().is_connected("alice")).await;

    alice
        .write_all(b"{\"type\":\"send\",\"recipient\":\"carol\",\"payload\":\"p\",\"keyId\":\"k\"}\n")
        .await
        .unwrap();

    wait_until(|| mailbox.pending("carol") == 1).await;
    let stored = mailbox.drain_all("carol").await.unwrap();
    assert_eq!(stored[0].sender, "alice");
}

#[tokio::test]
async fn test_ping_pong_and_blank_lines() {
    let relay = relay_with(Arc::new(MemoryMailbox::new()), RelaySettings::default());
    let (mut client, _conn) = connect(&relay, "bob");

    client.write_all(b"\n{\"type\":\"ping\"}\n").await.unwrap();
    let frame = read_frame(&mut client).await;
    assert_eq!(frame, serde_json::json!({"type": "pong"}));
}

#[tokio::test]
async fn test_second_connection_evicts_first() {
    let relay = relay_with(Arc::new(MemoryMailbox::new()), RelaySettings::default());
    let (mut first, first_conn) = connect(&relay, "bob");
    wait_until(|| relay.registry().is_connected("bob")).await;

    let (mut second, _second_conn) = connect(&relay, "bob");
    assert_eq!(first_conn.await.unwrap(), Disconnect::Replaced);

    let frame = read_frame(&mut first).await;
    assert_eq!(frame["code"], "SESSION_REPLACED");
    assert!(read_eof(&mut first).await);

    // The evicted connection must not have removed its replacement.
    assert!(relay.registry().is_connected("bob"));
    assert_eq!(relay.route(envelope("bob", "new")).await, RouteOutcome::Live);
    assert_eq!(read_frame(&mut second).await["payload"], "new");
}

#[tokio::test]
async fn test_disconnect_deregisters() {
    let mailbox = Arc::new(MemoryMailbox::new());
    let relay = relay_with(mailbox.clone(), RelaySettings::default());
    let (client, conn) = connect(&relay, "bob");
    wait_until(|| relay.registry().is_connected("bob")).await;

    drop(client);
    assert_eq!(conn.await.unwrap(), Disconnect::Closed);
    assert!(relay.registry().is_empty());

    assert_eq!(relay.route(envelope("bob", "x")).await, RouteOutcome::Stored);
    assert_eq!(mailbox.pending("bob"), 1);
}

#[tokio::test]
async fn test_aborted_connection_deregisters() {
    let mailbox = Arc::new(MemoryMailbox::new());
    let relay = relay_with(mailbox.clone(), RelaySettings::default());
    let (mut client, conn) = connect(&relay, "bob");
    wait_until(|| relay.registry().is_connected("bob")).await;

    conn.abort();
    assert!(conn.await.unwrap_err().is_cancelled());
    assert!(!relay.registry().is_connected("bob"));
    assert!(relay.registry().is_empty());

    assert_eq!(relay.route(envelope("bob", "x")).await, RouteOutcome::Stored);
    assert_eq!(mailbox.pending("bob"), 1);
    assert!(read_eof(&mut client).await);
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let settings = RelaySettings {
        max_frame_bytes: 64,
        ..RelaySettings::default()
    };
    let relay = relay_with(Arc::new(MemoryMailbox::new()), settings);
    let (mut client, conn) = connect(&relay, "bob");

    // No newline ever arrives; the read must stop at the limit.
    client.write_all("a".repeat(4096).as_bytes()).await.unwrap();
    assert_eq!(conn.await.unwrap(), Disconnect::ProtocolError);

    let frame = read_frame(&mut client).await;
    assert_eq!(frame["code"], "BAD_REQUEST");
    assert_eq!(frame["message"], "frame too large");
    assert!(read_eof(&mut client).await);
    assert!(!relay.registry().is_connected("bob"));
}

#[tokio::test]
async fn test_frame_at_limit_is_accepted() {
    let settings = RelaySettings {
        max_frame_bytes: 64,
        ..RelaySettings::default()
    };
    let relay = relay_with(Arc::new(MemoryMailbox::new()), settings);
    let (mut client, _conn) = connect(&relay, "bob");

    let ping = format!("{:<64}\n", r#"{"type":"ping"}"#);
    assert_eq!(ping.len(), 65);
    client.write_all(ping.as_bytes()).await.unwrap();
    assert_eq!(read_frame(&mut client).await["type"], "pong");
    assert!(relay.registry().is_connected("bob"));
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let relay = relay_with(Arc::new(MemoryMailbox::new()), RelaySettings::default());
    let (mut client, conn) = connect(&relay, "bob");

    client.write_all(b"{not json\n").await.unwrap();
    assert_eq!(conn.await.unwrap(), Disconnect::ProtocolError);

    let frame = read_frame(&mut client).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["code"], "BAD_REQUEST");
    assert!(frame["correlationId"].is_string());
    assert!(read_eof(&mut client).await);
    assert!(!relay.registry().is_connected("bob"));
}

#[tokio::test]
async fn test_full_queue_falls_back_to_mailbox() {
    let mailbox = Arc::new(MemoryMailbox::new());
    let settings = RelaySettings {
        outbound_buffer: 1,
        write_timeout: Duration::from_secs(30),
        ..RelaySettings::default()
    };
    let relay = relay_with(mailbox.clone(), settings);
    // The client never reads, so the writer stalls on the first frame.
    let (_bob, _conn) = connect_with(&relay, "bob", 64);
    wait_until(|| relay.registry().is_connected("bob")).await;

    let payload = "x".repeat(1024);
    let mut stored = 0;
    for _ in 0..5 {
        match relay.route(envelope("bob", &payload)).await {
            RouteOutcome::Stored => stored += 1,
            RouteOutcome::Live => {}
            RouteOutcome::Dropped => panic!("memory mailbox cannot fail"),
        }
    }
    assert!(stored >= 3, "only {stored} stored");
    assert_eq!(mailbox.pending("bob"), stored);
}

#[tokio::test]
async fn test_stalled_client_is_disconnected() {
    let settings = RelaySettings {
        write_timeout: Duration::from_millis(100),
        ..RelaySettings::default()
    };
    let relay = relay_with(Arc::new(MemoryMailbox::new()), settings);
    let (_bob, conn) = connect_with(&relay, "bob", 64);
    wait_until(|| relay.registry().is_connected("bob")).await;

    assert_eq!(
        relay.route(envelope("bob", &"y".repeat(1024))).await,
        RouteOutcome::Live
    );
    assert_eq!(conn.await.unwrap(), Disconnect::WriteFailed);
    assert!(!relay.registry().is_connected("bob"));
}

#[tokio::test]
async fn test_mailbox_failure_drops_message() {
    let relay = relay_with(Arc::new(FailingMailbox), RelaySettings::default());
    assert_eq!(relay.route(envelope("carol", "lost")).await, RouteOutcome::Dropped);
}

#[tokio::test]
async fn test_tcp_handshake_and_delivery() {
    let issuer = Issuer::new("AUTH", signing_key());
    let verifier = Arc::new(Verifier::new("MESSAGE", issuer.public_key()));
    let relay = relay_with(Arc::new(MemoryMailbox::new()), RelaySettings::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let settings = ServerSettings {
        handshake_timeout: Duration::from_secs(2),
        shutdown_timeout: Duration::from_millis(100),
    };
    let server = tokio::spawn(serve(
        listener,
        Arc::clone(&relay),
        verifier,
        settings,
        async move {
            let _ = stopped.await;
        },
    ));

    let access = issuer
        .stringify(&issuer.mint("bob", "MESSAGE", Duration::from_secs(60)).unwrap())
        .unwrap();
    let mut bob = BufReader::new(TcpStream::connect(addr).await.unwrap());
    bob.write_all(format!("{access}\n").as_bytes()).await.unwrap();
    wait_until(|| relay.registry().is_connected("bob")).await;

    assert_eq!(relay.route(envelope("bob", "over tcp")).await, RouteOutcome::Live);
    assert_eq!(read_frame(&mut bob).await["payload"], "over tcp");

    // A token for another audience is refused at the handshake.
    let wrong = issuer
        .stringify(&issuer.mint("eve", "PREKEY", Duration::from_secs(60)).unwrap())
        .unwrap();
    let mut eve = BufReader::new(TcpStream::connect(addr).await.unwrap());
    eve.write_all(format!("{wrong}\n").as_bytes()).await.unwrap();
    assert_eq!(read_frame(&mut eve).await["code"], "UNAUTHORIZED");
    assert!(read_eof(&mut eve).await);
    assert!(!relay.registry().is_connected("eve"));

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server did not stop")
        .unwrap();
}
