//! Integration tests for the UDP client against a scripted fake server.
//!
//! The fake server owns two sockets like the real one: a welcome
//! socket on the configured port, and a per-session socket on a
//! dynamic port that all replies come from. The client must learn the
//! dynamic port from the first reply and talk to it from then on.

use std::net::SocketAddr;
use std::time::Duration;

use parley::{
    Chat, ClientConfig, Flow, RetryPolicy, SessionState, TransportMode,
    UdpChat,
};
use parley_protocol::binary::{self, Frame};
use parley_protocol::{ChatMessage, Content, DisplayName};
use tokio::net::UdpSocket;

// =========================================================================
// Helpers
// =========================================================================

struct FakeServer {
    welcome: UdpSocket,
    session: UdpSocket,
}

impl FakeServer {
    async fn start() -> Self {
        Self {
            welcome: UdpSocket::bind("127.0.0.1:0").await.expect("bind"),
            session: UdpSocket::bind("127.0.0.1:0").await.expect("bind"),
        }
    }

    fn addr(&self) -> SocketAddr {
        self.welcome.local_addr().expect("local addr")
    }

    async fn recv_welcome(&self) -> (Vec<u8>, SocketAddr) {
        let mut buf = vec![0u8; 2048];
        let (n, src) = tokio::time::timeout(
            Duration::from_secs(2),
            self.welcome.recv_from(&mut buf),
        )
        .await
        .expect("welcome socket timed out")
        .expect("recv");
        buf.truncate(n);
        (buf, src)
    }

    async fn recv_session(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 2048];
        let (n, _) = tokio::time::timeout(
            Duration::from_secs(2),
            self.session.recv_from(&mut buf),
        )
        .await
        .expect("session socket timed out")
        .expect("recv");
        buf.truncate(n);
        buf
    }

    /// Sends from the dynamic per-session port, like the real server.
    async fn send_session(&self, to: SocketAddr, bytes: &[u8]) {
        self.session.send_to(bytes, to).await.expect("send");
    }
}

fn config(server: SocketAddr, retry: RetryPolicy) -> ClientConfig {
    ClientConfig {
        mode: TransportMode::Udp,
        server,
        retry,
        default_channel: None,
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        delay: Duration::from_millis(60),
        retransmissions: 2,
    }
}

fn encode(id: u16, message: ChatMessage) -> Vec<u8> {
    binary::encode(&Frame::new(id, message)).to_vec()
}

fn confirm(ref_id: u16) -> Vec<u8> {
    encode(0, ChatMessage::Confirm { ref_id })
}

fn reply_ok(ref_id: u16, content: &str) -> ChatMessage {
    ChatMessage::Reply {
        ok: true,
        ref_id,
        content: Content::new(content).expect("content"),
    }
}

async fn wait_for_state(client: &UdpChat, want: SessionState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if client.state().await == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never reached {want:?}"));
}

/// Runs the whole AUTH handshake and returns the client's address as
/// seen by the server.
async fn authenticate(client: &UdpChat, server: &FakeServer) -> SocketAddr {
    let auth = client.handle_line("/auth alice secret1 Alice");
    let script = async {
        let (bytes, client_addr) = server.recv_welcome().await;
        let frame = binary::decode(&bytes).expect("decode AUTH");
        assert!(matches!(frame.message, ChatMessage::Auth { .. }));
        server.send_session(client_addr, &confirm(frame.message_id)).await;
        (frame.message_id, client_addr)
    };
    let (flow, (auth_id, client_addr)) = tokio::join!(auth, script);
    assert_eq!(flow, Flow::Continue);

    server
        .send_session(client_addr, &encode(1, reply_ok(auth_id, "welcome")))
        .await;
    // The REPLY itself gets confirmed back to the dynamic port.
    assert_eq!(server.recv_session().await, confirm(1));
    wait_for_state(client, SessionState::Open).await;
    client_addr
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn auth_chat_and_goodbye_over_the_dynamic_port() {
    let server = FakeServer::start().await;
    let client = UdpChat::connect(&config(server.addr(), fast_retry()))
        .await
        .expect("connect");
    let client_addr = authenticate(&client, &server).await;

    // Chat goes to the learned port, under the next message ID.
    assert_eq!(client.handle_line("hi folks").await, Flow::Continue);
    let frame = binary::decode(&server.recv_session().await).expect("decode");
    assert_eq!(frame.message_id, 2);
    let ChatMessage::Msg {
        display_name,
        content,
    } = &frame.message
    else {
        panic!("expected MSG, got {:?}", frame.message);
    };
    assert_eq!(display_name, &DisplayName::new("Alice").expect("name"));
    assert_eq!(content.as_str(), "hi folks");
    server.send_session(client_addr, &confirm(2)).await;

    // Goodbye is itself delivered reliably.
    let goodbye = async {
        client.disconnect().await;
        client.wait_closed().await;
    };
    let script = async {
        let frame =
            binary::decode(&server.recv_session().await).expect("decode");
        assert!(matches!(frame.message, ChatMessage::Bye));
        server.send_session(client_addr, &confirm(frame.message_id)).await;
    };
    tokio::join!(goodbye, script);
    assert_eq!(client.state().await, SessionState::End);
}

#[tokio::test]
async fn unconfirmed_auth_is_retransmitted_unchanged() {
    let server = FakeServer::start().await;
    let client = UdpChat::connect(&config(server.addr(), fast_retry()))
        .await
        .expect("connect");

    let auth = client.handle_line("/auth alice secret1 Alice");
    let script = async {
        // Ignore the first copy; the second must be byte-identical.
        let (first, _) = server.recv_welcome().await;
        let (second, client_addr) = server.recv_welcome().await;
        assert_eq!(first, second);
        let frame = binary::decode(&second).expect("decode");
        server.send_session(client_addr, &confirm(frame.message_id)).await;
    };
    let (flow, ()) = tokio::join!(auth, script);
    assert_eq!(flow, Flow::Continue);
}

#[tokio::test]
async fn exhausted_confirmation_budget_ends_the_session() {
    let server = FakeServer::start().await;
    let retry = RetryPolicy {
        delay: Duration::from_millis(30),
        retransmissions: 1,
    };
    let client = UdpChat::connect(&config(server.addr(), retry))
        .await
        .expect("connect");

    // The server never answers; the budget runs out and that is fatal.
    assert_eq!(
        client.handle_line("/auth alice secret1 Alice").await,
        Flow::Stop
    );
    client.wait_closed().await;
    assert_eq!(client.state().await, SessionState::End);
}

#[tokio::test]
async fn quit_before_any_auth_sends_nothing() {
    let server = FakeServer::start().await;
    let client = UdpChat::connect(&config(server.addr(), fast_retry()))
        .await
        .expect("connect");

    // No session was ever opened, so no farewell is owed — and no
    // retransmission loop may stall the shutdown.
    tokio::time::timeout(Duration::from_millis(50), client.disconnect())
        .await
        .expect("disconnect stalled");
    client.wait_closed().await;
    assert_eq!(client.state().await, SessionState::End);

    let mut buf = [0u8; 64];
    let silent = tokio::time::timeout(
        Duration::from_millis(300),
        server.welcome.recv_from(&mut buf),
    )
    .await;
    assert!(silent.is_err(), "client sent bytes with no session opened");
}

#[tokio::test]
async fn duplicate_inbound_msg_is_confirmed_both_times() {
    let server = FakeServer::start().await;
    let client = UdpChat::connect(&config(server.addr(), fast_retry()))
        .await
        .expect("connect");
    let client_addr = authenticate(&client, &server).await;

    let msg = encode(
        7,
        ChatMessage::Msg {
            display_name: DisplayName::new("Bob").expect("name"),
            content: Content::new("knock knock").expect("content"),
        },
    );

    // A retransmitted MSG means our CONFIRM was lost: acknowledge
    // again, process once.
    server.send_session(client_addr, &msg).await;
    assert_eq!(server.recv_session().await, confirm(7));
    server.send_session(client_addr, &msg).await;
    assert_eq!(server.recv_session().await, confirm(7));

    // The session is still healthy afterwards.
    assert_eq!(client.state().await, SessionState::Open);
}

#[tokio::test]
async fn server_bye_is_confirmed_and_not_reciprocated() {
    let server = FakeServer::start().await;
    let client = UdpChat::connect(&config(server.addr(), fast_retry()))
        .await
        .expect("connect");
    let client_addr = authenticate(&client, &server).await;

    server.send_session(client_addr, &encode(9, ChatMessage::Bye)).await;
    assert_eq!(server.recv_session().await, confirm(9));
    client.wait_closed().await;
    assert_eq!(client.state().await, SessionState::End);

    // No BYE comes back; the farewell was the server's.
    let mut buf = [0u8; 64];
    let silent = tokio::time::timeout(
        Duration::from_millis(300),
        server.session.recv_from(&mut buf),
    )
    .await;
    assert!(silent.is_err(), "client sent bytes after the server's BYE");
}

#[tokio::test]
async fn malformed_datagram_draws_err_and_bye() {
    let server = FakeServer::start().await;
    let client = UdpChat::connect(&config(server.addr(), fast_retry()))
        .await
        .expect("connect");
    let client_addr = authenticate(&client, &server).await;

    // Unknown tag byte.
    server.send_session(client_addr, &[0x77, 0x00, 0x0a]).await;

    let frame = binary::decode(&server.recv_session().await).expect("decode");
    let ChatMessage::Err {
        display_name,
        content,
    } = &frame.message
    else {
        panic!("expected ERR, got {:?}", frame.message);
    };
    assert_eq!(display_name.as_str(), "Alice");
    assert_eq!(content.as_str(), "Invalid message");
    server.send_session(client_addr, &confirm(frame.message_id)).await;

    let frame = binary::decode(&server.recv_session().await).expect("decode");
    assert!(matches!(frame.message, ChatMessage::Bye));
    server.send_session(client_addr, &confirm(frame.message_id)).await;
    client.wait_closed().await;
}
