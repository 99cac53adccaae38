//! Integration tests for the TCP client against a scripted fake server.

use std::net::SocketAddr;
use std::time::Duration;

use parley::{
    Chat, ClientConfig, Flow, RetryPolicy, SessionState, TcpChat,
    TransportMode,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// =========================================================================
// Helpers
// =========================================================================

async fn listen() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, addr)
}

fn config(server: SocketAddr) -> ClientConfig {
    ClientConfig {
        mode: TransportMode::Tcp,
        server,
        retry: RetryPolicy::default(),
        default_channel: None,
    }
}

/// Reads one CRLF-terminated line from the client, terminator included.
async fn read_line(sock: &mut TcpStream) -> String {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = sock.read(&mut byte).await.expect("read");
        assert!(n > 0, "client closed mid-line: {line:?}");
        line.push(byte[0]);
        if line.ends_with(b"\r\n") {
            break;
        }
    }
    String::from_utf8(line).expect("utf8")
}

async fn wait_for_state(client: &TcpChat, want: SessionState) {
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

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn auth_message_chat_and_goodbye() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    assert_eq!(
        client.handle_line("/auth alice secret1 Alice").await,
        Flow::Continue
    );
    assert_eq!(
        read_line(&mut sock).await,
        "AUTH alice AS Alice USING secret1\r\n"
    );
    assert_eq!(client.state().await, SessionState::Auth);

    sock.write_all(b"REPLY OK IS welcome\r\n").await.expect("send");
    wait_for_state(&client, SessionState::Open).await;

    assert_eq!(client.handle_line("hello there").await, Flow::Continue);
    assert_eq!(
        read_line(&mut sock).await,
        "MSG FROM Alice IS hello there\r\n"
    );

    client.disconnect().await;
    assert_eq!(read_line(&mut sock).await, "BYE\r\n");
    client.wait_closed().await;
    assert_eq!(client.state().await, SessionState::End);
}

#[tokio::test]
async fn rejected_auth_allows_a_retry_on_the_same_connection() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    client.handle_line("/auth alice wrong Alice").await;
    read_line(&mut sock).await;
    sock.write_all(b"REPLY NOK IS bad credentials\r\n")
        .await
        .expect("send");
    wait_for_state(&client, SessionState::Start).await;

    // Same stream, fresh credentials.
    assert_eq!(
        client.handle_line("/auth alice secret1 Alicia").await,
        Flow::Continue
    );
    assert_eq!(
        read_line(&mut sock).await,
        "AUTH alice AS Alicia USING secret1\r\n"
    );
}

#[tokio::test]
async fn chat_before_auth_never_reaches_the_wire() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    // Rejected locally with an error line; the stream stays silent.
    assert_eq!(client.handle_line("hello?").await, Flow::Continue);
    assert_eq!(client.handle_line("/join general").await, Flow::Continue);

    // The next thing the server sees is the AUTH.
    client.handle_line("/auth alice secret1 Alice").await;
    assert_eq!(
        read_line(&mut sock).await,
        "AUTH alice AS Alice USING secret1\r\n"
    );
}

#[tokio::test]
async fn join_round_trip_switches_channels() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    client.handle_line("/auth alice secret1 Alice").await;
    read_line(&mut sock).await;
    sock.write_all(b"REPLY OK IS welcome\r\n").await.expect("send");
    wait_for_state(&client, SessionState::Open).await;

    client.handle_line("/join general").await;
    assert_eq!(read_line(&mut sock).await, "JOIN general AS Alice\r\n");
    sock.write_all(b"REPLY OK IS joined general\r\n")
        .await
        .expect("send");

    // Traffic continues in the new channel.
    client.handle_line("made it").await;
    assert_eq!(read_line(&mut sock).await, "MSG FROM Alice IS made it\r\n");
}

#[tokio::test]
async fn quit_before_any_auth_sends_no_bye() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    // No session was ever opened; the client just leaves.
    client.disconnect().await;
    client.wait_closed().await;
    assert_eq!(client.state().await, SessionState::End);

    let mut buf = [0u8; 8];
    match tokio::time::timeout(Duration::from_millis(300), sock.read(&mut buf))
        .await
    {
        Err(_) | Ok(Ok(0)) | Ok(Err(_)) => {}
        Ok(Ok(n)) => panic!("unexpected bytes on quit: {:?}", &buf[..n]),
    }
}

#[tokio::test]
async fn server_bye_ends_the_session_without_a_reply() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    sock.write_all(b"BYE\r\n").await.expect("send");
    client.wait_closed().await;
    assert_eq!(client.state().await, SessionState::End);

    // Nothing comes back; the client just leaves.
    let mut buf = [0u8; 8];
    match tokio::time::timeout(Duration::from_millis(300), sock.read(&mut buf))
        .await
    {
        Err(_) | Ok(Ok(0)) | Ok(Err(_)) => {}
        Ok(Ok(n)) => panic!("unexpected bytes after BYE: {:?}", &buf[..n]),
    }
}

#[tokio::test]
async fn malformed_inbound_line_draws_err_and_bye() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    sock.write_all(b"WHAT IS THIS\r\n").await.expect("send");

    assert_eq!(
        read_line(&mut sock).await,
        "ERR FROM client IS Invalid message\r\n"
    );
    assert_eq!(read_line(&mut sock).await, "BYE\r\n");
    client.wait_closed().await;
}

#[tokio::test]
async fn unexpected_reply_before_auth_is_a_protocol_failure() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    // No AUTH or JOIN is pending; a REPLY here is illegal.
    sock.write_all(b"REPLY OK IS surprise\r\n").await.expect("send");

    assert_eq!(
        read_line(&mut sock).await,
        "ERR FROM client IS Invalid message\r\n"
    );
    assert_eq!(read_line(&mut sock).await, "BYE\r\n");
    client.wait_closed().await;
}

#[tokio::test]
async fn peer_err_is_answered_with_bye() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (mut sock, _) = listener.accept().await.expect("accept");

    client.handle_line("/auth alice secret1 Alice").await;
    read_line(&mut sock).await;
    sock.write_all(b"REPLY OK IS welcome\r\n").await.expect("send");
    wait_for_state(&client, SessionState::Open).await;

    sock.write_all(b"ERR FROM Server IS overloaded\r\n")
        .await
        .expect("send");
    assert_eq!(read_line(&mut sock).await, "BYE\r\n");
    client.wait_closed().await;
    assert_eq!(client.state().await, SessionState::End);
}

#[tokio::test]
async fn server_closing_the_stream_closes_the_session() {
    let (listener, addr) = listen().await;
    let client = TcpChat::connect(&config(addr)).await.expect("connect");
    let (sock, _) = listener.accept().await.expect("accept");

    drop(sock);
    client.wait_closed().await;
    assert_eq!(client.state().await, SessionState::End);
}
