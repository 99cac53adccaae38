//! The shared client loop: read user input, feed it to a transport
//! orchestrator, stop when either side ends the session.
//!
//! Both orchestrators expose the same three operations through the
//! [`Chat`] trait, so the input loop, the Ctrl-C path, and the main
//! select are written once.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Whether the client keeps reading input after handling one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// One transport-specific chat client.
pub trait Chat {
    /// Handles one non-empty line of user input. `Stop` means the
    /// session ended as a result.
    async fn handle_line(&self, line: &str) -> Flow;

    /// User-initiated shutdown: say goodbye to the server if the
    /// session is still live, then release the connection.
    async fn disconnect(&self);

    /// Resolves once the session is fully closed, whoever closed it.
    async fn wait_closed(&self);
}

/// Feeds lines from `input` into the client until EOF, a blank line,
/// or a line that ends the session. EOF and a blank line both mean
/// "done here": the client disconnects cleanly.
pub async fn input_loop<C, R>(chat: &C, input: R)
where
    C: Chat,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if chat.handle_line(line).await == Flow::Stop {
                    return;
                }
            }
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(%error, "reading input failed");
                break;
            }
        }
    }
    chat.disconnect().await;
}

/// Runs one chat client to completion against stdin.
///
/// Exits when the input loop finishes, the session closes from the
/// network side, or the user hits Ctrl-C; in every case the session is
/// fully torn down before returning.
pub async fn run<C: Chat>(chat: &C) {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        () = input_loop(chat, stdin) => {}
        () = chat.wait_closed() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("interrupt received");
            chat.disconnect().await;
        }
    }
    chat.wait_closed().await;
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records handled lines; `stop_on` ends the session like a real
    /// orchestrator would.
    #[derive(Default)]
    struct FakeChat {
        handled: Mutex<Vec<String>>,
        disconnected: Mutex<bool>,
        stop_on: Option<&'static str>,
    }

    impl Chat for FakeChat {
        async fn handle_line(&self, line: &str) -> Flow {
            self.handled.lock().unwrap().push(line.to_string());
            if self.stop_on == Some(line) {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }

        async fn disconnect(&self) {
            *self.disconnected.lock().unwrap() = true;
        }

        async fn wait_closed(&self) {
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn eof_disconnects_after_handling_all_lines() {
        let chat = FakeChat::default();
        input_loop(&chat, &b"hello\n/help\n"[..]).await;

        assert_eq!(
            *chat.handled.lock().unwrap(),
            vec!["hello".to_string(), "/help".to_string()]
        );
        assert!(*chat.disconnected.lock().unwrap());
    }

    #[tokio::test]
    async fn blank_line_ends_input_early() {
        let chat = FakeChat::default();
        input_loop(&chat, &b"one\n\nnever seen\n"[..]).await;

        assert_eq!(*chat.handled.lock().unwrap(), vec!["one".to_string()]);
        assert!(*chat.disconnected.lock().unwrap());
    }

    #[tokio::test]
    async fn stop_flow_skips_the_disconnect() {
        // A Stop means the orchestrator already tore the session down;
        // a second goodbye would be wrong.
        let chat = FakeChat {
            stop_on: Some("boom"),
            ..FakeChat::default()
        };
        input_loop(&chat, &b"boom\nafter\n"[..]).await;

        assert_eq!(*chat.handled.lock().unwrap(), vec!["boom".to_string()]);
        assert!(!*chat.disconnected.lock().unwrap());
    }

    #[tokio::test]
    async fn crlf_input_lines_are_trimmed() {
        let chat = FakeChat::default();
        input_loop(&chat, &b"hi there\r\n"[..]).await;
        assert_eq!(*chat.handled.lock().unwrap(), vec!["hi there".to_string()]);
    }
}
