//! The stream-transport chat client.
//!
//! One connected TCP stream, split in two: a spawned receive task
//! decodes inbound lines and drives the session, while user commands
//! are encoded and written from the input task. Both sides share the
//! session behind an `Arc`, so either can end it: the server with an
//! ERR or BYE (or by closing the stream), the user with EOF or Ctrl-C.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parley_protocol::{ChatMessage, text};
use parley_session::{
    MsgDisposition, ReplyOutcome, Session, SessionState,
};
use parley_transport::{StreamLink, StreamReader, StreamWriter};
use tokio::sync::{Mutex, Notify};

use crate::ParleyError;
use crate::chat::{Chat, Flow};
use crate::command::{self, Command};
use crate::compose;
use crate::config::ClientConfig;
use crate::ui;

/// A chat client speaking the text grammar over TCP.
pub struct TcpChat {
    inner: Arc<Inner>,
}

/// State shared between the input task and the receive task.
struct Inner {
    session: Mutex<Session>,
    writer: Mutex<StreamWriter>,
    closed: Notify,
    done: AtomicBool,
}

impl TcpChat {
    /// Connects to the server and starts the receive task.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ParleyError> {
        let link = StreamLink::connect(config.server).await?;
        let (reader, writer) = link.split();

        let inner = Arc::new(Inner {
            session: Mutex::new(Session::with_default_channel(
                config.default_channel.clone(),
            )),
            writer: Mutex::new(writer),
            closed: Notify::new(),
            done: AtomicBool::new(false),
        });
        tokio::spawn(recv_loop(Arc::clone(&inner), reader));

        Ok(Self { inner })
    }

    /// Current session state, for callers that poll for progress.
    pub async fn state(&self) -> SessionState {
        self.inner.session.lock().await.state()
    }
}

impl Chat for TcpChat {
    async fn handle_line(&self, line: &str) -> Flow {
        let command = match command::parse(line) {
            Ok(command) => command,
            Err(error) => {
                ui::local_error(&error);
                return Flow::Continue;
            }
        };

        let message = match command {
            Command::Help => {
                ui::help();
                return Flow::Continue;
            }
            Command::Rename { display_name } => {
                compose::rename(
                    &mut *self.inner.session.lock().await,
                    display_name,
                );
                return Flow::Continue;
            }
            Command::Auth {
                username,
                secret,
                display_name,
            } => compose::auth(
                &mut *self.inner.session.lock().await,
                username,
                secret,
                display_name,
            ),
            Command::Join { channel } => {
                compose::join(&mut *self.inner.session.lock().await, channel)
            }
            Command::Say(content) => {
                compose::say(&*self.inner.session.lock().await, content)
            }
        };

        match message {
            Some(message) => self.inner.send_or_close(&message).await,
            None => Flow::Continue,
        }
    }

    async fn disconnect(&self) {
        let send_bye = {
            let mut session = self.inner.session.lock().await;
            // No farewell is owed before the first AUTH.
            let live = session.engaged() && !session.is_terminal();
            session.terminate();
            live
        };
        if send_bye {
            // Best effort; the stream may already be gone.
            let _ = self.inner.send(&ChatMessage::Bye).await;
        }
        self.inner.close();
    }

    async fn wait_closed(&self) {
        self.inner.wait_closed().await;
    }
}

impl Inner {
    // -- Inbound messages -------------------------------------------------

    async fn apply_inbound(&self, message: ChatMessage) -> Flow {
        match message {
            ChatMessage::Reply { ok, content, .. } => {
                let outcome = self.session.lock().await.on_reply(ok);
                match outcome {
                    ReplyOutcome::AuthAccepted | ReplyOutcome::JoinAccepted => {
                        ui::success(&content);
                    }
                    ReplyOutcome::AuthRejected | ReplyOutcome::JoinRejected => {
                        ui::failure(&content);
                    }
                    ReplyOutcome::Unexpected => {
                        return self.protocol_failure().await;
                    }
                    ReplyOutcome::Ignored => {}
                }
                Flow::Continue
            }
            ChatMessage::Msg {
                display_name,
                content,
            } => {
                match self.session.lock().await.on_msg() {
                    MsgDisposition::Render => {
                        ui::chat_line(&display_name, &content);
                    }
                    MsgDisposition::Absorb | MsgDisposition::Ignore => {}
                }
                Flow::Continue
            }
            ChatMessage::Err {
                display_name,
                content,
            } => {
                ui::peer_error(&display_name, &content);
                if self.session.lock().await.on_err() {
                    let _ = self.send(&ChatMessage::Bye).await;
                }
                self.close();
                Flow::Stop
            }
            ChatMessage::Bye => {
                self.session.lock().await.on_bye();
                self.close();
                Flow::Stop
            }
            // AUTH, JOIN and CONFIRM never flow toward a client.
            _ => self.protocol_failure().await,
        }
    }

    /// Malformed or state-illegal inbound traffic: notify the peer,
    /// say goodbye, tear down.
    async fn protocol_failure(&self) -> Flow {
        let notice = {
            let mut session = self.session.lock().await;
            session.fail();
            compose::error_notice(&session)
        };
        if let Some(notice) = notice {
            let _ = self.send(&notice).await;
        }
        let _ = self.send(&ChatMessage::Bye).await;

        self.session.lock().await.terminate();
        self.close();
        Flow::Stop
    }

    // -- Wire and lifecycle -----------------------------------------------

    async fn send(&self, message: &ChatMessage) -> Result<(), ParleyError> {
        let line = text::encode(message)?;
        self.writer.lock().await.send(&line).await?;
        Ok(())
    }

    /// Sends, or ends the session if the stream is broken.
    async fn send_or_close(&self, message: &ChatMessage) -> Flow {
        match self.send(message).await {
            Ok(()) => Flow::Continue,
            Err(error) => {
                ui::local_error(&error);
                self.session.lock().await.terminate();
                self.close();
                Flow::Stop
            }
        }
    }

    fn close(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            tracing::debug!("stream session closed");
        }
        self.closed.notify_waiters();
    }

    async fn wait_closed(&self) {
        let notified = self.closed.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a close racing this
        // call cannot be missed.
        notified.as_mut().enable();
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

/// Receive task: one inbound line at a time until the session ends or
/// the stream does.
async fn recv_loop(inner: Arc<Inner>, mut reader: StreamReader) {
    loop {
        match reader.read_message().await {
            Ok(Some(line)) => match text::decode(&line) {
                Ok(message) => {
                    if inner.apply_inbound(message).await == Flow::Stop {
                        break;
                    }
                }
                Err(error) => {
                    ui::local_error(&error);
                    inner.protocol_failure().await;
                    break;
                }
            },
            Ok(None) => {
                tracing::debug!("server closed the stream");
                inner.session.lock().await.terminate();
                inner.close();
                break;
            }
            Err(error) => {
                if !inner.done.load(Ordering::SeqCst) {
                    ui::local_error(&error);
                }
                inner.session.lock().await.terminate();
                inner.close();
                break;
            }
        }
    }
}
