//! The datagram-transport chat client.
//!
//! Everything the stream client does, plus the reliability layer: each
//! outbound message (except CONFIRM) carries a fresh ID and is
//! retransmitted until confirmed, every inbound message is confirmed
//! back (duplicates included, since a repeat means our CONFIRM was
//! lost), and duplicate inbound IDs are absorbed after acknowledging.
//!
//! AUTH is awaited in the input task so a confirmation timeout there
//! is immediately fatal; JOIN and MSG run as tasks in a `JoinSet` so
//! typing stays responsive while a send is still being retried. The
//! set is shut down before the farewell, abandoning whatever is still
//! unconfirmed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parley_arq::{
    ArqError, ArqLedger, DatagramSink, MessageIds, RetryPolicy,
    send_confirmed,
};
use parley_protocol::binary::{self, Frame};
use parley_protocol::ChatMessage;
use parley_session::{
    MsgDisposition, ReplyOutcome, Session, SessionState,
};
use parley_transport::DatagramLink;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;

use crate::ParleyError;
use crate::chat::{Chat, Flow};
use crate::command::{self, Command};
use crate::compose;
use crate::config::ClientConfig;
use crate::ui;

/// A chat client speaking binary frames over UDP.
pub struct UdpChat {
    inner: Arc<Inner>,
}

/// State shared by the input task, the receive task, and the
/// confirmed-send tasks.
struct Inner {
    link: DatagramLink,
    session: Mutex<Session>,
    ledger: ArqLedger,
    ids: MessageIds,
    policy: RetryPolicy,
    sends: Mutex<JoinSet<()>>,
    closed: Notify,
    done: AtomicBool,
    // Claimed by whichever path tears the session down first.
    shutting_down: AtomicBool,
}

impl DatagramSink for Inner {
    async fn transmit(&self, frame: &[u8]) -> Result<(), ArqError> {
        self.link
            .send(frame)
            .await
            .map_err(|error| ArqError::Send(Box::new(error)))
    }
}

impl UdpChat {
    /// Binds a local socket and starts the receive task. Nothing goes
    /// to the server until the first command.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ParleyError> {
        let link = DatagramLink::bind(config.server).await?;

        let inner = Arc::new(Inner {
            link,
            session: Mutex::new(Session::with_default_channel(
                config.default_channel.clone(),
            )),
            ledger: ArqLedger::new(),
            ids: MessageIds::new(),
            policy: config.retry,
            sends: Mutex::new(JoinSet::new()),
            closed: Notify::new(),
            done: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        });
        tokio::spawn(recv_loop(Arc::clone(&inner)));

        Ok(Self { inner })
    }

    /// Current session state, for callers that poll for progress.
    pub async fn state(&self) -> SessionState {
        self.inner.session.lock().await.state()
    }

    /// The local socket address, for tests that play the server.
    pub fn local_addr(&self) -> Result<SocketAddr, ParleyError> {
        Ok(self.inner.link.local_addr()?)
    }
}

impl Chat for UdpChat {
    async fn handle_line(&self, line: &str) -> Flow {
        let command = match command::parse(line) {
            Ok(command) => command,
            Err(error) => {
                ui::local_error(&error);
                return Flow::Continue;
            }
        };

        match command {
            Command::Help => {
                ui::help();
                Flow::Continue
            }
            Command::Rename { display_name } => {
                compose::rename(
                    &mut *self.inner.session.lock().await,
                    display_name,
                );
                Flow::Continue
            }
            Command::Auth {
                username,
                secret,
                display_name,
            } => {
                let message = compose::auth(
                    &mut *self.inner.session.lock().await,
                    username,
                    secret,
                    display_name,
                );
                match message {
                    // Awaited here: an unconfirmed AUTH is fatal.
                    Some(message) => match self
                        .inner
                        .send_confirmed_message(message)
                        .await
                    {
                        Ok(()) => Flow::Continue,
                        Err(error) => {
                            ui::local_error(&error);
                            self.inner.shutdown(false).await;
                            Flow::Stop
                        }
                    },
                    None => Flow::Continue,
                }
            }
            Command::Join { channel } => {
                let message = compose::join(
                    &mut *self.inner.session.lock().await,
                    channel,
                );
                if let Some(message) = message {
                    spawn_confirmed_send(&self.inner, message).await;
                }
                Flow::Continue
            }
            Command::Say(content) => {
                let message =
                    compose::say(&*self.inner.session.lock().await, content);
                if let Some(message) = message {
                    spawn_confirmed_send(&self.inner, message).await;
                }
                Flow::Continue
            }
        }
    }

    async fn disconnect(&self) {
        let send_bye = {
            let session = self.inner.session.lock().await;
            // No farewell is owed before the first AUTH.
            session.engaged() && !session.is_terminal()
        };
        self.inner.shutdown(send_bye).await;
    }

    async fn wait_closed(&self) {
        self.inner.wait_closed().await;
    }
}

impl Inner {
    // -- Outbound ---------------------------------------------------------

    /// Encodes `message` under a fresh ID and retries it until
    /// confirmed or the budget runs out.
    async fn send_confirmed_message(
        &self,
        message: ChatMessage,
    ) -> Result<(), ParleyError> {
        let id = self.ids.next().ok_or(ArqError::IdsExhausted)?;
        let frame = binary::encode(&Frame::new(id, message));
        send_confirmed(self, &self.ledger, &self.policy, id, &frame).await?;
        Ok(())
    }

    /// Confirms one inbound message ID. Delivery is not guaranteed;
    /// the peer retransmits if this is lost.
    async fn acknowledge(&self, ref_id: u16) {
        let frame =
            binary::encode(&Frame::new(0, ChatMessage::Confirm { ref_id }));
        if let Err(error) = self.link.send(&frame).await {
            tracing::debug!(%error, ref_id, "failed to send CONFIRM");
        }
    }

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
                let live = self.session.lock().await.on_err();
                self.shutdown(live).await;
                Flow::Stop
            }
            ChatMessage::Bye => {
                self.session.lock().await.on_bye();
                // The peer said goodbye first; ours is suppressed.
                self.shutdown(false).await;
                Flow::Stop
            }
            // AUTH, JOIN and CONFIRM never reach this point.
            _ => self.protocol_failure().await,
        }
    }

    /// Malformed or state-illegal inbound traffic: tell the peer with
    /// an ERR, then say goodbye and tear down.
    async fn protocol_failure(&self) -> Flow {
        let notice = {
            let mut session = self.session.lock().await;
            session.fail();
            compose::error_notice(&session)
        };
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            self.wait_closed().await;
            return Flow::Stop;
        }
        if let (Some(notice), Some(id)) = (notice, self.ids.next()) {
            let frame = binary::encode(&Frame::new(id, notice));
            self.send_confirmed_pumping(id, &frame).await;
        }
        self.teardown(true).await;
        Flow::Stop
    }

    // -- Lifecycle --------------------------------------------------------

    /// Ends the session, optionally with a confirmed BYE. Idempotent;
    /// a second caller waits for the first to finish.
    async fn shutdown(&self, send_bye: bool) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            self.wait_closed().await;
            return;
        }
        self.teardown(send_bye).await;
    }

    async fn teardown(&self, send_bye: bool) {
        self.session.lock().await.terminate();
        // Abandon whatever is still unconfirmed.
        self.sends.lock().await.shutdown().await;
        if send_bye {
            match self.ids.next() {
                Some(id) => {
                    let frame =
                        binary::encode(&Frame::new(id, ChatMessage::Bye));
                    self.send_confirmed_pumping(id, &frame).await;
                }
                None => tracing::debug!("no ID left for the farewell"),
            }
        }
        self.close();
    }

    /// A confirmed send that pumps its own confirmations, for the
    /// teardown paths where the receive task is no longer (or not
    /// reliably) reading. Bounded by the shutdown window; an
    /// unconfirmed farewell is logged and abandoned.
    async fn send_confirmed_pumping(&self, id: u16, frame: &[u8]) {
        let send = send_confirmed(self, &self.ledger, &self.policy, id, frame);
        let pump = async {
            loop {
                match self.link.recv().await {
                    Ok((bytes, src)) => {
                        self.link.learn_peer(src);
                        if let Ok(frame) = binary::decode(&bytes) {
                            if let ChatMessage::Confirm { ref_id } =
                                frame.message
                            {
                                self.ledger.confirm(ref_id);
                            }
                        }
                    }
                    Err(_) => return,
                }
            }
        };

        let outcome =
            tokio::time::timeout(self.policy.shutdown_window(), async {
                tokio::select! {
                    result = send => result,
                    () = pump => Ok(()),
                }
            })
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::debug!(%error, id, "farewell unconfirmed");
            }
            Err(_) => {
                tracing::debug!(id, "farewell window elapsed");
            }
        }
    }

    fn close(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            tracing::debug!("datagram session closed");
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

/// Runs a confirmed send as its own task so input handling is not
/// blocked by retransmission waits.
async fn spawn_confirmed_send(inner: &Arc<Inner>, message: ChatMessage) {
    let task_inner = Arc::clone(inner);
    inner.sends.lock().await.spawn(async move {
        if let Err(error) = task_inner.send_confirmed_message(message).await {
            ui::local_error(&error);
            // Fatal, but tasks in the set must not drain the set
            // themselves; just mark the session closed.
            if !task_inner.shutting_down.swap(true, Ordering::SeqCst) {
                task_inner.session.lock().await.terminate();
                task_inner.close();
            }
        }
    });
}

/// Receive task: confirms, deduplicates, and applies inbound frames
/// until the session ends.
async fn recv_loop(inner: Arc<Inner>) {
    loop {
        let datagram = tokio::select! {
            () = inner.wait_closed() => return,
            result = inner.link.recv() => result,
        };
        let (bytes, src) = match datagram {
            Ok(datagram) => datagram,
            Err(error) => {
                if !inner.done.load(Ordering::SeqCst) {
                    ui::local_error(&error);
                }
                if !inner.shutting_down.swap(true, Ordering::SeqCst) {
                    inner.session.lock().await.terminate();
                    inner.close();
                }
                return;
            }
        };

        // The first reply fixes the server's per-session port.
        inner.link.learn_peer(src);

        let frame = match binary::decode(&bytes) {
            Ok(frame) => frame,
            Err(error) => {
                ui::local_error(&error);
                inner.protocol_failure().await;
                return;
            }
        };

        if !frame.message.needs_confirm() {
            // A CONFIRM is the one message that is never acknowledged;
            // it settles one of our own outstanding sends instead.
            if let ChatMessage::Confirm { ref_id } = frame.message {
                inner.ledger.confirm(ref_id);
            }
            continue;
        }

        // Acknowledge everything else, duplicates included: a repeat
        // means our previous CONFIRM was lost.
        inner.acknowledge(frame.message_id).await;
        if !inner.ledger.record_inbound(frame.message_id) {
            tracing::debug!(id = frame.message_id, "duplicate absorbed");
            continue;
        }

        if inner.apply_inbound(frame.message).await == Flow::Stop {
            return;
        }
    }
}
