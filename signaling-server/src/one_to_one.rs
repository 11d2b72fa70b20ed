use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;

use peer_handshake_protocol::one_to_one::SignalMessage;
use peer_handshake_protocol::{SessionId, UserId};

/// The two peers of a session, in the order they joined.
#[derive(Debug, Default)]
pub struct Session {
    pub first: Option<UserId>,
    pub second: Option<UserId>,
}

impl Session {
    fn contains(&self, user_id: UserId) -> bool {
        self.first == Some(user_id) || self.second == Some(user_id)
    }

    fn other(&self, user_id: UserId) -> Option<UserId> {
        if self.first == Some(user_id) {
            self.second
        } else {
            self.first
        }
    }

    fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none()
    }
}

pub type Connections = Arc<RwLock<HashMap<UserId, mpsc::UnboundedSender<Message>>>>;
pub type Sessions = Arc<RwLock<HashMap<SessionId, Session>>>;

static NEXT_USER_ID: AtomicU64 = AtomicU64::new(1);

pub async fn user_connected(ws: WebSocket, connections: Connections, sessions: Sessions) {
    let user_id = UserId::new(NEXT_USER_ID.fetch_add(1, Ordering::Relaxed));
    info!("new user connected: {}", user_id);

    let (mut user_ws_tx, mut user_ws_rx) = ws.split();

    let (tx, rx) = mpsc::unbounded_channel();
    let mut rx = UnboundedReceiverStream::new(rx);

    tokio::task::spawn(async move {
        while let Some(message) = rx.next().await {
            if let Err(err) = user_ws_tx.send(message).await {
                error!("websocket send error (id={}): {}", user_id, err);
                break;
            }
        }
    });

    connections.write().await.insert(user_id, tx);

    while let Some(result) = user_ws_rx.next().await {
        let message = match result {
            Ok(message) => message,
            Err(err) => {
                error!("websocket error (id={}): {}", user_id, err);
                break;
            }
        };
        match message {
            Message::Text(text) => user_message(user_id, &text, &connections, &sessions).await,
            Message::Close(_) => break,
            _ => debug!("ignoring non-text frame from user {}", user_id),
        }
    }

    info!("user disconnected: {}", user_id);
    user_disconnected(user_id, &connections, &sessions).await;
}

async fn user_message(user_id: UserId, text: &str, connections: &Connections, sessions: &Sessions) {
    let message = match serde_json::from_str::<SignalMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            error!("malformed message from user {}: {}", user_id, err);
            return;
        }
    };
    info!("message received from user {}: {}", user_id, message.kind());

    let session_id = message.session_id().clone();
    let outcome = match message {
        SignalMessage::SessionJoin { session_id } => {
            join_session(user_id, session_id, connections, sessions).await
        }
        SignalMessage::SessionReady { .. } | SignalMessage::Error { .. } => Err(anyhow!(
            "`{}` messages are only sent by the signaling server",
            message.kind()
        )),
        // offers, answers and candidates go to the other peer without changing anything
        SignalMessage::Offer { .. }
        | SignalMessage::Answer { .. }
        | SignalMessage::IceCandidate { .. } => {
            forward(user_id, &message, connections, sessions).await
        }
    };

    if let Err(err) = outcome {
        warn!("rejecting message from user {}: {:#}", user_id, err);
        let reply = SignalMessage::Error {
            session_id,
            message: err.to_string(),
        };
        if let Err(err) = send_to(user_id, &reply, connections).await {
            error!("failed to report error to user {}: {:#}", user_id, err);
        }
    }
}

async fn join_session(
    user_id: UserId,
    session_id: SessionId,
    connections: &Connections,
    sessions: &Sessions,
) -> anyhow::Result<()> {
    let mut sessions = sessions.write().await;
    match sessions.entry(session_id.clone()) {
        // first user in session - create session object and wait for the other one
        Entry::Vacant(entry) => {
            entry.insert(Session {
                first: Some(user_id),
                second: None,
            });
            debug!("user {} opened session {}", user_id, session_id);
            Ok(())
        }
        Entry::Occupied(mut entry) => {
            let session = entry.get_mut();
            if session.contains(user_id) {
                bail!("already joined session {}", session_id);
            }
            let host = match (session.first, session.second) {
                (Some(host), None) => {
                    session.second = Some(user_id);
                    host
                }
                (None, Some(host)) => {
                    session.first = Some(user_id);
                    host
                }
                (None, None) => {
                    session.first = Some(user_id);
                    return Ok(());
                }
                (Some(_), Some(_)) => bail!("session {} is full", session_id),
            };

            info!("session {} ready, host is user {}", session_id, host);
            let host_message = SignalMessage::SessionReady {
                session_id: session_id.clone(),
                is_host: true,
            };
            let guest_message = SignalMessage::SessionReady {
                session_id,
                is_host: false,
            };
            send_to(host, &host_message, connections).await?;
            send_to(user_id, &guest_message, connections).await
        }
    }
}

async fn forward(
    user_id: UserId,
    message: &SignalMessage,
    connections: &Connections,
    sessions: &Sessions,
) -> anyhow::Result<()> {
    let session_id = message.session_id();
    let recipient = {
        let sessions = sessions.read().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| anyhow!("no such session: {}", session_id))?;
        if !session.contains(user_id) {
            bail!("not a member of session {}", session_id);
        }
        session
            .other(user_id)
            .ok_or_else(|| anyhow!("missing second user in session {}", session_id))?
    };
    send_to(recipient, message, connections).await
}

async fn send_to(
    recipient: UserId,
    message: &SignalMessage,
    connections: &Connections,
) -> anyhow::Result<()> {
    let text = serde_json::to_string(message)?;
    let connections = connections.read().await;
    let recipient_tx = connections
        .get(&recipient)
        .ok_or_else(|| anyhow!("user {} is no longer connected", recipient))?;
    recipient_tx
        .send(Message::Text(text))
        .map_err(|_closed| anyhow!("connection of user {} is closing", recipient))
}

async fn user_disconnected(user_id: UserId, connections: &Connections, sessions: &Sessions) {
    sessions.write().await.retain(|session_id, session| {
        if session.first == Some(user_id) {
            session.first = None;
        } else if session.second == Some(user_id) {
            session.second = None;
        }
        // remove session if it's empty
        let keep = !session.is_empty();
        if !keep {
            debug!("session {} closed", session_id);
        }
        keep
    });
    connections.write().await.remove(&user_id);
}
