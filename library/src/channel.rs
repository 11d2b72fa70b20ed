//! Signaling channel seam and an in-memory implementation of it.

use std::cell::RefCell;

use anyhow::anyhow;
use async_trait::async_trait;
use log::error;
use peer_handshake_protocol::one_to_one::SignalMessage;
use tokio::sync::{mpsc, Mutex};

/// Out-of-band transport for signaling messages, e.g. a `WebSocket` to a signaling server.
///
/// Connection to the other side is expected to be established before negotiation starts.
#[async_trait(?Send)]
pub trait SignalingChannel {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()>;

    /// Next message from the other side, `None` once the channel is gone for good.
    ///
    /// Must be cancel safe: [`crate::one_to_one::Negotiator::run`] drops a pending `recv`
    /// whenever another event wins the race and calls it again later.
    async fn recv(&self) -> Option<SignalMessage>;

    fn is_connected(&self) -> bool;
}

/// Turn a message into its JSON wire form.
///
/// # Errors
/// Only if `serde_json` fails to serialize, which it does not for well-formed messages.
pub fn encode_message(message: &SignalMessage) -> crate::Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Parse a message from its JSON wire form.
///
/// # Errors
/// [`crate::Error::Codec`] if the text is not a valid signaling message.
pub fn decode_message(text: &str) -> crate::Result<SignalMessage> {
    Ok(serde_json::from_str(text)?)
}

/// One end of an in-memory signaling channel, created in connected pairs.
///
/// Messages travel as JSON text, exactly as they would over a socket.
#[derive(Debug)]
pub struct LoopbackChannel {
    outgoing: RefCell<Option<mpsc::UnboundedSender<String>>>,
    incoming: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl LoopbackChannel {
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (first_tx, first_rx) = mpsc::unbounded_channel();
        let (second_tx, second_rx) = mpsc::unbounded_channel();
        (
            Self {
                outgoing: RefCell::new(Some(first_tx)),
                incoming: Mutex::new(second_rx),
            },
            Self {
                outgoing: RefCell::new(Some(second_tx)),
                incoming: Mutex::new(first_rx),
            },
        )
    }

    /// Stop sending; the other end sees its `recv` return `None` once drained.
    pub fn disconnect(&self) {
        self.outgoing.borrow_mut().take();
    }
}

#[async_trait(?Send)]
impl SignalingChannel for LoopbackChannel {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()> {
        let text = encode_message(&message)?;
        let outgoing = self.outgoing.borrow();
        let sender = outgoing
            .as_ref()
            .ok_or_else(|| anyhow!("loopback channel is disconnected"))?;
        sender
            .send(text)
            .map_err(|err| anyhow!("other end of the loopback channel is gone: {}", err))
    }

    async fn recv(&self) -> Option<SignalMessage> {
        let mut incoming = self.incoming.lock().await;
        loop {
            let text = incoming.recv().await?;
            match decode_message(&text) {
                Ok(message) => return Some(message),
                Err(err) => error!("failed to deserialize signaling message: {}", err),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.outgoing
            .borrow()
            .as_ref()
            .map_or(false, |sender| !sender.is_closed())
    }
}
