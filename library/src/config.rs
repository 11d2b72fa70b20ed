use std::time::Duration;

use peer_handshake_protocol::PeerId;

use crate::constants::{DEFAULT_EVENT_CAPACITY, DEFAULT_GATHERING_TIMEOUT};

/// Knobs of a [`crate::one_to_one::Negotiator`].
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Upper bound on waiting for candidate gathering before a description is sent.
    /// When it elapses the description is sent as gathered so far and the remaining
    /// candidates reach the other side trickled. `None` waits forever.
    pub gathering_timeout: Option<Duration>,
    /// Relay locally discovered candidates in addition to embedding them in the description.
    pub trickle: bool,
    /// Create an offer as soon as the signaling server reports this peer joined first.
    pub initiate_when_host: bool,
    /// Buffer size of the [`crate::NegotiationEvent`] broadcast.
    pub event_capacity: usize,
    /// Identifier compared against the other peer's when both offer at once, the lower one
    /// yields. A random one is generated when unset.
    pub peer_id: Option<PeerId>,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            gathering_timeout: Some(DEFAULT_GATHERING_TIMEOUT),
            trickle: true,
            initiate_when_host: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            peer_id: None,
        }
    }
}
