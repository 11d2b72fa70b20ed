use peer_handshake_protocol::{PeerId, SessionId};
use thiserror::Error;

use crate::state::SignalingState;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Everything negotiation can report back to its caller.
///
/// Only [`Error::Transport`], [`Error::Channel`] and [`Error::ChannelClosed`] leave the
/// negotiator in a different state than before the call; the rest are reported and dropped.
#[derive(Debug, Error)]
pub enum Error {
    /// Local tracks could not be acquired, nothing was negotiated
    #[error("failed to acquire local media: {0:#}")]
    Media(#[source] anyhow::Error),

    /// `initiate` called while an offer/answer exchange is already in progress
    #[error("already negotiating (signaling state: {0})")]
    AlreadyNegotiating(SignalingState),

    /// Answer arrived without a matching local offer
    #[error("discarding answer received in signaling state {0}")]
    UnexpectedAnswer(SignalingState),

    /// Candidate was already accepted once
    #[error("discarding duplicate ICE candidate: {0}")]
    DuplicateCandidate(String),

    /// Message addressed to a different session
    #[error("discarding message for session {received}, negotiating session {expected}")]
    ForeignSession {
        /// Session this negotiator belongs to
        expected: SessionId,
        /// Session named by the message
        received: SessionId,
    },

    /// Both peers offered and both use the same identifier, so neither can yield
    #[error("glare with identical peer id {0}, ignoring remote offer")]
    GlareTie(PeerId),

    /// Message that only the signaling server should ever receive
    #[error("unexpected `{0}` message from the signaling channel")]
    UnexpectedMessage(&'static str),

    /// Signaling server reported a failure
    #[error("signaling server error: {0}")]
    Relay(String),

    /// The underlying peer connection rejected an operation
    #[error("transport operation failed: {0:#}")]
    Transport(#[source] anyhow::Error),

    /// Sending over the signaling channel failed
    #[error("signaling channel failed: {0:#}")]
    Channel(#[source] anyhow::Error),

    /// Signaling channel is known to be disconnected
    #[error("signaling channel is closed")]
    ChannelClosed,

    /// [`crate::one_to_one::Negotiator::run`] is already driving this negotiator
    #[error("negotiator is already running")]
    AlreadyRunning,

    /// Malformed message on the signaling channel
    #[error("malformed signaling message: {0}")]
    Codec(#[from] serde_json::Error),
}

impl Error {
    /// Whether the condition was only reported and the negotiation state is untouched.
    #[must_use]
    pub const fn is_discarded_message(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedAnswer(_)
                | Self::DuplicateCandidate(_)
                | Self::ForeignSession { .. }
                | Self::GlareTie(_)
                | Self::UnexpectedMessage(_)
        )
    }
}
