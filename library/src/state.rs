use std::fmt::{Display, Formatter};

/// Which side of the exchange produced the first offer of the session.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Initiator,
    Responder,
}

/// Offer/answer sub-state, mirrors `RTCSignalingState`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SignalingState {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
}

impl Display for SignalingState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match *self {
            Self::Stable => "stable",
            Self::HaveLocalOffer => "have-local-offer",
            Self::HaveRemoteOffer => "have-remote-offer",
        })
    }
}

/// Connectivity sub-state as reported by the transport, mirrors `RTCPeerConnectionState`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ConnectionState {
    #[default]
    New,
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// `failed` and `closed` are never left again without a new session.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match *self {
            Self::New => "new",
            Self::Checking => "checking",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        })
    }
}

/// Candidate gathering progress, mirrors `RTCIceGatheringState`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum GatheringState {
    #[default]
    New,
    Gathering,
    Complete,
}

impl Display for GatheringState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match *self {
            Self::New => "new",
            Self::Gathering => "gathering",
            Self::Complete => "complete",
        })
    }
}

/// Coarse progress of one negotiation attempt.
///
/// ```text
/// Idle -> OfferCreated -> OfferSent -> AnswerReceived --> Connected
///      \-> AnswerPending -> AnswerSent --------------/
/// ```
/// `Failed` can follow any of them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum NegotiationPhase {
    #[default]
    Idle,
    OfferCreated,
    OfferSent,
    AnswerPending,
    AnswerSent,
    AnswerReceived,
    Connected,
    Failed,
}

/// Snapshot returned by [`crate::one_to_one::Negotiator::status`].
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct NegotiationStatus {
    pub phase: NegotiationPhase,
    pub role: Option<Role>,
    pub signaling: SignalingState,
    pub connection: ConnectionState,
    pub gathering: GatheringState,
    pub has_local_description: bool,
    pub has_remote_description: bool,
    pub pending_remote_candidates: usize,
    pub pending_local_candidates: usize,
}
