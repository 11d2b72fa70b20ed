use peer_handshake_protocol::SdpType;

use crate::state::{ConnectionState, GatheringState, Role, SignalingState};

/// Everything a negotiator did or refused to do, for status displays and diagnostics.
///
/// Published on a broadcast channel, see [`crate::one_to_one::Negotiator::subscribe`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NegotiationEvent {
    SessionCreated { role: Role },
    LocalTrackAdded,
    SignalingStateChanged(SignalingState),
    GatheringStateChanged(GatheringState),
    /// Gathering did not finish in time, the description went out incomplete
    GatheringTimedOut,
    ConnectionStateChanged(ConnectionState),
    RemoteDescriptionSet(SdpType),
    OfferSent,
    AnswerSent,
    /// Remote candidate held until a remote description is installed
    CandidateQueued { index: u64 },
    CandidateApplied { index: u64 },
    CandidateRejected { index: u64, reason: String },
    LocalCandidateSent,
    /// Both peers offered; `yielded` tells whether this side rolled its offer back
    GlareResolved { yielded: bool },
    /// Signaling server paired this peer with another one
    PeerReady { is_host: bool },
    RemoteTrackAdded,
    Connected,
    Failed { reason: String },
    Closed,
    /// Condition that was reported but did not change anything
    Error(String),
}
