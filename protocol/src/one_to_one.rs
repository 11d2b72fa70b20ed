/*!
Signaling messages exchanged between two negotiating peers and, optionally, the signaling server
relaying them.

Messages are JSON objects tagged with a `type` field:

```json
{ "type": "offer", "session_id": "room", "peer_id": "5f0c...", "sdp": "v=0..." }
{ "type": "answer", "session_id": "room", "sdp": "v=0..." }
{ "type": "ice_candidate", "session_id": "room", "candidate": "candidate:...", "sdpMid": "0", "sdpMLineIndex": 0 }
```
*/

use serde::{Deserialize, Serialize};

use crate::common::{IceCandidate, SessionDescription};
use crate::{IsHost, PeerId, SessionId};

/// `Enum` consisting of two main categories: messages used to set up a signaling session
/// with the relay and messages used to set up the `WebRTC` connection afterwards.
/// All of the messages include [`SessionId`] which is enough to identify the other peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    /// Peer joining a signaling session, only ever sent to the signaling server
    SessionJoin {
        /// Session to join
        session_id: SessionId,
    },
    /// Report back to the users that both of them are in session
    SessionReady {
        /// Session both peers joined
        session_id: SessionId,
        /// Whether the recipient joined first
        is_host: IsHost,
    },

    /// `SDP` offer that gets passed to the other user without modifications
    Offer {
        /// Session the offer belongs to
        session_id: SessionId,
        /// Random identifier of the offering peer, used to break glare
        peer_id: PeerId,
        /// Raw `SDP`
        sdp: String,
    },
    /// `SDP` answer that gets passed to the other user without modifications
    Answer {
        /// Session the answer belongs to
        session_id: SessionId,
        /// Raw `SDP`
        sdp: String,
    },
    /// Proposed ICE candidate of one user passed to the other user without modifications
    IceCandidate {
        /// Session the candidate belongs to
        session_id: SessionId,
        /// The candidate itself
        #[serde(flatten)]
        candidate: IceCandidate,
    },

    /// Generic error containing detailed information about the cause
    Error {
        /// Session the error relates to
        session_id: SessionId,
        /// Human readable cause
        message: String,
    },
}

impl SignalMessage {
    /// Session every message is scoped to
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        match self {
            Self::SessionJoin { session_id }
            | Self::SessionReady { session_id, .. }
            | Self::Offer { session_id, .. }
            | Self::Answer { session_id, .. }
            | Self::IceCandidate { session_id, .. }
            | Self::Error { session_id, .. } => session_id,
        }
    }

    /// Value of the `type` tag, handy for logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match *self {
            Self::SessionJoin { .. } => "session_join",
            Self::SessionReady { .. } => "session_ready",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice_candidate",
            Self::Error { .. } => "error",
        }
    }

    /// Description carried by an offer or an answer
    #[must_use]
    pub fn description(&self) -> Option<SessionDescription> {
        match self {
            Self::Offer { sdp, .. } => Some(SessionDescription::offer(sdp.clone())),
            Self::Answer { sdp, .. } => Some(SessionDescription::answer(sdp.clone())),
            _ => None,
        }
    }
}
