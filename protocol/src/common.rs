use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Proposed ICE candidate of one peer, passed to the other peer without modifications.
///
/// Field names on the wire follow the browser's `RTCIceCandidateInit`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Opaque candidate line, e.g. `candidate:1 1 udp 2122260223 192.168.1.2 54321 typ host`
    pub candidate: String,
    /// Media stream identification tag the candidate belongs to
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    /// Index of the media description the candidate belongs to
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    /// Candidate without any media section association.
    #[must_use]
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

/// Role of a session description in the offer/answer exchange.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Proposal sent by the peer that starts negotiating
    Offer,
    /// Reply confirming or narrowing an offer
    Answer,
}

impl Display for SdpType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Offer => write!(f, "offer"),
            Self::Answer => write!(f, "answer"),
        }
    }
}

/// Opaque `SDP` session description together with its role,
/// serialized as `{ "type": "offer", "sdp": "..." }`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer or answer
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    /// Raw `SDP` text
    pub sdp: String,
}

impl SessionDescription {
    /// Wrap `SDP` text into an offer
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Wrap `SDP` text into an answer
    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}
