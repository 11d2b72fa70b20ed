use peer_handshake_protocol::{PeerId, SessionId};
use uuid::Uuid;

use crate::constants::{SDP_PREVIEW_LEN, STUN_SERVER};

/// Returns a new `SessionId` instance that can be used to identify a session by signaling server.
#[must_use]
pub fn get_random_session_id() -> SessionId {
    SessionId::new(Uuid::new_v4().to_string())
}

/// Fresh glare tie-break identifier for one negotiator.
#[must_use]
pub fn get_random_peer_id() -> PeerId {
    PeerId::new(Uuid::new_v4().simple().to_string())
}

/// Specifies what kind of peer connection to create
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub enum ConnectionType {
    /// Within local network
    #[default]
    Local,
    /// Setup with STUN server, WAN capabilities but can fail
    Stun { urls: String },
}

impl ConnectionType {
    /// Setup with the default public STUN server
    #[must_use]
    pub fn default_stun() -> Self {
        Self::Stun {
            urls: STUN_SERVER.to_owned(),
        }
    }

    /// ICE server urls to put into the peer connection configuration
    #[must_use]
    pub fn ice_server_urls(&self) -> Vec<String> {
        match self {
            Self::Local => Vec::new(),
            Self::Stun { urls } => vec![urls.clone()],
        }
    }
}

/// First few characters of an `SDP` body, safe to log.
pub(crate) fn sdp_preview(sdp: &str) -> &str {
    match sdp.char_indices().nth(SDP_PREVIEW_LEN) {
        Some((end, _)) => sdp.get(..end).unwrap_or(sdp),
        None => sdp,
    }
}
