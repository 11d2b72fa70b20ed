use std::sync::Arc;

use log::debug;
use peer_handshake_protocol::SessionDescription;
use tokio::sync::watch;

use crate::exchanger::DescriptionExchanger;
use crate::state::{ConnectionState, GatheringState, NegotiationPhase, Role, SignalingState};
use crate::transport::PeerTransport;

/// One negotiation attempt and the transport created for it.
pub struct Session<T: PeerTransport> {
    pub epoch: u64,
    pub role: Role,
    pub phase: NegotiationPhase,
    pub signaling: SignalingState,
    pub connection: ConnectionState,
    pub local_description: Option<SessionDescription>,
    pub remote_description: Option<SessionDescription>,
    /// The current local description already went out over the signaling channel
    pub description_sent: bool,
    pub exchanger: DescriptionExchanger<T>,
    // keeps gathering waits alive even if the transport drops its event sink
    _gathering: Arc<watch::Sender<GatheringState>>,
    closed: watch::Sender<bool>,
}

impl<T: PeerTransport> Session<T> {
    pub fn new(
        epoch: u64,
        role: Role,
        exchanger: DescriptionExchanger<T>,
        gathering: Arc<watch::Sender<GatheringState>>,
        closed: watch::Sender<bool>,
    ) -> Self {
        Self {
            epoch,
            role,
            phase: NegotiationPhase::Idle,
            signaling: SignalingState::Stable,
            connection: ConnectionState::New,
            local_description: None,
            remote_description: None,
            description_sent: false,
            exchanger,
            _gathering: gathering,
            closed,
        }
    }

    /// Moves to `phase` unless the connection is already up, renegotiation keeps it `Connected`.
    pub fn advance(&mut self, phase: NegotiationPhase) {
        if self.connection != ConnectionState::Connected {
            self.phase = phase;
        }
    }

    /// Wakes everything suspended on this session and shuts the transport down.
    pub fn close(&self) {
        debug!("closing session #{}", self.epoch);
        self.closed.send_replace(true);
        self.exchanger.transport().close();
    }
}
