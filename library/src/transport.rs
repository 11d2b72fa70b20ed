//! Seams towards the collaborators that actually move media: the peer connection and the
//! local capture devices.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use log::trace;
use peer_handshake_protocol::{IceCandidate, SessionDescription};
use tokio::sync::{mpsc, watch};

use crate::state::{ConnectionState, GatheringState};

/// The connectivity engine, e.g. an `RTCPeerConnection`.
///
/// One instance exists per negotiation attempt; it is created by the factory passed to
/// [`crate::one_to_one::Negotiator::new`] together with the [`TransportEvents`] it must
/// report through.
#[async_trait(?Send)]
pub trait PeerTransport {
    /// Media track handed to [`PeerTransport::add_track`] and reported back for the remote side
    type Track: Clone + Debug + 'static;

    async fn create_offer(&self) -> anyhow::Result<SessionDescription>;

    async fn create_answer(&self) -> anyhow::Result<SessionDescription>;

    async fn set_local_description(&self, description: &SessionDescription)
        -> anyhow::Result<()>;

    async fn set_remote_description(
        &self,
        description: &SessionDescription,
    ) -> anyhow::Result<()>;

    /// Discard a local offer that was not answered, back to `stable`
    async fn rollback(&self) -> anyhow::Result<()>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> anyhow::Result<()>;

    async fn add_track(&self, track: &Self::Track) -> anyhow::Result<()>;

    /// Current local description including every candidate gathered so far
    fn local_description(&self) -> Option<SessionDescription>;

    fn close(&self);
}

/// Capture and rendering side of the application.
#[async_trait(?Send)]
pub trait MediaBinding<T> {
    /// Local tracks to attach to a new session
    async fn acquire_local_tracks(&self) -> anyhow::Result<Vec<T>>;

    /// Called once for every track the other peer sends
    fn on_remote_track(&self, track: T);
}

/// Notification the transport raises on its own.
#[derive(Debug, Clone)]
pub enum TransportEvent<T> {
    LocalCandidate(IceCandidate),
    GatheringStateChanged(GatheringState),
    ConnectionStateChanged(ConnectionState),
    RemoteTrack(T),
}

/// Event stamped with the negotiation attempt that produced it.
#[derive(Debug, Clone)]
pub struct TaggedEvent<T> {
    pub epoch: u64,
    pub event: TransportEvent<T>,
}

/// Sink a [`PeerTransport`] reports its events into.
///
/// Cheap to clone; a closed negotiator simply stops listening, so reporting never fails.
#[derive(Debug)]
pub struct TransportEvents<T> {
    epoch: u64,
    sender: mpsc::UnboundedSender<TaggedEvent<T>>,
    gathering: Arc<watch::Sender<GatheringState>>,
}

impl<T> Clone for TransportEvents<T> {
    fn clone(&self) -> Self {
        Self {
            epoch: self.epoch,
            sender: self.sender.clone(),
            gathering: Arc::clone(&self.gathering),
        }
    }
}

impl<T> TransportEvents<T> {
    pub(crate) fn new(
        epoch: u64,
        sender: mpsc::UnboundedSender<TaggedEvent<T>>,
        gathering: Arc<watch::Sender<GatheringState>>,
    ) -> Self {
        Self {
            epoch,
            sender,
            gathering,
        }
    }

    /// A new local candidate was discovered
    pub fn local_candidate(&self, candidate: IceCandidate) {
        self.emit(TransportEvent::LocalCandidate(candidate));
    }

    /// Gathering moved on; waiters for `complete` are woken immediately
    pub fn gathering_state_changed(&self, state: GatheringState) {
        self.gathering.send_replace(state);
        self.emit(TransportEvent::GatheringStateChanged(state));
    }

    pub fn connection_state_changed(&self, state: ConnectionState) {
        self.emit(TransportEvent::ConnectionStateChanged(state));
    }

    /// The other peer started sending a track
    pub fn remote_track(&self, track: T) {
        self.emit(TransportEvent::RemoteTrack(track));
    }

    /// Gathering state as last reported
    pub fn gathering_state(&self) -> GatheringState {
        *self.gathering.borrow()
    }

    fn emit(&self, event: TransportEvent<T>) {
        if self
            .sender
            .send(TaggedEvent {
                epoch: self.epoch,
                event,
            })
            .is_err()
        {
            trace!("negotiator is gone, dropping transport event");
        }
    }
}
