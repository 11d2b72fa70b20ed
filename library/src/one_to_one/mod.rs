/*!
Offer/answer negotiation between exactly two peers.

A [`Negotiator`] owns one negotiation session at a time. It creates the transport through the
factory it was given, attaches local media, exchanges descriptions and candidates over a
[`SignalingChannel`] and reports progress as [`NegotiationEvent`]s.

Both peers run the same code. Whoever calls [`Negotiator::initiate`] first becomes the
initiator; if both do so at the same time the peer with the lower [`PeerId`] yields and answers
the other offer instead.

# Example

```
use peer_handshake::channel::SignalingChannel;
use peer_handshake::one_to_one::Negotiator;
use peer_handshake::{MediaBinding, NegotiatorConfig, PeerTransport, SessionId, TransportEvents};

async fn call<T, C, M>(
    channel: C,
    media: M,
    transport: impl Fn(TransportEvents<T::Track>) -> anyhow::Result<T> + 'static,
) -> peer_handshake::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let negotiator = Negotiator::new(
        SessionId::new("some-session-id".to_owned()),
        NegotiatorConfig::default(),
        channel,
        media,
        transport,
    );
    negotiator.join().await?;
    let driver = negotiator.clone();
    let (finished, initiated) = tokio::join!(driver.run(), negotiator.initiate());
    initiated?;
    finished
}
```
*/

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use peer_handshake_protocol::{IceCandidate, PeerId, SessionId};
use tokio::sync::{broadcast, mpsc, watch, Mutex};

use crate::candidate_queue::CandidateQueue;
use crate::channel::SignalingChannel;
use crate::config::NegotiatorConfig;
use crate::events::NegotiationEvent;
use crate::exchanger::DescriptionExchanger;
use crate::one_to_one::session::Session;
use crate::state::{GatheringState, NegotiationStatus, Role};
use crate::transport::{MediaBinding, PeerTransport, TaggedEvent, TransportEvents};
use crate::utils::get_random_peer_id;
use crate::Error;

mod callbacks;
mod session;
mod signal_handler;

pub use peer_handshake_protocol::one_to_one::SignalMessage;

type TransportFactory<T> =
    Box<dyn Fn(TransportEvents<<T as PeerTransport>::Track>) -> anyhow::Result<T>>;

struct NegotiatorInner<T: PeerTransport, C, M> {
    config: NegotiatorConfig,
    session_id: SessionId,
    peer_id: PeerId,
    channel: C,
    media: M,
    factory: TransportFactory<T>,
    session: RefCell<Option<Session<T>>>,
    /// Bumped whenever a session is created or torn down
    next_epoch: Cell<u64>,
    /// Serialises `initiate` and the handling of offers and answers
    negotiation: Mutex<()>,
    remote_candidates: CandidateQueue,
    local_candidates: CandidateQueue,
    seen_candidates: RefCell<HashSet<IceCandidate>>,
    events_tx: mpsc::UnboundedSender<TaggedEvent<T::Track>>,
    events_rx: Mutex<mpsc::UnboundedReceiver<TaggedEvent<T::Track>>>,
    notifications: broadcast::Sender<NegotiationEvent>,
}

/// One side of a two-peer negotiation.
///
/// Single threaded: all futures it returns are `!Send` and are meant to be driven on one task,
/// either by [`Negotiator::run`] or by calling [`Negotiator::handle_incoming`] and
/// [`Negotiator::pump_events`] yourself.
///
/// This class is a pointer to the underlying resource and can be cloned freely.
pub struct Negotiator<T: PeerTransport, C, M> {
    inner: Rc<NegotiatorInner<T, C, M>>,
}

impl<T: PeerTransport, C, M> Clone for Negotiator<T, C, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, C, M> Negotiator<T, C, M>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    /// Creates a negotiator for `session_id`. Nothing happens until
    /// [`Negotiator::initiate`] is called or a message arrives.
    ///
    /// `transport` is called once per negotiation session with the sink the new transport
    /// must report its events into.
    pub fn new(
        session_id: SessionId,
        config: NegotiatorConfig,
        channel: C,
        media: M,
        transport: impl Fn(TransportEvents<T::Track>) -> anyhow::Result<T> + 'static,
    ) -> Self {
        let peer_id = config.peer_id.clone().unwrap_or_else(get_random_peer_id);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(config.event_capacity.max(1));
        debug!("negotiator {} created for session {}", peer_id, session_id);
        Self {
            inner: Rc::new(NegotiatorInner {
                config,
                session_id,
                peer_id,
                channel,
                media,
                factory: Box::new(transport),
                session: RefCell::new(None),
                next_epoch: Cell::new(0),
                negotiation: Mutex::new(()),
                remote_candidates: CandidateQueue::default(),
                local_candidates: CandidateQueue::default(),
                seen_candidates: RefCell::new(HashSet::new()),
                events_tx,
                events_rx: Mutex::new(events_rx),
                notifications,
            }),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }

    /// Identifier used to break glare
    #[must_use]
    pub fn peer_id(&self) -> &PeerId {
        &self.inner.peer_id
    }

    #[must_use]
    pub fn channel(&self) -> &C {
        &self.inner.channel
    }

    #[must_use]
    pub fn config(&self) -> &NegotiatorConfig {
        &self.inner.config
    }

    /// Snapshot of the current session, or of an idle negotiator if there is none.
    #[must_use]
    pub fn status(&self) -> NegotiationStatus {
        let mut status = self
            .inner
            .session
            .borrow()
            .as_ref()
            .map(|session| NegotiationStatus {
                phase: session.phase,
                role: Some(session.role),
                signaling: session.signaling,
                connection: session.connection,
                gathering: session.exchanger.gathering_state(),
                has_local_description: session.local_description.is_some(),
                has_remote_description: session.remote_description.is_some(),
                ..NegotiationStatus::default()
            })
            .unwrap_or_default();
        status.pending_remote_candidates = self.inner.remote_candidates.len();
        status.pending_local_candidates = self.inner.local_candidates.len();
        status
    }

    /// Receiver of every [`NegotiationEvent`] published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NegotiationEvent> {
        self.inner.notifications.subscribe()
    }

    /// Asks the signaling server to pair this peer with the other one in the same session.
    ///
    /// # Errors
    /// [`Error::ChannelClosed`] or [`Error::Channel`] if the message could not be sent.
    pub async fn join(&self) -> crate::Result<()> {
        let result = self
            .send(SignalMessage::SessionJoin {
                session_id: self.inner.session_id.clone(),
            })
            .await;
        self.reported(result)
    }

    /// Starts a negotiation as initiator: acquires local media, sends an offer once candidate
    /// gathering settled and trickles the candidates found afterwards.
    ///
    /// Calling it on an established session renegotiates over the same transport.
    ///
    /// # Errors
    /// * [`Error::AlreadyNegotiating`] if an offer/answer exchange is already under way
    /// * [`Error::Media`] if local media could not be acquired, no session is created then
    /// * [`Error::Transport`], [`Error::Channel`] or [`Error::ChannelClosed`] if the session
    ///   had to be torn down
    pub async fn initiate(&self) -> crate::Result<()> {
        let result = signal_handler::initiate(self).await;
        self.reported(result)
    }

    /// Reacts to one message from the signaling channel.
    ///
    /// # Errors
    /// Discarded messages are reported as errors for which
    /// [`Error::is_discarded_message`] holds; the negotiation state is unchanged then.
    /// Everything [`Negotiator::initiate`] can fail with may also surface here.
    pub async fn handle_incoming(&self, message: SignalMessage) -> crate::Result<()> {
        let result = signal_handler::handle_signal_message(self, message).await;
        self.reported(result)
    }

    /// Processes transport events that were already delivered, returns how many.
    ///
    /// Does nothing while [`Negotiator::run`] is active, which handles them itself.
    pub async fn pump_events(&self) -> usize {
        callbacks::pump_events(self).await
    }

    /// Drives the negotiator: services inbound messages, transport events and the handlers
    /// they started, all on the current task. Sends nothing on its own.
    ///
    /// # Errors
    /// [`Error::ChannelClosed`] once the signaling channel ends, [`Error::AlreadyRunning`] if
    /// another `run` is active.
    pub async fn run(&self) -> crate::Result<()> {
        let result = callbacks::run(self).await;
        self.reported(result)
    }

    /// Tears the current session down. Operations suspended on it resolve without effect.
    pub fn close(&self) {
        if self.teardown() {
            info!("negotiation session {} closed", self.inner.session_id);
        }
        self.publish(NegotiationEvent::Closed);
    }

    fn publish(&self, event: NegotiationEvent) {
        trace!("publishing {:?}", event);
        if self.inner.notifications.send(event).is_err() {
            trace!("no subscribers for negotiation events");
        }
    }

    fn reported<R>(&self, result: crate::Result<R>) -> crate::Result<R> {
        if let Err(err) = &result {
            if err.is_discarded_message() {
                warn!("{}", err);
            } else {
                error!("{}", err);
            }
            self.publish(NegotiationEvent::Error(err.to_string()));
        }
        result
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map_or(false, |session| session.epoch == epoch)
    }

    /// Runs `f` on the session if it is still the one identified by `epoch`.
    fn with_session<R>(&self, epoch: u64, f: impl FnOnce(&mut Session<T>) -> R) -> Option<R> {
        self.inner
            .session
            .borrow_mut()
            .as_mut()
            .filter(|session| session.epoch == epoch)
            .map(f)
    }

    /// Epoch of the current session together with `f` applied to it.
    fn current_session<R>(&self, f: impl FnOnce(&Session<T>) -> R) -> Option<(u64, R)> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|session| (session.epoch, f(session)))
    }

    fn exchanger(&self, epoch: u64) -> Option<DescriptionExchanger<T>> {
        self.with_session(epoch, |session| session.exchanger.clone())
    }

    fn create_session(&self, role: Role) -> crate::Result<u64> {
        let epoch = self.inner.next_epoch.get().wrapping_add(1);
        self.inner.next_epoch.set(epoch);

        let (gathering_tx, gathering_rx) = watch::channel(GatheringState::New);
        let gathering_tx = Arc::new(gathering_tx);
        let events = TransportEvents::new(
            epoch,
            self.inner.events_tx.clone(),
            Arc::clone(&gathering_tx),
        );
        let transport = (self.inner.factory)(events).map_err(Error::Transport)?;
        let (closed_tx, closed_rx) = watch::channel(false);
        let exchanger = DescriptionExchanger::new(
            Rc::new(transport),
            gathering_rx,
            closed_rx,
            self.inner.config.gathering_timeout,
        );

        let session = Session::new(epoch, role, exchanger, gathering_tx, closed_tx);
        let previous = self.inner.session.borrow_mut().replace(session);
        if let Some(previous) = previous {
            previous.close();
        }
        info!("negotiation session #{} created as {:?}", epoch, role);
        self.publish(NegotiationEvent::SessionCreated { role });
        Ok(epoch)
    }

    /// Disposes the session and everything queued for it, returns whether there was one.
    fn teardown(&self) -> bool {
        self.dispose_session(false)
    }

    /// Disposes a session whose connection ended. Remote candidates received since then
    /// belong to the peer's next offer and stay queued for the session replacing it.
    fn replace_ended_session(&self) -> bool {
        self.dispose_session(true)
    }

    fn dispose_session(&self, keep_remote_candidates: bool) -> bool {
        self.inner
            .next_epoch
            .set(self.inner.next_epoch.get().wrapping_add(1));
        let session = self.inner.session.borrow_mut().take();
        if !keep_remote_candidates {
            self.inner.remote_candidates.clear();
            self.inner.seen_candidates.borrow_mut().clear();
        }
        self.inner.local_candidates.clear();
        session.map_or(false, |session| {
            session.close();
            true
        })
    }

    /// Tears the session down after a transport operation failed.
    fn abort(&self, epoch: u64, err: anyhow::Error) -> Error {
        if self.is_current(epoch) {
            self.teardown();
            self.publish(NegotiationEvent::Failed {
                reason: format!("{err:#}"),
            });
        }
        Error::Transport(err)
    }

    async fn send(&self, message: SignalMessage) -> crate::Result<()> {
        if !self.inner.channel.is_connected() {
            return Err(Error::ChannelClosed);
        }
        debug!("sending {} message", message.kind());
        self.inner
            .channel
            .send(message)
            .await
            .map_err(Error::Channel)
    }
}
