//! Scripted collaborators for driving negotiators without a browser.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::anyhow;
use async_trait::async_trait;
use peer_handshake::channel::SignalingChannel;
use peer_handshake::one_to_one::{Negotiator, SignalMessage};
use peer_handshake::{
    ConnectionState, GatheringState, IceCandidate, MediaBinding, NegotiationEvent,
    NegotiatorConfig, PeerId, PeerTransport, SdpType, SessionDescription, SessionId,
    TransportEvents,
};
use simplelog::{Config, LevelFilter, TestLogger};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::Notify;

pub const SESSION: &str = "test-session";

pub fn init_logging() {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}

pub fn session_id() -> SessionId {
    SessionId::new(SESSION.to_owned())
}

pub fn candidate(name: &str, n: u16) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n} 1 udp 2122260223 10.0.0.{n} 5000{n} typ host {name}"),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
    }
}

/// Suspends the first call of one named fake operation until the test releases it.
#[derive(Clone, Default)]
pub struct Hold {
    point: Rc<Cell<Option<&'static str>>>,
    reached: Rc<Notify>,
    released: Rc<Notify>,
}

impl Hold {
    async fn pass(&self, op: &str) {
        if self.point.get() != Some(op) {
            return;
        }
        self.point.set(None);
        self.reached.notify_one();
        self.released.notified().await;
    }

    /// Resolves once the held operation has started
    pub async fn until_reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

/// How a [`FakeTransport`] reports gathering after a local description is set.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Gathering {
    /// `gathering`, two candidates and `complete`, all synchronously
    Immediate,
    /// Nothing, the test reports through [`Peer::sink`]
    Manual,
}

#[derive(Debug, Clone)]
pub struct Behavior {
    pub gathering: Gathering,
    /// Report `checking` and `connected` once the offer/answer exchange is complete
    pub auto_connect: bool,
    pub fail_create_offer: bool,
    pub fail_set_remote: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            gathering: Gathering::Immediate,
            auto_connect: true,
            fail_create_offer: false,
            fail_set_remote: false,
        }
    }
}

/// Everything the transports of one peer were asked to do, in order.
#[derive(Debug, Default)]
pub struct TransportLog {
    pub created: usize,
    pub ops: Vec<String>,
    pub closed: usize,
}

impl TransportLog {
    pub fn count(&self, prefix: &str) -> usize {
        self.ops.iter().filter(|op| op.starts_with(prefix)).count()
    }

    pub fn position(&self, op: &str) -> Option<usize> {
        self.ops.iter().position(|logged| logged == op)
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| op.strip_prefix("add_candidate:"))
            .map(str::to_owned)
            .collect()
    }
}

pub struct FakeTransport {
    name: String,
    behavior: Behavior,
    events: TransportEvents<String>,
    log: Rc<RefCell<TransportLog>>,
    local: RefCell<Option<SessionDescription>>,
    created: Cell<u32>,
    hold: Hold,
}

impl FakeTransport {
    fn record(&self, op: String) {
        self.log.borrow_mut().ops.push(op);
    }

    fn gather(&self) {
        if self.behavior.gathering == Gathering::Manual {
            return;
        }
        self.events
            .gathering_state_changed(GatheringState::Gathering);
        for n in 1..=2 {
            self.events.local_candidate(candidate(&self.name, n));
        }
        self.events.gathering_state_changed(GatheringState::Complete);
    }

    fn connect(&self) {
        if self.behavior.auto_connect {
            self.events
                .connection_state_changed(ConnectionState::Checking);
            self.events
                .connection_state_changed(ConnectionState::Connected);
        }
    }
}

#[async_trait(?Send)]
impl PeerTransport for FakeTransport {
    type Track = String;

    async fn create_offer(&self) -> anyhow::Result<SessionDescription> {
        if self.behavior.fail_create_offer {
            return Err(anyhow!("offer rejected by the fake transport"));
        }
        self.created.set(self.created.get() + 1);
        self.record("create_offer".to_owned());
        Ok(SessionDescription::offer(format!(
            "v=0 o={} offer {}",
            self.name,
            self.created.get()
        )))
    }

    async fn create_answer(&self) -> anyhow::Result<SessionDescription> {
        self.created.set(self.created.get() + 1);
        self.record("create_answer".to_owned());
        Ok(SessionDescription::answer(format!(
            "v=0 o={} answer {}",
            self.name,
            self.created.get()
        )))
    }

    async fn set_local_description(&self, description: &SessionDescription) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.record(format!("set_local:{}", description.sdp_type));
        *self.local.borrow_mut() = Some(description.clone());
        self.gather();
        if description.sdp_type == SdpType::Answer {
            self.connect();
        }
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: &SessionDescription,
    ) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.hold.pass("set_remote").await;
        if self.behavior.fail_set_remote {
            return Err(anyhow!("remote description rejected by the fake transport"));
        }
        self.record(format!("set_remote:{}", description.sdp_type));
        if description.sdp_type == SdpType::Answer {
            self.connect();
        }
        Ok(())
    }

    async fn rollback(&self) -> anyhow::Result<()> {
        self.hold.pass("rollback").await;
        self.record("rollback".to_owned());
        self.local.borrow_mut().take();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        if candidate.candidate.contains("malformed") {
            return Err(anyhow!("malformed candidate"));
        }
        self.record(format!("add_candidate:{}", candidate.candidate));
        Ok(())
    }

    async fn add_track(&self, track: &String) -> anyhow::Result<()> {
        self.record(format!("add_track:{track}"));
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.local.borrow().clone()
    }

    fn close(&self) {
        self.log.borrow_mut().closed += 1;
    }
}

pub struct FakeMedia {
    tracks: Vec<String>,
    fail: bool,
    acquired: Rc<Cell<usize>>,
    remote_tracks: Rc<RefCell<Vec<String>>>,
    hold: Hold,
}

#[async_trait(?Send)]
impl MediaBinding<String> for FakeMedia {
    async fn acquire_local_tracks(&self) -> anyhow::Result<Vec<String>> {
        tokio::task::yield_now().await;
        self.hold.pass("acquire").await;
        if self.fail {
            return Err(anyhow!("camera permission denied"));
        }
        self.acquired.set(self.acquired.get() + 1);
        Ok(self.tracks.clone())
    }

    fn on_remote_track(&self, track: String) {
        self.remote_tracks.borrow_mut().push(track);
    }
}

/// Keeps what the negotiator sends, receives nothing on its own.
#[derive(Default)]
pub struct RecordingChannel {
    sent: RefCell<Vec<SignalMessage>>,
    disconnected: Cell<bool>,
}

impl RecordingChannel {
    pub fn take_sent(&self) -> Vec<SignalMessage> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn disconnect(&self) {
        self.disconnected.set(true);
    }
}

#[async_trait(?Send)]
impl SignalingChannel for RecordingChannel {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()> {
        if self.disconnected.get() {
            return Err(anyhow!("recording channel is disconnected"));
        }
        self.sent.borrow_mut().push(message);
        Ok(())
    }

    async fn recv(&self) -> Option<SignalMessage> {
        std::future::pending().await
    }

    fn is_connected(&self) -> bool {
        !self.disconnected.get()
    }
}

pub struct PeerBuilder {
    name: String,
    behavior: Behavior,
    config: NegotiatorConfig,
    tracks: Vec<String>,
    media_fails: bool,
    hold: Option<&'static str>,
}

impl PeerBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            behavior: Behavior::default(),
            config: NegotiatorConfig {
                peer_id: Some(PeerId::new(name.to_owned())),
                event_capacity: 1024,
                ..NegotiatorConfig::default()
            },
            tracks: vec![format!("{name}-audio"), format!("{name}-video")],
            media_fails: false,
            hold: None,
        }
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn config(mut self, config: NegotiatorConfig) -> Self {
        self.config = NegotiatorConfig {
            peer_id: self.config.peer_id.take(),
            ..config
        };
        self
    }

    pub fn peer_id(mut self, peer_id: &str) -> Self {
        self.config.peer_id = Some(PeerId::new(peer_id.to_owned()));
        self
    }

    pub fn media_fails(mut self) -> Self {
        self.media_fails = true;
        self
    }

    /// Suspends the first `acquire`, `set_remote` or `rollback` on [`Peer::hold`]
    pub fn hold(mut self, point: &'static str) -> Self {
        self.hold = Some(point);
        self
    }

    pub fn build<C: SignalingChannel + 'static>(self, channel: C) -> Peer<C> {
        let log = Rc::new(RefCell::new(TransportLog::default()));
        let sinks = Rc::new(RefCell::new(Vec::new()));
        let acquired = Rc::new(Cell::new(0));
        let remote_tracks = Rc::new(RefCell::new(Vec::new()));
        let hold = Hold::default();
        hold.point.set(self.hold);

        let media = FakeMedia {
            tracks: self.tracks,
            fail: self.media_fails,
            acquired: Rc::clone(&acquired),
            remote_tracks: Rc::clone(&remote_tracks),
            hold: hold.clone(),
        };
        let factory = {
            let name = self.name;
            let behavior = self.behavior;
            let log = Rc::clone(&log);
            let sinks = Rc::clone(&sinks);
            let hold = hold.clone();
            move |events: TransportEvents<String>| -> anyhow::Result<FakeTransport> {
                log.borrow_mut().created += 1;
                sinks.borrow_mut().push(events.clone());
                Ok(FakeTransport {
                    name: name.clone(),
                    behavior: behavior.clone(),
                    events,
                    log: Rc::clone(&log),
                    local: RefCell::new(None),
                    created: Cell::new(0),
                    hold: hold.clone(),
                })
            }
        };
        let negotiator = Negotiator::new(session_id(), self.config, channel, media, factory);
        let events = negotiator.subscribe();
        Peer {
            negotiator,
            log,
            sinks,
            acquired,
            remote_tracks,
            events,
            hold,
        }
    }
}

pub struct Peer<C: SignalingChannel + 'static = RecordingChannel> {
    pub negotiator: Negotiator<FakeTransport, C, FakeMedia>,
    pub log: Rc<RefCell<TransportLog>>,
    sinks: Rc<RefCell<Vec<TransportEvents<String>>>>,
    pub acquired: Rc<Cell<usize>>,
    pub remote_tracks: Rc<RefCell<Vec<String>>>,
    pub events: broadcast::Receiver<NegotiationEvent>,
    pub hold: Hold,
}

impl<C: SignalingChannel + 'static> Peer<C> {
    /// Event sink of the most recently created transport
    pub fn sink(&self) -> TransportEvents<String> {
        self.sinks
            .borrow()
            .last()
            .cloned()
            .expect("no transport created yet")
    }

    /// Every negotiation event published since the last call
    pub fn drain_events(&mut self) -> Vec<NegotiationEvent> {
        let mut events = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => return events,
            }
        }
    }
}

impl Peer<RecordingChannel> {
    pub fn take_sent(&self) -> Vec<SignalMessage> {
        self.negotiator.channel().take_sent()
    }

    /// Handles pending transport events, then returns what was sent
    pub async fn flush(&self) -> Vec<SignalMessage> {
        self.negotiator.pump_events().await;
        self.take_sent()
    }
}

pub fn peer(name: &str) -> Peer {
    PeerBuilder::new(name).build(RecordingChannel::default())
}

/// Feeds `messages` to `to` in order, returning the results.
pub async fn deliver(
    to: &Peer,
    messages: impl IntoIterator<Item = SignalMessage>,
) -> Vec<peer_handshake::Result<()>> {
    let mut results = Vec::new();
    for message in messages {
        results.push(to.negotiator.handle_incoming(message).await);
    }
    results
}

pub fn offers(messages: &[SignalMessage]) -> usize {
    messages
        .iter()
        .filter(|message| matches!(message, SignalMessage::Offer { .. }))
        .count()
}

pub fn answers(messages: &[SignalMessage]) -> usize {
    messages
        .iter()
        .filter(|message| matches!(message, SignalMessage::Answer { .. }))
        .count()
}

pub fn candidates(messages: &[SignalMessage]) -> Vec<IceCandidate> {
    messages
        .iter()
        .filter_map(|message| match message {
            SignalMessage::IceCandidate { candidate, .. } => Some(candidate.clone()),
            _ => None,
        })
        .collect()
}
