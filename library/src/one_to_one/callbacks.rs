use anyhow::anyhow;
use futures_util::future::LocalBoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use log::{debug, error, info, trace, warn};
use peer_handshake_protocol::one_to_one::SignalMessage;

use crate::channel::SignalingChannel;
use crate::events::NegotiationEvent;
use crate::one_to_one::Negotiator;
use crate::state::{ConnectionState, NegotiationPhase};
use crate::transport::{MediaBinding, PeerTransport, TaggedEvent, TransportEvent};
use crate::Error;

/// React to something the transport of session `epoch` reported.
pub(super) async fn handle_transport_event<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
    TaggedEvent { epoch, event }: TaggedEvent<T::Track>,
) where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    if !negotiator.is_current(epoch) {
        trace!("dropping event of disposed session #{}", epoch);
        return;
    }

    match event {
        TransportEvent::LocalCandidate(candidate) => {
            if !negotiator.inner.config.trickle {
                trace!("trickle disabled, local candidate stays in the description");
                return;
            }
            let index = negotiator.inner.local_candidates.enqueue(candidate);
            debug!("local ICE candidate #{} discovered", index);
            let description_sent = negotiator
                .with_session(epoch, |session| session.description_sent)
                .unwrap_or(false);
            if description_sent {
                flush_local_candidates(negotiator, epoch).await;
            }
        }
        TransportEvent::GatheringStateChanged(state) => {
            debug!("ICE gathering state: {}", state);
            negotiator.publish(NegotiationEvent::GatheringStateChanged(state));
        }
        TransportEvent::ConnectionStateChanged(state) => {
            handle_connection_state(negotiator, epoch, state).await;
        }
        TransportEvent::RemoteTrack(track) => {
            info!("remote track received: {:?}", track);
            negotiator.inner.media.on_remote_track(track);
            negotiator.publish(NegotiationEvent::RemoteTrackAdded);
        }
    }
}

async fn handle_connection_state<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
    epoch: u64,
    state: ConnectionState,
) where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let description_sent = negotiator.with_session(epoch, |session| {
        session.connection = state;
        match state {
            ConnectionState::Connected => session.phase = NegotiationPhase::Connected,
            ConnectionState::Failed | ConnectionState::Closed => {
                session.phase = NegotiationPhase::Failed;
            }
            _ => {}
        }
        session.description_sent
    });
    let Some(description_sent) = description_sent else {
        return;
    };
    negotiator.publish(NegotiationEvent::ConnectionStateChanged(state));

    match state {
        ConnectionState::Connected => {
            info!("peer connection established");
            negotiator.publish(NegotiationEvent::Connected);
            if description_sent {
                flush_local_candidates(negotiator, epoch).await;
            }
        }
        ConnectionState::Failed | ConnectionState::Closed => {
            error!("peer connection {}, not retrying", state);
            // whatever the peer sends from now on is for its next offer
            negotiator.inner.remote_candidates.clear();
            negotiator.inner.seen_candidates.borrow_mut().clear();
            negotiator.publish(NegotiationEvent::Failed {
                reason: format!("connection {state}"),
            });
        }
        ConnectionState::Disconnected => warn!("peer connection disconnected"),
        ConnectionState::New | ConnectionState::Checking => {
            debug!("peer connection state: {}", state);
        }
    }
}

/// Sends the local candidates held back until our description went out.
pub(super) async fn flush_local_candidates<T, C, M>(negotiator: &Negotiator<T, C, M>, epoch: u64)
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let report = negotiator
        .inner
        .local_candidates
        .flush(|queued| async move {
            if !negotiator.is_current(epoch) {
                return Err(anyhow!("session #{} is gone", epoch));
            }
            negotiator
                .send(SignalMessage::IceCandidate {
                    session_id: negotiator.inner.session_id.clone(),
                    candidate: queued.candidate,
                })
                .await?;
            negotiator.publish(NegotiationEvent::LocalCandidateSent);
            Ok(())
        })
        .await;
    if report.applied > 0 || report.failed > 0 {
        debug!(
            "local ICE candidates sent: {}, failed: {}",
            report.applied, report.failed
        );
    }
}

pub(super) async fn pump_events<T, C, M>(negotiator: &Negotiator<T, C, M>) -> usize
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let Ok(mut events) = negotiator.inner.events_rx.try_lock() else {
        trace!("transport events are consumed by the run loop");
        return 0;
    };
    let mut handled: usize = 0;
    while let Ok(event) = events.try_recv() {
        handle_transport_event(negotiator, event).await;
        handled = handled.saturating_add(1);
    }
    handled
}

pub(super) async fn run<T, C, M>(negotiator: &Negotiator<T, C, M>) -> crate::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let Ok(mut events) = negotiator.inner.events_rx.try_lock() else {
        return Err(Error::AlreadyRunning);
    };
    info!("negotiator {} running", negotiator.inner.peer_id);

    let mut in_flight: FuturesUnordered<LocalBoxFuture<'static, ()>> = FuturesUnordered::new();
    loop {
        tokio::select! {
            biased;
            Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
            Some(event) = events.recv() => {
                let negotiator = negotiator.clone();
                in_flight.push(
                    async move { handle_transport_event(&negotiator, event).await }.boxed_local(),
                );
            }
            message = negotiator.inner.channel.recv() => {
                let Some(message) = message else {
                    break;
                };
                let negotiator = negotiator.clone();
                in_flight.push(
                    async move {
                        if negotiator.handle_incoming(message).await.is_err() {
                            trace!("failed signaling message was already reported");
                        }
                    }
                    .boxed_local(),
                );
            }
        }
    }

    info!("signaling channel closed, negotiator {} stops", negotiator.inner.peer_id);
    Err(Error::ChannelClosed)
}
