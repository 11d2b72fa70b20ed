use std::cmp::Ordering;

use anyhow::anyhow;
use log::{debug, info, warn};
use peer_handshake_protocol::one_to_one::SignalMessage;
use peer_handshake_protocol::{IceCandidate, PeerId, SdpType, SessionDescription};

use crate::channel::SignalingChannel;
use crate::events::NegotiationEvent;
use crate::exchanger::{DescriptionExchanger, GatheringOutcome};
use crate::one_to_one::session::Session;
use crate::one_to_one::Negotiator;
use crate::state::{NegotiationPhase, Role, SignalingState};
use crate::transport::{MediaBinding, PeerTransport};
use crate::Error;

/// Basic signaling message dispatch.
pub(super) async fn handle_signal_message<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
    message: SignalMessage,
) -> crate::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let session_id = &negotiator.inner.session_id;
    if message.session_id() != session_id {
        return Err(Error::ForeignSession {
            expected: session_id.clone(),
            received: message.session_id().clone(),
        });
    }
    debug!("received {} message", message.kind());

    match message {
        SignalMessage::Offer { peer_id, sdp, .. } => handle_offer(negotiator, peer_id, sdp).await,
        SignalMessage::Answer { sdp, .. } => handle_answer(negotiator, sdp).await,
        SignalMessage::IceCandidate { candidate, .. } => {
            handle_remote_candidate(negotiator, candidate).await
        }
        SignalMessage::SessionReady { is_host, .. } => {
            info!("peer joined session {}, is host: {}", session_id, is_host);
            negotiator.publish(NegotiationEvent::PeerReady { is_host });
            if is_host && negotiator.inner.config.initiate_when_host {
                initiate(negotiator).await
            } else {
                Ok(())
            }
        }
        SignalMessage::Error { message, .. } => Err(Error::Relay(message)),
        SignalMessage::SessionJoin { .. } => Err(Error::UnexpectedMessage("session_join")),
    }
}

pub(super) async fn initiate<T, C, M>(negotiator: &Negotiator<T, C, M>) -> crate::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let _negotiation = negotiator.inner.negotiation.lock().await;

    let current = negotiator
        .current_session(|session| (session.signaling, session.connection.is_terminal()));
    let epoch = match current {
        Some((_, (signaling, _))) if signaling != SignalingState::Stable => {
            return Err(Error::AlreadyNegotiating(signaling));
        }
        Some((epoch, (_, false))) => {
            info!("renegotiating session #{}", epoch);
            epoch
        }
        Some((_, (_, true))) | None => {
            if current.is_some() && negotiator.teardown() {
                debug!("replacing a session whose connection ended");
            }
            let generation = negotiator.inner.next_epoch.get();
            let tracks = negotiator
                .inner
                .media
                .acquire_local_tracks()
                .await
                .map_err(Error::Media)?;
            if negotiator.inner.next_epoch.get() != generation {
                debug!("negotiator closed while acquiring media");
                return Ok(());
            }
            let epoch = negotiator.create_session(Role::Initiator)?;
            attach_tracks(negotiator, epoch, &tracks).await?;
            epoch
        }
    };

    let Some(exchanger) = negotiator.exchanger(epoch) else {
        return Ok(());
    };
    let offer = match exchanger.create_offer().await {
        Ok(offer) => offer,
        Err(err) => return Err(negotiator.abort(epoch, err)),
    };
    if !negotiator.is_current(epoch) {
        return Ok(());
    }
    if let Err(err) = exchanger.set_local(&offer).await {
        return Err(negotiator.abort(epoch, err));
    }
    let installed = negotiator.with_session(epoch, |session| {
        session.local_description = Some(offer);
        session.signaling = SignalingState::HaveLocalOffer;
        session.advance(NegotiationPhase::OfferCreated);
        session.description_sent = false;
    });
    if installed.is_none() {
        return Ok(());
    }
    negotiator.publish(NegotiationEvent::SignalingStateChanged(
        SignalingState::HaveLocalOffer,
    ));

    send_description(negotiator, epoch, &exchanger).await
}

async fn handle_offer<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
    remote_peer_id: PeerId,
    sdp: String,
) -> crate::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let _negotiation = negotiator.inner.negotiation.lock().await;

    let current = negotiator
        .current_session(|session| (session.signaling, session.connection.is_terminal()));
    let epoch = match current {
        Some((epoch, (SignalingState::HaveLocalOffer, _))) => {
            match resolve_glare(negotiator, epoch, remote_peer_id).await? {
                Some(epoch) => epoch,
                None => return Ok(()),
            }
        }
        Some((epoch, (_, false))) => {
            info!("remote peer renegotiates session #{}", epoch);
            epoch
        }
        Some((_, (_, true))) | None => {
            if current.is_some() && negotiator.replace_ended_session() {
                debug!("replacing a session whose connection ended");
            }
            match create_responder_session(negotiator).await? {
                Some(epoch) => epoch,
                None => return Ok(()),
            }
        }
    };

    let Some(exchanger) = negotiator.exchanger(epoch) else {
        return Ok(());
    };
    let offer = SessionDescription::offer(sdp);
    if let Err(err) = exchanger.set_remote(&offer).await {
        return Err(negotiator.abort(epoch, err));
    }
    let installed = negotiator.with_session(epoch, |session| {
        session.remote_description = Some(offer);
        session.signaling = SignalingState::HaveRemoteOffer;
        session.advance(NegotiationPhase::AnswerPending);
    });
    if installed.is_none() {
        return Ok(());
    }
    negotiator.publish(NegotiationEvent::RemoteDescriptionSet(SdpType::Offer));
    negotiator.publish(NegotiationEvent::SignalingStateChanged(
        SignalingState::HaveRemoteOffer,
    ));
    flush_remote_candidates(negotiator).await;

    if !negotiator.is_current(epoch) {
        return Ok(());
    }
    let answer = match exchanger.create_answer().await {
        Ok(answer) => answer,
        Err(err) => return Err(negotiator.abort(epoch, err)),
    };
    if !negotiator.is_current(epoch) {
        return Ok(());
    }
    if let Err(err) = exchanger.set_local(&answer).await {
        return Err(negotiator.abort(epoch, err));
    }
    let installed = negotiator.with_session(epoch, |session| {
        session.local_description = Some(answer);
        session.signaling = SignalingState::Stable;
        session.description_sent = false;
    });
    if installed.is_none() {
        return Ok(());
    }
    negotiator.publish(NegotiationEvent::SignalingStateChanged(SignalingState::Stable));

    send_description(negotiator, epoch, &exchanger).await
}

/// Both peers offered. The lower peer id rolls its offer back and continues as responder,
/// returns the session to answer on, `None` if the remote offer is to be ignored.
async fn resolve_glare<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
    epoch: u64,
    remote_peer_id: PeerId,
) -> crate::Result<Option<u64>>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    match negotiator.peer_id().cmp(&remote_peer_id) {
        Ordering::Equal => Err(Error::GlareTie(remote_peer_id)),
        Ordering::Greater => {
            info!("glare: keeping local offer, {} yields", remote_peer_id);
            negotiator.publish(NegotiationEvent::GlareResolved { yielded: false });
            Ok(None)
        }
        Ordering::Less => {
            info!("glare: rolling back local offer in favour of {}", remote_peer_id);
            let Some(exchanger) = negotiator.exchanger(epoch) else {
                return Ok(None);
            };
            if let Err(err) = exchanger.rollback().await {
                return Err(negotiator.abort(epoch, err));
            }
            let rolled_back = negotiator.with_session(epoch, |session| {
                session.role = Role::Responder;
                session.local_description = None;
                session.signaling = SignalingState::Stable;
                session.advance(NegotiationPhase::Idle);
                session.description_sent = false;
            });
            if rolled_back.is_none() {
                return Ok(None);
            }
            negotiator.publish(NegotiationEvent::GlareResolved { yielded: true });
            negotiator.publish(NegotiationEvent::SignalingStateChanged(SignalingState::Stable));
            Ok(Some(epoch))
        }
    }
}

/// Session for an unsolicited offer. Media is optional on this side: without it the
/// session only receives.
async fn create_responder_session<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
) -> crate::Result<Option<u64>>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let generation = negotiator.inner.next_epoch.get();
    let tracks = match negotiator.inner.media.acquire_local_tracks().await {
        Ok(tracks) => tracks,
        Err(err) => {
            let err = Error::Media(err);
            warn!("{}, answering receive-only", err);
            negotiator.publish(NegotiationEvent::Error(err.to_string()));
            Vec::new()
        }
    };
    if negotiator.inner.next_epoch.get() != generation {
        debug!("negotiator closed while acquiring media");
        return Ok(None);
    }
    let epoch = negotiator.create_session(Role::Responder)?;
    attach_tracks(negotiator, epoch, &tracks).await?;
    Ok(negotiator.is_current(epoch).then_some(epoch))
}

async fn handle_answer<T, C, M>(negotiator: &Negotiator<T, C, M>, sdp: String) -> crate::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let _negotiation = negotiator.inner.negotiation.lock().await;

    let current =
        negotiator.current_session(|session| (session.signaling, session.description_sent));
    let epoch = match current {
        Some((epoch, (SignalingState::HaveLocalOffer, true))) => epoch,
        Some((_, (signaling, _))) => return Err(Error::UnexpectedAnswer(signaling)),
        None => return Err(Error::UnexpectedAnswer(SignalingState::Stable)),
    };

    let Some(exchanger) = negotiator.exchanger(epoch) else {
        return Ok(());
    };
    let answer = SessionDescription::answer(sdp);
    if let Err(err) = exchanger.set_remote(&answer).await {
        return Err(negotiator.abort(epoch, err));
    }
    let installed = negotiator.with_session(epoch, |session| {
        session.remote_description = Some(answer);
        session.signaling = SignalingState::Stable;
        session.advance(NegotiationPhase::AnswerReceived);
    });
    if installed.is_none() {
        return Ok(());
    }
    negotiator.publish(NegotiationEvent::RemoteDescriptionSet(SdpType::Answer));
    negotiator.publish(NegotiationEvent::SignalingStateChanged(SignalingState::Stable));
    flush_remote_candidates(negotiator).await;
    Ok(())
}

async fn handle_remote_candidate<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
    candidate: IceCandidate,
) -> crate::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let inserted = negotiator
        .inner
        .seen_candidates
        .borrow_mut()
        .insert(candidate.clone());
    if !inserted {
        return Err(Error::DuplicateCandidate(candidate.candidate));
    }

    let index = negotiator.inner.remote_candidates.enqueue(candidate);
    let ready = negotiator
        .current_session(accepts_candidates)
        .map_or(false, |(_, ready)| ready);
    if ready {
        flush_remote_candidates(negotiator).await;
    } else {
        debug!("queueing ICE candidate #{} until a remote description is set", index);
        negotiator.publish(NegotiationEvent::CandidateQueued { index });
    }
    Ok(())
}

/// A session whose connection ended keeps its remote description, but candidates arriving
/// now are meant for the transport that replaces it.
fn accepts_candidates<T: PeerTransport>(session: &Session<T>) -> bool {
    session.remote_description.is_some() && !session.connection.is_terminal()
}

/// Applies queued remote candidates to the current transport, if it has a remote description.
pub(super) async fn flush_remote_candidates<T, C, M>(negotiator: &Negotiator<T, C, M>)
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    let Some((epoch, Some(exchanger))) = negotiator.current_session(|session| {
        accepts_candidates(session).then(|| session.exchanger.clone())
    }) else {
        return;
    };

    let report = negotiator
        .inner
        .remote_candidates
        .flush(|queued| {
            let exchanger = exchanger.clone();
            async move {
                if !negotiator.is_current(epoch) {
                    return Err(anyhow!("session #{} is gone", epoch));
                }
                match exchanger.add_candidate(&queued.candidate).await {
                    Ok(()) => {
                        negotiator.publish(NegotiationEvent::CandidateApplied {
                            index: queued.index,
                        });
                        Ok(())
                    }
                    Err(err) => {
                        negotiator.publish(NegotiationEvent::CandidateRejected {
                            index: queued.index,
                            reason: format!("{err:#}"),
                        });
                        Err(err)
                    }
                }
            }
        })
        .await;
    if report.applied > 0 || report.failed > 0 {
        debug!(
            "remote ICE candidates applied: {}, rejected: {}",
            report.applied, report.failed
        );
    }
}

/// Waits for gathering and sends the local description of the session exactly once, then
/// lets the held back local candidates follow.
async fn send_description<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
    epoch: u64,
    exchanger: &DescriptionExchanger<T>,
) -> crate::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    match exchanger.await_gathering_complete().await {
        GatheringOutcome::Complete => {}
        GatheringOutcome::TimedOut => {
            warn!("ICE gathering timed out, sending the description gathered so far");
            negotiator.publish(NegotiationEvent::GatheringTimedOut);
        }
        GatheringOutcome::Cancelled => {
            debug!("session #{} closed while gathering", epoch);
            return Ok(());
        }
    }

    let stored = negotiator
        .with_session(epoch, |session| {
            (!session.description_sent).then(|| session.local_description.clone())
        })
        .flatten()
        .flatten();
    let Some(stored) = stored else {
        return Ok(());
    };
    // the transport's copy has the gathered candidates embedded
    let description = exchanger
        .local_description()
        .filter(|current| current.sdp_type == stored.sdp_type)
        .unwrap_or(stored);

    let session_id = negotiator.inner.session_id.clone();
    let (message, phase, sent_event) = match description.sdp_type {
        SdpType::Offer => (
            SignalMessage::Offer {
                session_id,
                peer_id: negotiator.inner.peer_id.clone(),
                sdp: description.sdp,
            },
            NegotiationPhase::OfferSent,
            NegotiationEvent::OfferSent,
        ),
        SdpType::Answer => (
            SignalMessage::Answer {
                session_id,
                sdp: description.sdp,
            },
            NegotiationPhase::AnswerSent,
            NegotiationEvent::AnswerSent,
        ),
    };

    if let Err(err) = negotiator.send(message).await {
        if negotiator.is_current(epoch) {
            negotiator.teardown();
            negotiator.publish(NegotiationEvent::Failed {
                reason: err.to_string(),
            });
        }
        return Err(err);
    }
    let sent = negotiator.with_session(epoch, |session| {
        session.description_sent = true;
        session.advance(phase);
    });
    if sent.is_none() {
        return Ok(());
    }
    negotiator.publish(sent_event);

    super::callbacks::flush_local_candidates(negotiator, epoch).await;
    Ok(())
}

async fn attach_tracks<T, C, M>(
    negotiator: &Negotiator<T, C, M>,
    epoch: u64,
    tracks: &[T::Track],
) -> crate::Result<()>
where
    T: PeerTransport + 'static,
    C: SignalingChannel + 'static,
    M: MediaBinding<T::Track> + 'static,
{
    for track in tracks {
        let Some(exchanger) = negotiator.exchanger(epoch) else {
            return Ok(());
        };
        if let Err(err) = exchanger.transport().add_track(track).await {
            return Err(negotiator.abort(epoch, err));
        }
        debug!("local track added: {:?}", track);
        negotiator.publish(NegotiationEvent::LocalTrackAdded);
    }
    Ok(())
}
