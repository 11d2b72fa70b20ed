//! Offer/answer creation and installation on top of a [`PeerTransport`], plus the
//! "wait until candidate gathering is complete" synchronisation point.

use std::rc::Rc;
use std::time::Duration;

use log::debug;
use peer_handshake_protocol::{IceCandidate, SessionDescription};
use tokio::sync::watch;

use crate::state::GatheringState;
use crate::transport::PeerTransport;
use crate::utils::sdp_preview;

/// How [`DescriptionExchanger::await_gathering_complete`] ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GatheringOutcome {
    Complete,
    /// Gave up waiting, the description gathered so far should be used
    TimedOut,
    /// Session was torn down while waiting
    Cancelled,
}

pub struct DescriptionExchanger<T> {
    transport: Rc<T>,
    gathering: watch::Receiver<GatheringState>,
    closed: watch::Receiver<bool>,
    timeout: Option<Duration>,
}

impl<T> Clone for DescriptionExchanger<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Rc::clone(&self.transport),
            gathering: self.gathering.clone(),
            closed: self.closed.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: PeerTransport> DescriptionExchanger<T> {
    pub fn new(
        transport: Rc<T>,
        gathering: watch::Receiver<GatheringState>,
        closed: watch::Receiver<bool>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            gathering,
            closed,
            timeout,
        }
    }

    pub fn transport(&self) -> &Rc<T> {
        &self.transport
    }

    pub async fn create_offer(&self) -> anyhow::Result<SessionDescription> {
        let offer = self.transport.create_offer().await?;
        debug!("offer created: {}...", sdp_preview(&offer.sdp));
        Ok(offer)
    }

    pub async fn create_answer(&self) -> anyhow::Result<SessionDescription> {
        let answer = self.transport.create_answer().await?;
        debug!("answer created: {}...", sdp_preview(&answer.sdp));
        Ok(answer)
    }

    pub async fn set_local(&self, description: &SessionDescription) -> anyhow::Result<()> {
        self.transport.set_local_description(description).await?;
        debug!("local description set ({})", description.sdp_type);
        Ok(())
    }

    pub async fn set_remote(&self, description: &SessionDescription) -> anyhow::Result<()> {
        self.transport.set_remote_description(description).await?;
        debug!("remote description set ({})", description.sdp_type);
        Ok(())
    }

    pub async fn rollback(&self) -> anyhow::Result<()> {
        self.transport.rollback().await?;
        debug!("local offer rolled back");
        Ok(())
    }

    pub async fn add_candidate(&self, candidate: &IceCandidate) -> anyhow::Result<()> {
        self.transport.add_ice_candidate(candidate).await?;
        debug!("remote ICE candidate added: {}", candidate.candidate);
        Ok(())
    }

    /// Local description as the transport sees it now, with gathered candidates embedded.
    pub fn local_description(&self) -> Option<SessionDescription> {
        self.transport.local_description()
    }

    pub fn gathering_state(&self) -> GatheringState {
        *self.gathering.borrow()
    }

    /// Resolves once gathering reports `complete`, right away if it already has.
    ///
    /// The wait observes a private clone of the gathering watch, so nothing stays
    /// subscribed after it returns.
    pub async fn await_gathering_complete(&self) -> GatheringOutcome {
        let mut gathering = self.gathering.clone();
        if *gathering.borrow_and_update() == GatheringState::Complete {
            debug!("ICE gathering already complete");
            return GatheringOutcome::Complete;
        }
        debug!("waiting for ICE gathering to complete");

        let mut closed = self.closed.clone();
        let complete = async {
            gathering
                .wait_for(|state| *state == GatheringState::Complete)
                .await
                .is_ok()
        };
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, complete).await.ok(),
                None => Some(complete.await),
            }
        };

        tokio::select! {
            biased;
            _ = closed.wait_for(|is_closed| *is_closed) => GatheringOutcome::Cancelled,
            outcome = bounded => match outcome {
                Some(true) => {
                    debug!("ICE gathering completed");
                    GatheringOutcome::Complete
                }
                // the transport dropped its event sink, nothing will ever complete
                Some(false) => GatheringOutcome::Cancelled,
                None => GatheringOutcome::TimedOut,
            },
        }
    }
}
