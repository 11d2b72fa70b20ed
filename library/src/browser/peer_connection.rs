use anyhow::anyhow;
use async_trait::async_trait;
use js_sys::{Array, Object, Reflect};
use log::debug;
use peer_handshake_protocol::{IceCandidate, SdpType, SessionDescription};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    MediaStream, MediaStreamTrack, RtcConfiguration, RtcIceCandidate, RtcIceCandidateInit,
    RtcIceGatheringState, RtcPeerConnection, RtcPeerConnectionIceEvent, RtcPeerConnectionState,
    RtcSdpType, RtcSessionDescriptionInit, RtcTrackEvent,
};

use crate::state::{ConnectionState, GatheringState};
use crate::transport::{PeerTransport, TransportEvents};
use crate::utils::ConnectionType;

/// [`PeerTransport`] over the browser's `RTCPeerConnection`.
#[derive(Debug)]
pub struct BrowserTransport {
    peer_connection: RtcPeerConnection,
}

impl BrowserTransport {
    /// Creates the peer connection and routes its callbacks into `events`.
    ///
    /// # Errors
    /// If the browser refuses to create a peer connection with the given ICE servers.
    pub fn new(
        connection_type: &ConnectionType,
        events: TransportEvents<MediaStreamTrack>,
    ) -> anyhow::Result<Self> {
        let peer_connection = create_peer_connection(connection_type)
            .map_err(|err| anyhow!("failed to create RTCPeerConnection: {:?}", err))?;
        set_peer_connection_on_ice_candidate(&peer_connection, events.clone());
        set_peer_connection_on_ice_gathering_state_change(&peer_connection, events.clone());
        set_peer_connection_on_connection_state_change(&peer_connection, events.clone());
        set_peer_connection_on_track(&peer_connection, events);
        Ok(Self { peer_connection })
    }

    #[must_use]
    pub fn peer_connection(&self) -> &RtcPeerConnection {
        &self.peer_connection
    }
}

#[async_trait(?Send)]
impl PeerTransport for BrowserTransport {
    type Track = MediaStreamTrack;

    async fn create_offer(&self) -> anyhow::Result<SessionDescription> {
        let offer = JsFuture::from(self.peer_connection.create_offer())
            .await
            .map_err(|err| anyhow!("failed to create an SDP offer: {:?}", err))?;
        Ok(SessionDescription::offer(sdp_of(&offer)?))
    }

    async fn create_answer(&self) -> anyhow::Result<SessionDescription> {
        let answer = JsFuture::from(self.peer_connection.create_answer())
            .await
            .map_err(|err| anyhow!("failed to create an SDP answer: {:?}", err))?;
        Ok(SessionDescription::answer(sdp_of(&answer)?))
    }

    async fn set_local_description(
        &self,
        description: &SessionDescription,
    ) -> anyhow::Result<()> {
        let init = description_init(description);
        JsFuture::from(self.peer_connection.set_local_description(&init))
            .await
            .map_err(|err| anyhow!("failed to set local description: {:?}", err))?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: &SessionDescription,
    ) -> anyhow::Result<()> {
        let init = description_init(description);
        JsFuture::from(self.peer_connection.set_remote_description(&init))
            .await
            .map_err(|err| anyhow!("failed to set remote description: {:?}", err))?;
        Ok(())
    }

    async fn rollback(&self) -> anyhow::Result<()> {
        let rollback = RtcSessionDescriptionInit::new(RtcSdpType::Rollback);
        JsFuture::from(self.peer_connection.set_local_description(&rollback))
            .await
            .map_err(|err| anyhow!("failed to roll back local description: {:?}", err))?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> anyhow::Result<()> {
        let mut init = RtcIceCandidateInit::new(&candidate.candidate);
        init.sdp_mid(candidate.sdp_mid.as_deref());
        init.sdp_m_line_index(candidate.sdp_m_line_index);
        let rtc_candidate = RtcIceCandidate::new(&init)
            .map_err(|err| anyhow!("invalid ICE candidate: {:?}", err))?;
        JsFuture::from(
            self.peer_connection
                .add_ice_candidate_with_opt_rtc_ice_candidate(Some(&rtc_candidate)),
        )
        .await
        .map_err(|err| anyhow!("failed to add ICE candidate: {:?}", err))?;
        Ok(())
    }

    async fn add_track(&self, track: &MediaStreamTrack) -> anyhow::Result<()> {
        let stream = MediaStream::new_with_tracks(&Array::of1(track))
            .map_err(|err| anyhow!("failed to wrap track into a stream: {:?}", err))?;
        self.peer_connection.add_track_0(track, &stream);
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        let description = self.peer_connection.local_description()?;
        let sdp_type = match description.type_() {
            RtcSdpType::Offer => SdpType::Offer,
            RtcSdpType::Answer => SdpType::Answer,
            _ => return None,
        };
        Some(SessionDescription {
            sdp_type,
            sdp: description.sdp(),
        })
    }

    fn close(&self) {
        self.peer_connection.close();
    }
}

pub(crate) fn create_peer_connection(
    connection_type: &ConnectionType,
) -> Result<RtcPeerConnection, JsValue> {
    let urls = connection_type.ice_server_urls();
    if urls.is_empty() {
        return RtcPeerConnection::new();
    }

    let ice_servers = Array::new();
    for url in urls {
        let server_entry = Object::new();
        Reflect::set(&server_entry, &"urls".into(), &url.into())?;
        ice_servers.push(&server_entry);
    }
    let mut rtc_configuration = RtcConfiguration::new();
    rtc_configuration.ice_servers(&ice_servers);

    RtcPeerConnection::new_with_configuration(&rtc_configuration)
}

fn description_init(description: &SessionDescription) -> RtcSessionDescriptionInit {
    let sdp_type = match description.sdp_type {
        SdpType::Offer => RtcSdpType::Offer,
        SdpType::Answer => RtcSdpType::Answer,
    };
    let mut init = RtcSessionDescriptionInit::new(sdp_type);
    init.sdp(&description.sdp);
    init
}

fn sdp_of(description: &JsValue) -> anyhow::Result<String> {
    Reflect::get(description, &JsValue::from_str("sdp"))
        .ok()
        .and_then(|sdp| sdp.as_string())
        .ok_or_else(|| anyhow!("session description without SDP"))
}

fn set_peer_connection_on_ice_candidate(
    peer_connection: &RtcPeerConnection,
    events: TransportEvents<MediaStreamTrack>,
) {
    let on_ice_candidate: Box<dyn FnMut(RtcPeerConnectionIceEvent)> =
        Box::new(move |ev: RtcPeerConnectionIceEvent| {
            // a `null` candidate marks the end of gathering, reported separately
            if let Some(candidate) = ev.candidate() {
                let candidate = IceCandidate {
                    candidate: candidate.candidate(),
                    sdp_mid: candidate.sdp_mid(),
                    sdp_m_line_index: candidate.sdp_m_line_index(),
                };
                debug!("local ICE candidate: {}", candidate.candidate);
                events.local_candidate(candidate);
            }
        });
    let on_ice_candidate = Closure::wrap(on_ice_candidate);
    peer_connection.set_onicecandidate(Some(on_ice_candidate.as_ref().unchecked_ref()));
    on_ice_candidate.forget();
}

fn set_peer_connection_on_ice_gathering_state_change(
    peer_connection: &RtcPeerConnection,
    events: TransportEvents<MediaStreamTrack>,
) {
    let peer_connection_clone = peer_connection.clone();
    let on_ice_gathering_state_change: Box<dyn FnMut()> = Box::new(move || {
        let state = match peer_connection_clone.ice_gathering_state() {
            RtcIceGatheringState::Gathering => GatheringState::Gathering,
            RtcIceGatheringState::Complete => GatheringState::Complete,
            _ => GatheringState::New,
        };
        events.gathering_state_changed(state);
    });
    let on_ice_gathering_state_change = Closure::wrap(on_ice_gathering_state_change);
    peer_connection.set_onicegatheringstatechange(Some(
        on_ice_gathering_state_change.as_ref().unchecked_ref(),
    ));
    on_ice_gathering_state_change.forget();
}

fn set_peer_connection_on_connection_state_change(
    peer_connection: &RtcPeerConnection,
    events: TransportEvents<MediaStreamTrack>,
) {
    let peer_connection_clone = peer_connection.clone();
    let on_connection_state_change: Box<dyn FnMut()> = Box::new(move || {
        let state = match peer_connection_clone.connection_state() {
            RtcPeerConnectionState::Connecting => ConnectionState::Checking,
            RtcPeerConnectionState::Connected => ConnectionState::Connected,
            RtcPeerConnectionState::Disconnected => ConnectionState::Disconnected,
            RtcPeerConnectionState::Failed => ConnectionState::Failed,
            RtcPeerConnectionState::Closed => ConnectionState::Closed,
            _ => ConnectionState::New,
        };
        events.connection_state_changed(state);
    });
    let on_connection_state_change = Closure::wrap(on_connection_state_change);
    peer_connection
        .set_onconnectionstatechange(Some(on_connection_state_change.as_ref().unchecked_ref()));
    on_connection_state_change.forget();
}

fn set_peer_connection_on_track(
    peer_connection: &RtcPeerConnection,
    events: TransportEvents<MediaStreamTrack>,
) {
    let on_track: Box<dyn FnMut(RtcTrackEvent)> = Box::new(move |ev: RtcTrackEvent| {
        events.remote_track(ev.track());
    });
    let on_track = Closure::wrap(on_track);
    peer_connection.set_ontrack(Some(on_track.as_ref().unchecked_ref()));
    on_track.forget();
}
