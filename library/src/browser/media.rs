use std::cell::RefCell;
use std::fmt::{Debug, Formatter};

use anyhow::anyhow;
use async_trait::async_trait;
use log::info;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{MediaStream, MediaStreamConstraints, MediaStreamTrack};

use crate::transport::MediaBinding;

/// Local capture through `navigator.mediaDevices.getUserMedia`.
///
/// Remote tracks are kept and, if set, handed to the callback from
/// [`UserMedia::on_remote_track_callback`].
pub struct UserMedia {
    audio: bool,
    video: bool,
    remote_tracks: RefCell<Vec<MediaStreamTrack>>,
    on_remote_track: Option<Box<dyn Fn(&MediaStreamTrack)>>,
}

impl Debug for UserMedia {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserMedia")
            .field("audio", &self.audio)
            .field("video", &self.video)
            .field("remote_tracks", &self.remote_tracks.borrow().len())
            .finish_non_exhaustive()
    }
}

impl UserMedia {
    #[must_use]
    pub fn new(audio: bool, video: bool) -> Self {
        Self {
            audio,
            video,
            remote_tracks: RefCell::new(Vec::new()),
            on_remote_track: None,
        }
    }

    #[must_use]
    pub fn audio_and_video() -> Self {
        Self::new(true, true)
    }

    /// Called for every remote track, e.g. to attach it to a `<video>` element.
    #[must_use]
    pub fn on_remote_track_callback(
        mut self,
        callback: impl Fn(&MediaStreamTrack) + 'static,
    ) -> Self {
        self.on_remote_track = Some(Box::new(callback));
        self
    }

    /// Every track received from the other peer so far.
    #[must_use]
    pub fn remote_tracks(&self) -> Vec<MediaStreamTrack> {
        self.remote_tracks.borrow().clone()
    }
}

#[async_trait(?Send)]
impl MediaBinding<MediaStreamTrack> for UserMedia {
    async fn acquire_local_tracks(&self) -> anyhow::Result<Vec<MediaStreamTrack>> {
        let media_devices = web_sys::window()
            .ok_or_else(|| anyhow!("no window object available"))?
            .navigator()
            .media_devices()
            .map_err(|err| anyhow!("media devices are not available: {:?}", err))?;

        let mut constraints = MediaStreamConstraints::new();
        constraints.audio(&JsValue::from_bool(self.audio));
        constraints.video(&JsValue::from_bool(self.video));
        let promise = media_devices
            .get_user_media_with_constraints(&constraints)
            .map_err(|err| anyhow!("getUserMedia failed: {:?}", err))?;
        let stream: MediaStream = JsFuture::from(promise)
            .await
            .map_err(|err| anyhow!("access to local media was denied: {:?}", err))?
            .dyn_into()
            .map_err(|err| anyhow!("getUserMedia returned no stream: {:?}", err))?;

        let tracks = stream
            .get_tracks()
            .iter()
            .filter_map(|track| track.dyn_into::<MediaStreamTrack>().ok())
            .collect::<Vec<_>>();
        info!("acquired {} local tracks", tracks.len());
        Ok(tracks)
    }

    fn on_remote_track(&self, track: MediaStreamTrack) {
        if let Some(callback) = &self.on_remote_track {
            callback(&track);
        }
        self.remote_tracks.borrow_mut().push(track);
    }
}
