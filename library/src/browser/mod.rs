/*!
Browser implementations of the negotiator's collaborators, built on `web-sys`.

* [`BrowserTransport`] wraps an `RTCPeerConnection`,
* [`WebSocketChannel`] talks to a `peer-handshake-signaling-server` instance,
* [`UserMedia`] captures tracks with `getUserMedia`.

# Example

```no_run
use peer_handshake::browser::{new_negotiator, UserMedia, WebSocketChannel};
use peer_handshake::{ConnectionType, NegotiatorConfig, SessionId};

async fn call() -> anyhow::Result<()> {
    let channel = WebSocketChannel::connect("ws://0.0.0.0:9001/one-to-one").await?;
    let negotiator = new_negotiator(
        SessionId::new("some-session-id".to_owned()),
        NegotiatorConfig {
            initiate_when_host: true,
            ..NegotiatorConfig::default()
        },
        channel,
        UserMedia::audio_and_video(),
        ConnectionType::default_stun(),
    );
    negotiator.join().await?;
    negotiator.run().await?;
    Ok(())
}
```
*/

use log::debug;

use crate::channel::SignalingChannel;
use crate::one_to_one::Negotiator;
use crate::{ConnectionType, NegotiatorConfig, SessionId};

mod media;
mod peer_connection;
mod websocket;

pub use media::UserMedia;
pub use peer_connection::BrowserTransport;
pub use websocket::WebSocketChannel;

/// Negotiator wired to browser APIs.
pub type BrowserNegotiator = Negotiator<BrowserTransport, WebSocketChannel, UserMedia>;

/// Creates a negotiator whose sessions each get a fresh `RTCPeerConnection` of the given type.
///
/// There is no `tokio` timer in the browser, so `gathering_timeout` is ignored and the
/// description is sent once the browser reports gathering complete.
#[must_use]
pub fn new_negotiator<C: SignalingChannel + 'static>(
    session_id: SessionId,
    mut config: NegotiatorConfig,
    channel: C,
    media: UserMedia,
    connection_type: ConnectionType,
) -> Negotiator<BrowserTransport, C, UserMedia> {
    set_panic_hook();
    if config.gathering_timeout.take().is_some() {
        debug!("gathering timeout is not supported in the browser, waiting for completion");
    }
    Negotiator::new(session_id, config, channel, media, move |events| {
        BrowserTransport::new(&connection_type, events)
    })
}

pub fn set_panic_hook() {
    // better error messages in the browser console if the code ever panics
    console_error_panic_hook::set_once();
}
