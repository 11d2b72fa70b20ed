/*!
Reference signaling server for [peer-handshake](../peer_handshake/index.html).

Peers connect over a WebSocket, join a session by its [`SessionId`](peer_handshake_protocol::SessionId)
and from then on every offer, answer and ICE candidate one of them sends is handed,
unchanged, to the other one. See [`router::create`] for the routes.
*/

pub mod one_to_one;
pub mod router;
