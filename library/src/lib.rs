/*!
This crate negotiates a direct `WebRTC` connection between two peers.

# Overview

Two peers that cannot address each other directly exchange session descriptions and
connectivity candidates through some intermediary, usually a signaling server, until a direct
transport path is found. Getting that exchange right is harder than it looks: messages arrive
out of order, both sides may decide to call at the same moment and candidates tend to show up
before the description they belong to.

[`one_to_one::Negotiator`] takes care of all of it. It only needs three collaborators:
* a [`SignalingChannel`](channel::SignalingChannel) delivering messages to the other peer,
* a [`PeerTransport`] factory creating the actual connection, e.g. an `RTCPeerConnection`,
* a [`MediaBinding`] supplying local tracks and rendering remote ones.

With the `browser` feature, on `wasm32`, implementations of all three backed by `web-sys` are
available in the `browser` module, talking to the relay from the accompanying
`peer-handshake-signaling-server` crate.

Progress is observable through [`one_to_one::Negotiator::status`] and the
[`NegotiationEvent`]s handed out by [`one_to_one::Negotiator::subscribe`], and everything is
logged through the `log` facade.
*/

#![allow(
    clippy::module_name_repetitions,
    clippy::future_not_send, // negotiator futures stay on one task
)]
// clippy WARN level lints
#![warn(
    // missing_docs,
    clippy::cargo,
    clippy::pedantic,
    // clippy::nursery,
    clippy::dbg_macro,
    clippy::unwrap_used,
    clippy::integer_division,
    clippy::large_include_file,
    clippy::map_err_ignore,
    // clippy::missing_docs_in_private_items,
    clippy::panic,
    clippy::todo,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unreachable
)]
// clippy WARN level lints, that can be upgraded to DENY if preferred
#![warn(
    clippy::float_arithmetic,
    clippy::arithmetic_side_effects,
    clippy::modulo_arithmetic,
    clippy::as_conversions,
    clippy::assertions_on_result_states,
    clippy::clone_on_ref_ptr,
    clippy::create_dir,
    clippy::default_union_representation,
    clippy::deref_by_slicing,
    clippy::empty_drop,
    clippy::empty_structs_with_brackets,
    clippy::exit,
    clippy::filetype_is_file,
    clippy::float_cmp_const,
    clippy::if_then_some_else_none,
    clippy::indexing_slicing,
    clippy::let_underscore_must_use,
    clippy::lossy_float_literal,
    clippy::pattern_type_mismatch,
    clippy::string_slice,
    clippy::try_err
)]
// clippy DENY level lints, they always have a quick fix that should be preferred
#![deny(
    clippy::wildcard_imports,
    clippy::multiple_inherent_impl,
    clippy::rc_buffer,
    clippy::rc_mutex,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::self_named_module_files,
    clippy::separated_literal_suffix,
    clippy::shadow_unrelated,
    clippy::str_to_string,
    clippy::string_add,
    clippy::string_to_string,
    clippy::unnecessary_self_imports,
    clippy::unneeded_field_pattern,
    clippy::verbose_file_reads
)]

#[cfg(all(target_arch = "wasm32", feature = "browser"))]
pub mod browser;
pub mod candidate_queue;
pub mod channel;
mod config;
pub(crate) mod constants;
mod error;
mod events;
pub mod exchanger;
pub mod one_to_one;
mod state;
mod transport;
mod utils;

pub use config::NegotiatorConfig;
pub use error::{Error, Result};
pub use events::NegotiationEvent;
pub use peer_handshake_protocol::{
    IceCandidate, PeerId, SdpType, SessionDescription, SessionId, UserId,
};
pub use state::{
    ConnectionState, GatheringState, NegotiationPhase, NegotiationStatus, Role, SignalingState,
};
pub use transport::{MediaBinding, PeerTransport, TaggedEvent, TransportEvent, TransportEvents};
pub use utils::{get_random_peer_id, get_random_session_id, ConnectionType};
