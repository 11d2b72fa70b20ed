/*!
Helper crate that declares the types shared between [peer-handshake](../peer_handshake/index.html)
and [peer-handshake-signaling-server](../peer_handshake_signaling_server/index.html).

Everything here travels over the signaling channel as JSON, see [`one_to_one::SignalMessage`].
*/

#![warn(missing_docs)]

use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod common;
pub mod one_to_one;

pub use common::{IceCandidate, SdpType, SessionDescription};

/// Unique identifier of signaling session that each user provides
/// when communicating with the signaling server.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap String into a `SessionId` `struct`
    #[must_use]
    pub const fn new(inner: String) -> Self {
        Self(inner)
    }

    /// Return reference to the underling string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Acquire the underlying type
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for SessionId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Random identifier every peer generates for itself when it starts negotiating.
///
/// It is attached to each offer so that when both peers offer at the same time
/// they can agree, without talking to each other, which one of them yields:
/// the peer with the lexicographically lower identifier rolls its offer back.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap String into a `PeerId` `struct`
    #[must_use]
    pub const fn new(inner: String) -> Self {
        Self(inner)
    }

    /// Return reference to the underling string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of each peer connected to signaling server.
/// Only the signaling server hands those out.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct UserId(u64);

impl UserId {
    /// Wrap `u64` into a `UserId` `struct`
    #[must_use]
    pub const fn new(inner: u64) -> Self {
        Self(inner)
    }

    /// Acquire the underlying type
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for UserId {
    fn from(val: u64) -> Self {
        Self(val)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flag specifying which peer joined the session first and is expected to create an offer.
pub type IsHost = bool;
