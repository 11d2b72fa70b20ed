use std::time::Duration;

pub const DEFAULT_GATHERING_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// How much of an `SDP` body ends up in the logs.
pub const SDP_PREVIEW_LEN: usize = 50;

pub const STUN_SERVER: &str = "stun:stun.l.google.com:19302";
