//! Fallback values applied when the configuration document omits a field.

use std::net::{IpAddr, Ipv4Addr};

/// Heartbeat cadence in seconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Listener address for the agent's HTTP surface.
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

pub(crate) const fn heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}

pub(crate) const fn bind_addr() -> IpAddr {
    DEFAULT_BIND_ADDR
}
