use std::{io, net::Ipv6Addr};
use thiserror::Error;

/// A resource a backend can't run without. Fatal at startup.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("could not open {what}: {source}")]
    Open {
        what: &'static str,
        source: io::Error,
    },

    #[error("could not read the route table: {0}")]
    RouteTable(#[source] io::Error),

    #[error("no route to {0}")]
    NoRoute(Ipv6Addr),

    #[error("could not enumerate interfaces: {0}")]
    Interfaces(#[source] io::Error),

    #[error("unknown interface {0}")]
    UnknownInterface(String),

    #[error("interface {0} has no hardware address")]
    NoHardwareAddress(String),

    #[error("no non-link-local IPv6 address on interface {0}")]
    NoSourceAddress(String),

    #[error("could not query the neighbour table: {0}")]
    Neighbours(#[source] io::Error),

    #[error("no link-layer address known for {ip} on {interface}, pass --dst-mac")]
    NoGateway { ip: Ipv6Addr, interface: String },

    #[error("a {budget_mb} MiB ring can't hold a single {block_size} byte block")]
    RingTooSmall { budget_mb: usize, block_size: usize },

    #[error("ring frames of {frame_size} bytes can't hold a {needed} byte probe")]
    RingFrameTooSmall { frame_size: usize, needed: usize },
}

impl ResourceError {
    pub fn open(what: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Open { what, source }
    }
}
