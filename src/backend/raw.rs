//! Raw ICMPv6 sockets: the kernel routes and frames, we only pick destinations.

use super::{Transmit, frame, sys};
use crate::error::ResourceError;
use pingtide_common::DestinationAddress;
use std::{io, mem, os::fd::OwnedFd};

/// Identifier carried by echo requests sent through the IP stack.
const ECHO_IDENTIFIER: u16 = 0xffff;

pub struct RawSocket {
    socket: OwnedFd,
    payload: [u8; frame::ECHO_REQUEST_LEN],
    reconnects: u64,
}

impl RawSocket {
    pub fn open() -> Result<Self, ResourceError> {
        Ok(Self {
            socket: connect().map_err(ResourceError::open("raw ICMPv6 socket"))?,
            payload: frame::echo_request(ECHO_IDENTIFIER, frame::ECHO_SEQUENCE),
            reconnects: 0,
        })
    }
}

// The kernel fills in the ICMPv6 checksum on raw ICMPv6 sockets.
fn connect() -> io::Result<OwnedFd> {
    sys::socket(libc::AF_INET6, libc::SOCK_RAW, libc::IPPROTO_ICMPV6)
}

fn socket_addr(dst: &DestinationAddress) -> libc::sockaddr_in6 {
    let mut addr: libc::sockaddr_in6 = unsafe { mem::zeroed() };
    addr.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    addr.sin6_addr = libc::in6_addr {
        s6_addr: *dst.octets(),
    };
    addr
}

impl Transmit for RawSocket {
    fn send(&mut self, dst: &DestinationAddress) -> io::Result<()> {
        sys::send_to(&self.socket, &self.payload, &socket_addr(dst))?;
        Ok(())
    }

    /// Swaps in a fresh socket. The failed probe is not retried.
    fn recover(&mut self, error: io::Error) -> Result<(), ResourceError> {
        warn!(?error, "could not send ping packet, reopening socket");
        self.socket = connect().map_err(ResourceError::open("raw ICMPv6 socket"))?;
        self.reconnects += 1;
        debug!(reconnects = self.reconnects, "socket replaced");
        Ok(())
    }
}
