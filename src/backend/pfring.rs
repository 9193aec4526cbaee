//! PF_RING sockets in send-only mode.
//!
//! Talks to the `pf_ring` kernel module directly; the module has to be
//! loaded, no userspace library is needed.

use super::{SendPolicy, Transmit, frame::FrameWriter, sys};
use crate::{error::ResourceError, link::LinkEndpoints};
use pingtide_common::DestinationAddress;
use std::{io, mem, os::fd::OwnedFd};

// linux/pf_ring.h
const PF_RING: libc::c_int = 27;
const SO_ACTIVATE_RING: libc::c_int = 106;
const SO_RING_BUCKET_LEN: libc::c_int = 107;
const SO_SET_SOCKET_MODE: libc::c_int = 126;
const SEND_ONLY_MODE: libc::c_int = 1;

const BUCKET_LEN: u32 = 65536;

pub struct PfRing {
    socket: OwnedFd,
    writer: FrameWriter,
}

impl PfRing {
    pub fn open(link: &LinkEndpoints, policy: SendPolicy) -> Result<Self, ResourceError> {
        let protocol = (libc::ETH_P_ALL as u16).to_be() as libc::c_int;
        let socket = sys::socket(PF_RING, libc::SOCK_RAW, protocol)
            .map_err(ResourceError::open("PF_RING socket"))?;

        sys::setsockopt(&socket, 0, SO_RING_BUCKET_LEN, &BUCKET_LEN)
            .map_err(ResourceError::open("PF_RING bucket"))?;
        sys::bind(&socket, &device_addr(&link.interface)?)
            .map_err(ResourceError::open("PF_RING device"))?;
        sys::setsockopt(&socket, 0, SO_SET_SOCKET_MODE, &SEND_ONLY_MODE)
            .map_err(ResourceError::open("PF_RING send-only mode"))?;
        sys::setsockopt(&socket, 0, SO_ACTIVATE_RING, &0_i32)
            .map_err(ResourceError::open("PF_RING activation"))?;

        info!(interface = %link.interface, "enabled PF_RING socket");

        Ok(Self {
            socket,
            writer: FrameWriter::new(link.clone(), policy),
        })
    }
}

/// PF_RING binds by device name stored in `sa_data`.
fn device_addr(interface: &str) -> Result<libc::sockaddr, ResourceError> {
    let mut addr: libc::sockaddr = unsafe { mem::zeroed() };
    addr.sa_family = PF_RING as libc::sa_family_t;

    // keep a trailing NUL
    if interface.len() >= addr.sa_data.len() {
        return Err(ResourceError::UnknownInterface(interface.to_string()));
    }
    for (dst, src) in addr.sa_data.iter_mut().zip(interface.bytes()) {
        *dst = src as libc::c_char;
    }

    Ok(addr)
}

impl Transmit for PfRing {
    fn send(&mut self, dst: &DestinationAddress) -> io::Result<()> {
        sys::send(&self.socket, self.writer.frame_for(dst), 0)?;
        Ok(())
    }
}
