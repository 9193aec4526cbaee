//! AF_PACKET transmit ring (`TPACKET_V2`).
//!
//! Every ring slot is seeded with the frame template once. Sending an
//! address patches the slot's destination bytes, marks it for transmission
//! and hands batches to the kernel with a zero-length `send`.

use super::{
    SendPolicy, Transmit,
    frame::{FRAME_LEN, FrameWriter},
    ring::{self, RingGeometry},
    sys,
};
use crate::{error::ResourceError, link::LinkEndpoints};
use memmap2::{MmapOptions, MmapRaw};
use pingtide_common::DestinationAddress;
use std::{
    io, mem,
    os::fd::{AsRawFd, OwnedFd},
    ptr, slice,
    sync::atomic::{Ordering, fence},
    thread,
};

// linux/if_packet.h
const PACKET_VERSION: libc::c_int = 10;
const PACKET_TX_RING: libc::c_int = 13;
const PACKET_QDISC_BYPASS: libc::c_int = 20;
const TPACKET_V2: libc::c_int = 1;

const TP_STATUS_AVAILABLE: u32 = 0;
const TP_STATUS_SEND_REQUEST: u32 = 1;
const TP_STATUS_WRONG_FORMAT: u32 = 4;

/// `struct tpacket2_hdr` is 32 bytes and TX data follows it directly.
const TX_DATA_OFFSET: usize = 32;
const TP_LEN_OFFSET: usize = 4;

/// Capture length the ring is sized for; fits the header plus one probe.
pub const SNAPLEN: usize = 100;

/// Frames queued before the kernel is asked to transmit them.
const FLUSH_BATCH: usize = 256;

#[repr(C)]
struct TpacketReq {
    tp_block_size: libc::c_uint,
    tp_block_nr: libc::c_uint,
    tp_frame_size: libc::c_uint,
    tp_frame_nr: libc::c_uint,
}

pub struct AfPacket {
    socket: OwnedFd,
    ring: MmapRaw,
    geometry: RingGeometry,
    writer: FrameWriter,
    cursor: usize,
    pending: usize,
}

impl AfPacket {
    pub fn open(link: &LinkEndpoints, policy: SendPolicy, budget_mb: usize) -> Result<Self, ResourceError> {
        let geometry = ring::size(budget_mb, SNAPLEN, sys::page_size())?;
        if geometry.frame_size < TX_DATA_OFFSET + FRAME_LEN {
            return Err(ResourceError::RingFrameTooSmall {
                frame_size: geometry.frame_size,
                needed: TX_DATA_OFFSET + FRAME_LEN,
            });
        }

        // protocol 0: transmit only, received frames are never queued here
        let socket = sys::socket(libc::AF_PACKET, libc::SOCK_RAW, 0)
            .map_err(ResourceError::open("AF_PACKET socket"))?;

        sys::setsockopt(&socket, libc::SOL_PACKET, PACKET_VERSION, &TPACKET_V2)
            .map_err(ResourceError::open("TPACKET_V2 ring"))?;

        if let Err(error) = sys::setsockopt(&socket, libc::SOL_PACKET, PACKET_QDISC_BYPASS, &1_i32) {
            debug!(?error, "qdisc bypass unavailable");
        }

        let request = TpacketReq {
            tp_block_size: geometry.block_size as libc::c_uint,
            tp_block_nr: geometry.num_blocks as libc::c_uint,
            tp_frame_size: geometry.frame_size as libc::c_uint,
            tp_frame_nr: geometry.frame_count() as libc::c_uint,
        };
        sys::setsockopt(&socket, libc::SOL_PACKET, PACKET_TX_RING, &request)
            .map_err(ResourceError::open("AF_PACKET tx ring"))?;

        let ring = MmapOptions::new()
            .len(geometry.len())
            .map_raw(socket.as_raw_fd())
            .map_err(ResourceError::open("AF_PACKET tx ring mapping"))?;

        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::c_ushort;
        addr.sll_ifindex = link.ifindex as libc::c_int;
        sys::bind(&socket, &addr).map_err(ResourceError::open("AF_PACKET interface binding"))?;

        let mut this = Self {
            socket,
            ring,
            geometry,
            writer: FrameWriter::new(link.clone(), policy),
            cursor: 0,
            pending: 0,
        };

        let template = *this.writer.template();
        for idx in 0..geometry.frame_count() {
            this.data_mut(idx)[..FRAME_LEN].copy_from_slice(&template);
        }

        info!(
            interface = %link.interface,
            frame_size = geometry.frame_size,
            block_size = geometry.block_size,
            num_blocks = geometry.num_blocks,
            "mapped AF_PACKET tx ring"
        );

        Ok(this)
    }

    fn header(&self, idx: usize) -> *mut u8 {
        debug_assert!(idx < self.geometry.frame_count());
        unsafe { self.ring.as_mut_ptr().add(idx * self.geometry.frame_size) }
    }

    fn status(&self, idx: usize) -> u32 {
        unsafe { ptr::read_volatile(self.header(idx).cast::<u32>()) }
    }

    fn data_mut(&mut self, idx: usize) -> &mut [u8] {
        let len = self.geometry.frame_size - TX_DATA_OFFSET;
        unsafe { slice::from_raw_parts_mut(self.header(idx).add(TX_DATA_OFFSET), len) }
    }

    /// Asks the kernel to transmit every slot marked for sending.
    fn kick(&mut self, flags: libc::c_int) -> io::Result<()> {
        self.pending = 0;
        match sys::send(&self.socket, &[], flags) {
            Ok(_) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Waits until the slot under the cursor may be written.
    fn claim(&mut self) -> io::Result<()> {
        let mut kicked = false;
        loop {
            match self.status(self.cursor) {
                TP_STATUS_AVAILABLE => return Ok(()),
                TP_STATUS_WRONG_FORMAT => {
                    debug!(slot = self.cursor, "kernel rejected a ring frame");
                    return Ok(());
                }
                _ if !kicked => {
                    self.kick(0)?;
                    kicked = true;
                }
                _ => thread::yield_now(),
            }
        }
    }
}

impl Transmit for AfPacket {
    fn send(&mut self, dst: &DestinationAddress) -> io::Result<()> {
        self.claim()?;

        let idx = self.cursor;
        let header = self.header(idx);
        // SAFETY: `header` points into the mapping and is reused only once
        // the kernel hands the slot back
        let data = unsafe {
            slice::from_raw_parts_mut(header.add(TX_DATA_OFFSET), self.geometry.frame_size - TX_DATA_OFFSET)
        };
        self.writer.write_into(data, dst);

        unsafe {
            ptr::write_volatile(header.add(TP_LEN_OFFSET).cast::<u32>(), FRAME_LEN as u32);
            fence(Ordering::Release);
            ptr::write_volatile(header.cast::<u32>(), TP_STATUS_SEND_REQUEST);
        }

        self.cursor = (idx + 1) % self.geometry.frame_count();
        self.pending += 1;
        if self.pending >= FLUSH_BATCH {
            self.kick(libc::MSG_DONTWAIT)?;
        }

        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending == 0 {
            return Ok(());
        }
        self.kick(libc::MSG_DONTWAIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ring_frames_hold_header_and_probe() {
        let geometry = ring::size(8, SNAPLEN, 4096).unwrap();
        assert!(geometry.frame_size >= TX_DATA_OFFSET + FRAME_LEN);
        assert_eq!(geometry.frame_size % ring::FRAME_ALIGNMENT, 0);
    }

    #[test]
    fn tpacket_request_matches_the_kernel_layout() {
        assert_eq!(mem::size_of::<TpacketReq>(), 16);
    }
}
