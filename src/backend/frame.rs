//! Hand-built Ethernet + IPv6 + ICMPv6 echo request frames.
//!
//! Every link-layer backend writes frames produced here. The destination
//! address lives at [`DST_ADDR_OFFSET`]; patching those 16 bytes is all it
//! takes to retarget a frame.

use super::SendPolicy;
use crate::link::LinkEndpoints;
use pingtide_common::DestinationAddress;
use std::net::Ipv6Addr;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV6_HEADER_LEN: usize = 40;
pub const ECHO_REQUEST_LEN: usize = 8;
pub const FRAME_LEN: usize = ETHERNET_HEADER_LEN + IPV6_HEADER_LEN + ECHO_REQUEST_LEN;

pub const IPV6_OFFSET: usize = ETHERNET_HEADER_LEN;
pub const SRC_ADDR_OFFSET: usize = IPV6_OFFSET + 8;
pub const DST_ADDR_OFFSET: usize = IPV6_OFFSET + 24;
pub const ICMPV6_OFFSET: usize = IPV6_OFFSET + IPV6_HEADER_LEN;

const ETHERTYPE_IPV6: u16 = 0x86dd;
const NEXT_HEADER_ICMPV6: u8 = 58;
const HOP_LIMIT: u8 = 64;
const ICMPV6_ECHO_REQUEST: u8 = 128;

pub const ECHO_IDENTIFIER: u16 = 1;
pub const ECHO_SEQUENCE: u16 = 1;

/// An ICMPv6 echo request with a zero checksum.
pub fn echo_request(identifier: u16, sequence: u16) -> [u8; ECHO_REQUEST_LEN] {
    let [id_hi, id_lo] = identifier.to_be_bytes();
    let [seq_hi, seq_lo] = sequence.to_be_bytes();
    [ICMPV6_ECHO_REQUEST, 0, 0, 0, id_hi, id_lo, seq_hi, seq_lo]
}

/// Serializes a complete frame.
///
/// With `checksum` unset the ICMPv6 checksum stays zero; the board doesn't
/// verify it and skipping it keeps the destination the only varying field.
pub fn build_frame(link: &LinkEndpoints, dst: Ipv6Addr, checksum: bool) -> [u8; FRAME_LEN] {
    let mut frame = [0; FRAME_LEN];

    frame[0..6].copy_from_slice(&link.dst_mac.0);
    frame[6..12].copy_from_slice(&link.src_mac.0);
    frame[12..14].copy_from_slice(&ETHERTYPE_IPV6.to_be_bytes());

    let ip = &mut frame[IPV6_OFFSET..ICMPV6_OFFSET];
    ip[0] = 6 << 4;
    ip[4..6].copy_from_slice(&(ECHO_REQUEST_LEN as u16).to_be_bytes());
    ip[6] = NEXT_HEADER_ICMPV6;
    ip[7] = HOP_LIMIT;
    ip[8..24].copy_from_slice(&link.src_ip.octets());
    ip[24..40].copy_from_slice(&dst.octets());

    let icmp = &mut frame[ICMPV6_OFFSET..];
    icmp.copy_from_slice(&echo_request(ECHO_IDENTIFIER, ECHO_SEQUENCE));
    if checksum {
        let sum = icmpv6_checksum(link.src_ip, dst, icmp);
        icmp[2..4].copy_from_slice(&sum.to_be_bytes());
    }

    frame
}

#[inline]
pub fn patch_destination(frame: &mut [u8], dst: &DestinationAddress) {
    frame[DST_ADDR_OFFSET..DST_ADDR_OFFSET + 16].copy_from_slice(dst.octets());
}

pub fn icmpv6_checksum(src: Ipv6Addr, dst: Ipv6Addr, message: &[u8]) -> u16 {
    let mut pseudo = [0; 40];
    pseudo[0..16].copy_from_slice(&src.octets());
    pseudo[16..32].copy_from_slice(&dst.octets());
    pseudo[32..36].copy_from_slice(&(message.len() as u32).to_be_bytes());
    pseudo[39] = NEXT_HEADER_ICMPV6;

    !fold(sum_words(&pseudo) + sum_words(message))
}

fn sum_words(bytes: &[u8]) -> u32 {
    bytes
        .chunks(2)
        .map(|word| match *word {
            [hi, lo] => u32::from(u16::from_be_bytes([hi, lo])),
            [hi] => u32::from(hi) << 8,
            _ => 0,
        })
        .sum()
}

fn fold(mut sum: u32) -> u16 {
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// Produces the frame for each destination according to a [`SendPolicy`].
pub struct FrameWriter {
    link: LinkEndpoints,
    policy: SendPolicy,
    frame: [u8; FRAME_LEN],
}

impl FrameWriter {
    pub fn new(link: LinkEndpoints, policy: SendPolicy) -> Self {
        let frame = build_frame(&link, Ipv6Addr::UNSPECIFIED, policy == SendPolicy::Rebuild);
        Self {
            link,
            policy,
            frame,
        }
    }

    /// The frame as last written; any buffer seeded with it can be patched.
    pub fn template(&self) -> &[u8; FRAME_LEN] {
        &self.frame
    }

    pub fn frame_for(&mut self, dst: &DestinationAddress) -> &[u8] {
        match self.policy {
            SendPolicy::PatchInPlace => patch_destination(&mut self.frame, dst),
            SendPolicy::Rebuild => self.frame = build_frame(&self.link, (*dst).into(), true),
        }
        &self.frame
    }

    /// Writes the frame for `dst` into `slot`, which must already hold the
    /// template when patching.
    pub fn write_into(&self, slot: &mut [u8], dst: &DestinationAddress) {
        match self.policy {
            SendPolicy::PatchInPlace => patch_destination(slot, dst),
            SendPolicy::Rebuild => {
                slot[..FRAME_LEN].copy_from_slice(&build_frame(&self.link, (*dst).into(), true))
            }
        }
    }
}
