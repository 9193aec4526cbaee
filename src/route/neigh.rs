//! Neighbour table lookups over rtnetlink (`RTM_GETNEIGH` dump).

use crate::{backend::sys, link::MacAddr};
use std::{io, mem, net::Ipv6Addr};

const NLMSG_HDR_LEN: usize = 16;
const NDMSG_LEN: usize = 12;
const RTA_HDR_LEN: usize = 4;

const NLMSG_ERROR: u16 = 2;
const NLMSG_DONE: u16 = 3;
const RTM_NEWNEIGH: u16 = 28;
const RTM_GETNEIGH: u16 = 30;

const NLM_F_REQUEST: u16 = 0x01;
const NLM_F_DUMP: u16 = 0x300;

const NDA_DST: u16 = 1;
const NDA_LLADDR: u16 = 2;

const NUD_INCOMPLETE: u16 = 0x01;
const NUD_FAILED: u16 = 0x20;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Scan {
    Found(MacAddr),
    More,
    Done,
    Failed(i32),
}

/// Returns the link-layer address the kernel holds for `ip` on `ifindex`.
pub fn lookup(ifindex: u32, ip: Ipv6Addr) -> io::Result<Option<MacAddr>> {
    let socket = sys::socket(libc::AF_NETLINK, libc::SOCK_RAW, libc::NETLINK_ROUTE)?;
    sys::send(&socket, &dump_request(), 0)?;

    let mut buf = vec![0; 32 * 1024];
    loop {
        let len = sys::recv(&socket, &mut buf)?;
        match scan(&buf[..len], ifindex, ip) {
            Scan::Found(mac) => return Ok(Some(mac)),
            Scan::Done => return Ok(None),
            Scan::Failed(errno) => return Err(io::Error::from_raw_os_error(errno)),
            Scan::More if len == 0 => return Ok(None),
            Scan::More => {}
        }
    }
}

fn dump_request() -> [u8; NLMSG_HDR_LEN + NDMSG_LEN] {
    let mut request = [0; NLMSG_HDR_LEN + NDMSG_LEN];
    let len = request.len() as u32;
    request[0..4].copy_from_slice(&len.to_ne_bytes());
    request[4..6].copy_from_slice(&RTM_GETNEIGH.to_ne_bytes());
    request[6..8].copy_from_slice(&(NLM_F_REQUEST | NLM_F_DUMP).to_ne_bytes());
    request[8..12].copy_from_slice(&1_u32.to_ne_bytes());
    request[NLMSG_HDR_LEN] = libc::AF_INET6 as u8;
    request
}

#[inline]
fn align(len: usize) -> usize {
    (len + 3) & !3
}

fn read_u16(buf: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_ne_bytes(buf.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(buf: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_ne_bytes(buf.get(at..at + 4)?.try_into().ok()?))
}

/// Walks one datagram of a neighbour dump.
pub(crate) fn scan(buf: &[u8], ifindex: u32, ip: Ipv6Addr) -> Scan {
    let mut offset = 0;
    while offset + NLMSG_HDR_LEN <= buf.len() {
        let (Some(len), Some(kind)) = (read_u32(buf, offset), read_u16(buf, offset + 4)) else {
            break;
        };
        let len = len as usize;
        if len < NLMSG_HDR_LEN || offset + len > buf.len() {
            break;
        }
        let message = &buf[offset..offset + len];

        match kind {
            NLMSG_DONE => return Scan::Done,
            NLMSG_ERROR => {
                let errno = read_u32(message, NLMSG_HDR_LEN).map_or(0, |raw| raw as i32);
                if errno != 0 {
                    return Scan::Failed(-errno);
                }
            }
            RTM_NEWNEIGH => {
                if let Some(mac) = neighbour_mac(message, ifindex, ip) {
                    return Scan::Found(mac);
                }
            }
            _ => {}
        }

        offset += align(len);
    }

    Scan::More
}

fn neighbour_mac(message: &[u8], ifindex: u32, ip: Ipv6Addr) -> Option<MacAddr> {
    let family = *message.get(NLMSG_HDR_LEN)?;
    let index = read_u32(message, NLMSG_HDR_LEN + 4)?;
    let state = read_u16(message, NLMSG_HDR_LEN + 8)?;
    if i32::from(family) != libc::AF_INET6
        || index != ifindex
        || state & (NUD_INCOMPLETE | NUD_FAILED) != 0
    {
        return None;
    }

    let mut dst = None;
    let mut lladdr = None;
    let mut offset = NLMSG_HDR_LEN + NDMSG_LEN;
    while offset + RTA_HDR_LEN <= message.len() {
        let len = usize::from(read_u16(message, offset)?);
        let kind = read_u16(message, offset + 2)?;
        if len < RTA_HDR_LEN || offset + len > message.len() {
            break;
        }
        let payload = &message[offset + RTA_HDR_LEN..offset + len];

        match (kind, payload.len()) {
            (NDA_DST, 16) => dst = <[u8; 16]>::try_from(payload).ok().map(Ipv6Addr::from),
            (NDA_LLADDR, 6) => lladdr = <[u8; 6]>::try_from(payload).ok().map(MacAddr),
            _ => {}
        }

        offset += align(len);
    }

    (dst == Some(ip)).then_some(lladdr).flatten()
}

const _: () = assert!(mem::size_of::<libc::nlmsghdr>() == NLMSG_HDR_LEN);
