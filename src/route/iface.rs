//! Interface enumeration via `getifaddrs`.

use crate::{backend::sys, link::MacAddr};
use std::{
    ffi::CStr,
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    ptr,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub index: u32,
    pub mac: Option<MacAddr>,
    pub addrs: Vec<IpAddr>,
}

pub fn interfaces() -> io::Result<Vec<Interface>> {
    let mut head: *mut libc::ifaddrs = ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut head) } == -1 {
        return Err(io::Error::last_os_error());
    }

    let mut interfaces: Vec<Interface> = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        let name = unsafe { CStr::from_ptr(entry.ifa_name) }
            .to_string_lossy()
            .into_owned();
        let idx = match interfaces.iter().position(|iface| iface.name == name) {
            Some(idx) => idx,
            None => {
                interfaces.push(Interface {
                    index: sys::interface_index(&name).unwrap_or(0),
                    name,
                    ..Interface::default()
                });
                interfaces.len() - 1
            }
        };
        let iface = &mut interfaces[idx];

        if entry.ifa_addr.is_null() {
            continue;
        }

        match i32::from(unsafe { (*entry.ifa_addr).sa_family }) {
            libc::AF_INET => {
                let addr = unsafe { &*entry.ifa_addr.cast::<libc::sockaddr_in>() };
                let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
                iface.addrs.push(IpAddr::V4(ip));
            }
            libc::AF_INET6 => {
                let addr = unsafe { &*entry.ifa_addr.cast::<libc::sockaddr_in6>() };
                iface.addrs.push(IpAddr::V6(Ipv6Addr::from(addr.sin6_addr.s6_addr)));
            }
            libc::AF_PACKET => {
                let addr = unsafe { &*entry.ifa_addr.cast::<libc::sockaddr_ll>() };
                if addr.sll_halen == 6 {
                    let mut mac = [0; 6];
                    mac.copy_from_slice(&addr.sll_addr[..6]);
                    iface.mac = Some(MacAddr(mac));
                }
            }
            _ => {}
        }
    }

    unsafe { libc::freeifaddrs(head) };
    Ok(interfaces)
}

/// The first global-ish IPv6 address: not IPv4 or IPv4-mapped, and not
/// starting with `0xfe` (link-local and the deprecated site-local range).
pub fn select_source_address(addrs: &[IpAddr]) -> Option<Ipv6Addr> {
    addrs.iter().find_map(|addr| match addr {
        IpAddr::V6(ip) if ip.to_ipv4_mapped().is_none() && ip.octets()[0] != 0xfe => Some(*ip),
        _ => None,
    })
}
