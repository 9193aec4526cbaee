//! Egress resolution for the board's prefix.
//!
//! The prefix usually isn't routed anywhere useful, so link-layer backends
//! address the next hop directly: they need the egress interface, a source
//! address on it and the gateway's MAC.

use crate::{
    config::TransmitConfig,
    error::ResourceError,
    link::{LinkEndpoints, MacAddr},
};
use std::net::Ipv6Addr;

pub mod iface;
pub mod neigh;
pub mod table;

use self::{iface::Interface, table::Route};

/// An `--interface` override wins; otherwise the route's interface.
fn egress_interface(
    override_name: Option<&str>,
    route: Option<&Route>,
    dst: Ipv6Addr,
) -> Result<String, ResourceError> {
    match (override_name, route) {
        (Some(name), _) => Ok(name.to_string()),
        (None, Some(route)) => Ok(route.interface.clone()),
        (None, None) => Err(ResourceError::NoRoute(dst)),
    }
}

/// Whose MAC to look up: the route's next hop when it leaves through
/// `interface`, the destination itself otherwise.
fn neighbour_for(route: Option<&Route>, interface: &str, dst: Ipv6Addr) -> Ipv6Addr {
    route
        .filter(|route| route.interface == interface)
        .and_then(|route| route.next_hop)
        .unwrap_or(dst)
}

fn endpoints(
    iface: &Interface,
    dst_mac: MacAddr,
) -> Result<LinkEndpoints, ResourceError> {
    Ok(LinkEndpoints {
        interface: iface.name.clone(),
        ifindex: iface.index,
        src_mac: iface
            .mac
            .ok_or_else(|| ResourceError::NoHardwareAddress(iface.name.clone()))?,
        dst_mac,
        src_ip: iface::select_source_address(&iface.addrs)
            .ok_or_else(|| ResourceError::NoSourceAddress(iface.name.clone()))?,
    })
}

/// Resolves everything a link-layer backend needs to reach `dst`.
pub fn resolve(config: &TransmitConfig, dst: Ipv6Addr) -> Result<LinkEndpoints, ResourceError> {
    let routes = table::read().map_err(ResourceError::RouteTable)?;
    let route = table::lookup(&routes, dst);
    if let Some(route) = route {
        debug!(?route, %dst, "found route");
    }

    let interface = egress_interface(config.interface.as_deref(), route, dst)?;
    let interfaces = iface::interfaces().map_err(ResourceError::Interfaces)?;
    let iface = interfaces
        .iter()
        .find(|iface| iface.name == interface)
        .ok_or_else(|| ResourceError::UnknownInterface(interface.clone()))?;

    let dst_mac = match config.dst_mac {
        Some(mac) => mac,
        None => {
            let neighbour = neighbour_for(route, &interface, dst);
            neigh::lookup(iface.index, neighbour)
                .map_err(ResourceError::Neighbours)?
                .ok_or(ResourceError::NoGateway {
                    ip: neighbour,
                    interface: interface.clone(),
                })?
        }
    };

    let link = endpoints(iface, dst_mac)?;
    info!(
        interface = %link.interface,
        src_ip = %link.src_ip,
        src_mac = %link.src_mac,
        dst_mac = %link.dst_mac,
        "resolved egress"
    );

    Ok(link)
}
