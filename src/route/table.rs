//! The kernel's IPv6 routing table, read from `/proc/net/ipv6_route`.

use std::{fs, io, net::Ipv6Addr};

const ROUTE_TABLE: &str = "/proc/net/ipv6_route";

const RTF_UP: u32 = 0x0001;
const RTF_GATEWAY: u32 = 0x0002;
const RTF_REJECT: u32 = 0x0200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub dest: Ipv6Addr,
    pub prefix_len: u8,
    pub next_hop: Option<Ipv6Addr>,
    pub metric: u32,
    pub interface: String,
}

impl Route {
    pub fn contains(&self, dst: Ipv6Addr) -> bool {
        let mask = u128::MAX
            .checked_shl(128 - u32::from(self.prefix_len))
            .unwrap_or(0);
        u128::from(dst) & mask == u128::from(self.dest) & mask
    }
}

pub fn read() -> io::Result<Vec<Route>> {
    fs::read_to_string(ROUTE_TABLE).map(|table| parse(&table))
}

/// Parses usable routes, skipping routes that are down or reject traffic.
pub fn parse(table: &str) -> Vec<Route> {
    table.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Route> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [dest, prefix_len, _src, _src_len, next_hop, metric, _refcnt, _use, flags, interface] =
        fields.as_slice()
    else {
        return None;
    };

    let flags = u32::from_str_radix(flags, 16).ok()?;
    if flags & RTF_UP == 0 || flags & RTF_REJECT != 0 {
        return None;
    }

    let next_hop = parse_addr(next_hop)?;
    Some(Route {
        dest: parse_addr(dest)?,
        prefix_len: u8::from_str_radix(prefix_len, 16).ok().filter(|len| *len <= 128)?,
        next_hop: (flags & RTF_GATEWAY != 0 && !next_hop.is_unspecified()).then_some(next_hop),
        metric: u32::from_str_radix(metric, 16).ok()?,
        interface: interface.to_string(),
    })
}

fn parse_addr(hex: &str) -> Option<Ipv6Addr> {
    u128::from_str_radix(hex, 16)
        .ok()
        .filter(|_| hex.len() == 32)
        .map(Ipv6Addr::from)
}

/// Longest matching prefix wins; among equals the lowest metric.
pub fn lookup(routes: &[Route], dst: Ipv6Addr) -> Option<&Route> {
    routes
        .iter()
        .filter(|route| route.contains(dst))
        .min_by(|lhs, rhs| {
            rhs.prefix_len
                .cmp(&lhs.prefix_len)
                .then(lhs.metric.cmp(&rhs.metric))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TABLE: &str = "\
20010db8000000000000000000000000 20 00000000000000000000000000000000 00 00000000000000000000000000000000 00000100 00000001 00000000 00000001 eth1
20010db8000100000000000000000000 30 00000000000000000000000000000000 00 00000000000000000000000000000000 00000100 00000002 00000000 00000001 eth0
fe800000000000000000000000000000 40 00000000000000000000000000000000 00 00000000000000000000000000000000 00000100 00000001 00000000 00000001 eth0
00000000000000000000000000000000 00 00000000000000000000000000000000 00 fe800000000000000000000000000001 00000400 00000001 00000000 00000003 eth0
00000000000000000000000000000000 00 00000000000000000000000000000000 00 fe800000000000000000000000000001 00000064 00000001 00000000 00000003 wlan0
20010db8000200000000000000000000 30 00000000000000000000000000000000 00 00000000000000000000000000000000 ffffffff 00000001 00000000 00200200 lo
20010db8000300000000000000000000 30 00000000000000000000000000000000 00 00000000000000000000000000000000 00000100 00000001 00000000 00000000 eth2
not a route line
";

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    #[test]
    fn skips_reject_down_and_malformed_routes() {
        let routes = parse(TABLE);
        let interfaces: Vec<_> = routes.iter().map(|r| r.interface.as_str()).collect();
        assert_eq!(interfaces, vec!["eth1", "eth0", "eth0", "eth0", "wlan0"]);

        assert_eq!(routes[1].dest, addr("2001:db8:1::"));
        assert_eq!(routes[1].prefix_len, 48);
        assert_eq!(routes[1].next_hop, None);
        assert_eq!(routes[3].next_hop, Some(addr("fe80::1")));
        assert_eq!(routes[3].metric, 0x400);
    }

    #[test]
    fn longest_prefix_wins() {
        let routes = parse(TABLE);
        assert_eq!(lookup(&routes, addr("2001:db8:1::5")).unwrap().interface, "eth0");
        assert_eq!(lookup(&routes, addr("2001:db8:9::5")).unwrap().interface, "eth1");
    }

    #[test]
    fn lowest_metric_breaks_prefix_ties() {
        let routes = parse(TABLE);
        let route = lookup(&routes, addr("2001:610:1908:a000::1")).unwrap();
        assert_eq!(route.interface, "wlan0");
        assert_eq!(route.prefix_len, 0);
    }

    #[test]
    fn reject_routes_fall_through_to_the_default() {
        let routes = parse(TABLE);
        assert_eq!(lookup(&routes, addr("2001:db8:2::1")).unwrap().interface, "eth1");
    }

    #[test]
    fn no_route_without_a_match() {
        let routes = parse(&TABLE.lines().take(3).collect::<Vec<_>>().join("\n"));
        assert!(lookup(&routes, addr("2001:610::1")).is_none());
    }

    #[test]
    fn contains_handles_the_extremes() {
        let any = Route {
            dest: Ipv6Addr::UNSPECIFIED,
            prefix_len: 0,
            next_hop: None,
            metric: 0,
            interface: "eth0".into(),
        };
        assert!(any.contains(addr("2001:db8::1")));

        let host = Route {
            dest: addr("2001:db8::1"),
            prefix_len: 128,
            ..any
        };
        assert!(host.contains(addr("2001:db8::1")));
        assert!(!host.contains(addr("2001:db8::2")));
    }
}
