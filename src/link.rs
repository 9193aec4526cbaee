use pingtide_common::ConfigError;
use std::{fmt, net::Ipv6Addr, str::FromStr};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl FromStr for MacAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidMac(s.to_string());

        let mut octets = [0; 6];
        let mut parts = s.split([':', '-']);
        for octet in &mut octets {
            let part = parts.next().filter(|part| part.len() == 2).ok_or_else(invalid)?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Everything a link-layer backend needs to address its frames.
///
/// Resolved once at startup and cloned into each worker's backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEndpoints {
    pub interface: String,
    pub ifindex: u32,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv6Addr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_mac_addresses() {
        let mac: MacAddr = "44:D3:ca:5f:61:40".parse().unwrap();
        assert_eq!(mac, MacAddr([0x44, 0xd3, 0xca, 0x5f, 0x61, 0x40]));
        assert_eq!(mac.to_string(), "44:d3:ca:5f:61:40");
        assert_eq!("00-05-73-a0-00-00".parse::<MacAddr>().unwrap().0[2], 0x73);
    }

    #[test]
    fn rejects_malformed_mac_addresses() {
        for input in ["", "00:05:73:a0:00", "00:05:73:a0:00:00:01", "0:5:73:a0:00:00", "zz:05:73:a0:00:00"] {
            assert!(input.parse::<MacAddr>().is_err(), "{input}");
        }
    }
}
