//! Pixel → IPv6 destination encoding.
//!
//! Layout of the low 64 bits (address bytes 8..16):
//!
//! ```text
//!  8      10     12  13  14  15
//! +------+------+---+---+---+---+
//! |  x   |  y   | b | g | r | a |
//! +------+------+---+---+---+---+
//! ```
//!
//! `x` and `y` are big-endian. The same layout is used by every backend.

use crate::{ConfigError, Pixel};
use rkyv::{Archive, Deserialize, Serialize};
use std::{fmt, net::Ipv6Addr, str::FromStr};

/// Size of the board the clipping policy assumes.
pub const DISPLAY_WIDTH: u32 = 1920;
pub const DISPLAY_HEIGHT: u32 = 1080;

/// The network half of every destination address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prefix([u8; 8]);

impl Prefix {
    /// The prefix with an all-zero pixel payload.
    pub fn base(&self) -> Ipv6Addr {
        let mut octets = [0; 16];
        octets[..8].copy_from_slice(&self.0);
        Ipv6Addr::from(octets)
    }
}

impl FromStr for Prefix {
    type Err = ConfigError;

    /// Accepts `2001:db8::/64`, `2001:db8::` or the bare network half
    /// `2001:610:1908:a000`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => {
                let len: u8 = len
                    .parse()
                    .map_err(|_| ConfigError::InvalidPrefixLength(s.to_string()))?;
                (addr, Some(len))
            }
            None => (s, None),
        };

        if let Some(len) = len {
            if len > 64 {
                return Err(ConfigError::PrefixTooLong(len));
            }
        }

        let ip = addr
            .parse::<Ipv6Addr>()
            .or_else(|_| format!("{addr}::").parse::<Ipv6Addr>())
            .map_err(|source| ConfigError::InvalidPrefix {
                input: s.to_string(),
                source,
            })?;

        let mut network = [0; 8];
        network.copy_from_slice(&ip.octets()[..8]);
        Ok(Self(network))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/64", self.base())
    }
}

/// What the encoder does with coordinates that leave the board.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipPolicy {
    /// Truncate to 16 bits and let the coordinate wrap.
    #[default]
    Wrap,
    /// Drop pixels outside `[0, width) × [0, height)`.
    Clip { width: u32, height: u32 },
}

impl ClipPolicy {
    pub fn display() -> Self {
        Self::Clip {
            width: DISPLAY_WIDTH,
            height: DISPLAY_HEIGHT,
        }
    }
}

/// Decoded view of an address's low 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelPayload {
    pub x: u16,
    pub y: u16,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Archive, Clone, Copy, Debug, Deserialize, Hash, PartialEq, Eq, Serialize)]
pub struct DestinationAddress([u8; 16]);

impl DestinationAddress {
    pub fn new(prefix: Prefix, payload: PixelPayload) -> Self {
        let mut octets = [0; 16];
        octets[..8].copy_from_slice(&prefix.0);
        octets[8..10].copy_from_slice(&payload.x.to_be_bytes());
        octets[10..12].copy_from_slice(&payload.y.to_be_bytes());
        octets[12] = payload.b;
        octets[13] = payload.g;
        octets[14] = payload.r;
        octets[15] = payload.a;
        Self(octets)
    }

    #[inline]
    pub fn octets(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn payload(&self) -> PixelPayload {
        let o = &self.0;
        PixelPayload {
            x: u16::from_be_bytes([o[8], o[9]]),
            y: u16::from_be_bytes([o[10], o[11]]),
            b: o[12],
            g: o[13],
            r: o[14],
            a: o[15],
        }
    }
}

impl From<[u8; 16]> for DestinationAddress {
    fn from(octets: [u8; 16]) -> Self {
        Self(octets)
    }
}

impl From<DestinationAddress> for Ipv6Addr {
    fn from(addr: DestinationAddress) -> Self {
        Ipv6Addr::from(addr.0)
    }
}

impl fmt::Display for DestinationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv6Addr::from(self.0).fmt(f)
    }
}

pub struct AddressEncoder {
    prefix: Prefix,
    offset: (i32, i32),
    clip: ClipPolicy,
}

impl AddressEncoder {
    pub fn new(prefix: Prefix, offset: (i32, i32), clip: ClipPolicy) -> Self {
        Self {
            prefix,
            offset,
            clip,
        }
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    /// Encodes one pixel. Returns `None` only when clipping drops it.
    pub fn encode(&self, pixel: &Pixel) -> Option<DestinationAddress> {
        let x = i64::from(pixel.x) + i64::from(self.offset.0);
        let y = i64::from(pixel.y) + i64::from(self.offset.1);

        if let ClipPolicy::Clip { width, height } = self.clip {
            if !(0..i64::from(width)).contains(&x) || !(0..i64::from(height)).contains(&y) {
                return None;
            }
        }

        let payload = PixelPayload {
            x: x as u16,
            y: y as u16,
            r: (pixel.r >> 8) as u8,
            g: (pixel.g >> 8) as u8,
            b: (pixel.b >> 8) as u8,
            a: pixel.a,
        };

        Some(DestinationAddress::new(self.prefix, payload))
    }

    pub fn encode_all(&self, pixels: &[Pixel]) -> Vec<DestinationAddress> {
        pixels.iter().filter_map(|pixel| self.encode(pixel)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pixel(x: u32, y: u32, [r, g, b]: [u8; 3], a: u8) -> Pixel {
        Pixel {
            x,
            y,
            r: u16::from(r) << 8 | u16::from(r),
            g: u16::from(g) << 8 | u16::from(g),
            b: u16::from(b) << 8 | u16::from(b),
            a,
        }
    }

    #[test]
    fn parses_prefix_spellings() {
        let expected: Ipv6Addr = "2001:610:1908:a000::".parse().unwrap();
        for input in [
            "2001:610:1908:a000",
            "2001:610:1908:a000::",
            "2001:610:1908:a000::/64",
            "2001:610:1908:a000::/48",
        ] {
            assert_eq!(input.parse::<Prefix>().unwrap().base(), expected, "{input}");
        }
    }

    #[test]
    fn rejects_bad_prefixes() {
        assert!(matches!(
            "not-an-address".parse::<Prefix>(),
            Err(ConfigError::InvalidPrefix { .. })
        ));
        assert!(matches!(
            "2001:db8::/96".parse::<Prefix>(),
            Err(ConfigError::PrefixTooLong(96))
        ));
        assert!(matches!(
            "2001:db8::/x".parse::<Prefix>(),
            Err(ConfigError::InvalidPrefixLength(_))
        ));
    }

    #[test]
    fn field_layout_is_bit_exact() {
        let prefix: Prefix = "2001:db8::/64".parse().unwrap();
        let encoder = AddressEncoder::new(prefix, (0, 0), ClipPolicy::Wrap);
        let addr = encoder
            .encode(&pixel(0x0102, 0x0304, [0xaa, 0xbb, 0xcc], 0xdd))
            .unwrap();

        assert_eq!(
            addr.octets(),
            &[
                0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0x01, 0x02, 0x03, 0x04, 0xcc, 0xbb, 0xaa, 0xdd
            ]
        );
        assert_eq!(addr.to_string(), "2001:db8::102:304:ccbb:aadd");
    }

    #[test]
    fn payload_round_trips_with_offsets() {
        let prefix: Prefix = "2001:db8::".parse().unwrap();
        let encoder = AddressEncoder::new(prefix, (100, -5), ClipPolicy::Wrap);

        for (x, y, rgb, a) in [
            (0, 5, [0, 0, 0], 1),
            (17, 900, [255, 128, 1], 255),
            (65435, 65540, [9, 8, 7], 6),
        ] {
            let payload = encoder.encode(&pixel(x, y, rgb, a)).unwrap().payload();
            assert_eq!(
                payload,
                PixelPayload {
                    x: (x + 100) as u16,
                    y: (y - 5) as u16,
                    r: rgb[0],
                    g: rgb[1],
                    b: rgb[2],
                    a,
                }
            );
        }
    }

    #[test]
    fn wrap_truncates_out_of_range_coordinates() {
        let prefix: Prefix = "2001:db8::".parse().unwrap();
        let encoder = AddressEncoder::new(prefix, (-1, 65536), ClipPolicy::Wrap);
        let payload = encoder.encode(&pixel(0, 2, [1, 2, 3], 4)).unwrap().payload();
        assert_eq!((payload.x, payload.y), (0xffff, 2));
    }

    #[test]
    fn clip_drops_pixels_outside_the_display() {
        let prefix: Prefix = "2001:db8::".parse().unwrap();
        let encoder = AddressEncoder::new(prefix, (1900, -1), ClipPolicy::display());
        let pixels = [
            pixel(0, 0, [1, 1, 1], 255),
            pixel(19, 1, [2, 2, 2], 255),
            pixel(20, 1, [3, 3, 3], 255),
            pixel(5, 1081, [4, 4, 4], 255),
        ];

        let payloads: Vec<_> = encoder
            .encode_all(&pixels)
            .iter()
            .map(|addr| (addr.payload().x, addr.payload().y))
            .collect();
        assert_eq!(payloads, vec![(1919, 0)]);
    }
}
