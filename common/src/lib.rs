//! Shared pipeline for turning decoded images into probe destination addresses.
//!
//! Used by the `pingtide` sender and by the `pingtide-process` preprocessor,
//! which archives the output of [`Renderer`] so the sender can map it directly.

use rkyv::{Archive, Deserialize, Serialize};
use std::time::Duration;

pub mod address;
pub mod decode;
pub mod error;
pub mod order;
pub mod pixel;
pub mod render;

pub use self::{
    address::{AddressEncoder, ClipPolicy, DestinationAddress, PixelPayload, Prefix},
    decode::{DecodedFrame, Rgba16Image},
    error::ConfigError,
    order::{Orderer, Technique, Wave},
    pixel::Pixel,
    render::{RenderConfig, Renderer},
};

/// One image's addresses, drawn as a unit for `delay_us` microseconds.
#[derive(Archive, Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub addrs: Vec<DestinationAddress>,
    pub delay_us: u64,
}

impl Frame {
    pub fn new(addrs: Vec<DestinationAddress>, delay: Duration) -> Self {
        Self {
            addrs,
            delay_us: delay.as_micros().try_into().unwrap_or(u64::MAX),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_micros(self.delay_us)
    }
}
