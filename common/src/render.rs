//! The per-frame pipeline: extract → order → encode → optional shuffle.

use crate::{
    AddressEncoder, ClipPolicy, Frame, Orderer, Prefix, Technique, Wave,
    decode::{DecodedFrame, Rgba16Image},
    pixel,
};
use std::time::Duration;

/// Everything that decides which addresses an image turns into.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub prefix: Prefix,
    pub offset: (i32, i32),
    pub technique: Technique,
    pub wave: Wave,
    pub clip: ClipPolicy,
    /// Shuffle each frame's addresses after ordering.
    pub shuffle: bool,
    pub seed: Option<u64>,
}

pub struct Renderer {
    orderer: Orderer,
    encoder: AddressEncoder,
    shuffle: bool,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            orderer: Orderer::new(config.technique, config.wave, config.seed),
            encoder: AddressEncoder::new(config.prefix, config.offset, config.clip),
            shuffle: config.shuffle,
        }
    }

    pub fn render(&mut self, image: &Rgba16Image, delay: Duration) -> Frame {
        let mut pixels = pixel::extract(image);
        self.orderer.order(&mut pixels, image.dimensions());

        let mut addrs = self.encoder.encode_all(&pixels);
        if self.shuffle {
            self.orderer.shuffle(&mut addrs);
        }

        Frame::new(addrs, delay)
    }

    /// Renders decoded frames, using `default_delay` where a frame has none.
    pub fn render_all(&mut self, decoded: &[DecodedFrame], default_delay: Duration) -> Vec<Frame> {
        decoded
            .iter()
            .map(|frame| self.render(&frame.image, frame.delay.unwrap_or(default_delay)))
            .collect()
    }
}
