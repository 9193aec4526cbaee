//! Image decoding into 16-bit RGBA frames.

use image::{
    AnimationDecoder, DynamicImage, ImageBuffer, ImageFormat, ImageResult, Rgba, codecs::gif::GifDecoder,
};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

/// 16 bits per channel, the depth every stage after decoding works in.
pub type Rgba16Image = ImageBuffer<Rgba<u16>, Vec<u16>>;

pub struct DecodedFrame {
    pub image: Rgba16Image,
    /// `None` when the source carries no usable delay.
    pub delay: Option<Duration>,
}

/// Decodes `path`, expanding animated GIFs into one frame per GIF frame.
pub fn decode_file(path: &Path) -> ImageResult<Vec<DecodedFrame>> {
    if ImageFormat::from_path(path)? == ImageFormat::Gif {
        let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
        let frames = decoder.into_frames().collect_frames()?;

        return Ok(frames
            .into_iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                let delay = (numer > 0 && denom > 0)
                    .then(|| Duration::from_micros(u64::from(numer) * 1000 / u64::from(denom)));

                DecodedFrame {
                    image: DynamicImage::ImageRgba8(frame.into_buffer()).into_rgba16(),
                    delay,
                }
            })
            .collect());
    }

    Ok(vec![DecodedFrame {
        image: image::open(path)?.into_rgba16(),
        delay: None,
    }])
}
