//! Visible-pixel extraction.

use image::{GenericImageView, Rgba};

/// A visible pixel, positioned relative to its frame's origin.
///
/// Colour channels keep 16-bit scale with 8 significant bits and are
/// alpha-premultiplied. Alpha is already reduced to 8 bits and never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub a: u8,
}

/// Collects every visible pixel of `image` in row-major order.
///
/// Pixels whose alpha is zero at 8-bit significance are skipped; nothing
/// downstream filters again.
pub fn extract<I>(image: &I) -> Vec<Pixel>
where
    I: GenericImageView<Pixel = Rgba<u16>>,
{
    let (width, height) = image.dimensions();
    let mut pixels = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let Rgba([r, g, b, a]) = image.get_pixel(x, y);
            let alpha = (a >> 8) as u8;
            if alpha == 0 {
                continue;
            }

            pixels.push(Pixel {
                x,
                y,
                r: premultiply(r, a),
                g: premultiply(g, a),
                b: premultiply(b, a),
                a: alpha,
            });
        }
    }

    pixels
}

#[inline]
fn premultiply(channel: u16, alpha: u16) -> u16 {
    (u32::from(channel) * u32::from(alpha) / 0xffff) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Rgba16Image;
    use image::ImageBuffer;
    use pretty_assertions::assert_eq;

    fn checkerboard() -> Rgba16Image {
        ImageBuffer::from_fn(3, 2, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0xffff, 0x8080, 0, 0xffff])
            } else {
                Rgba([0xffff, 0xffff, 0xffff, 0])
            }
        })
    }

    #[test]
    fn drops_transparent_pixels_in_row_major_order() {
        let pixels = extract(&checkerboard());
        let coords: Vec<_> = pixels.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(coords, vec![(0, 0), (2, 0), (1, 1)]);
        assert!(pixels.iter().all(|p| p.a == 0xff));
    }

    #[test]
    fn alpha_below_eight_bit_significance_is_invisible() {
        let image: Rgba16Image = ImageBuffer::from_pixel(1, 1, Rgba([0xffff, 0, 0, 0x00ff]));
        assert!(extract(&image).is_empty());
    }

    #[test]
    fn opaque_colours_are_untouched_and_translucent_ones_premultiplied() {
        let image: Rgba16Image = ImageBuffer::from_fn(2, 1, |x, _| match x {
            0 => Rgba([0xffff, 0x1234, 0x00ff, 0xffff]),
            _ => Rgba([0xffff, 0xffff, 0, 0x8000]),
        });
        let pixels = extract(&image);

        assert_eq!((pixels[0].r, pixels[0].g, pixels[0].b), (0xffff, 0x1234, 0x00ff));
        assert_eq!(pixels[1].a, 0x80);
        assert_eq!(pixels[1].r >> 8, 0x80);
        assert_eq!(pixels[1].b, 0);
    }

    #[test]
    fn sub_views_report_positions_relative_to_their_origin() {
        let image = checkerboard();
        let view = image.view(1, 0, 2, 2).to_image();
        let coords: Vec<_> = extract(&view).iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(coords, vec![(1, 0), (0, 1)]);
    }
}
