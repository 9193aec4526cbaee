//! Draw-order techniques. Ordering is cosmetic: it permutes, never filters.

use crate::{ConfigError, Pixel};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use std::{f64::consts::TAU, fmt, str::FromStr};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Technique {
    #[default]
    Standard,
    Random,
    /// Accepted for compatibility; draws in extraction order like `Standard`.
    Scanline,
    Spiral,
    Wave,
}

impl FromStr for Technique {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "standard" => Self::Standard,
            "random" => Self::Random,
            "scanline" => Self::Scanline,
            "spiral" => Self::Spiral,
            "wave" => Self::Wave,
            other => return Err(ConfigError::InvalidTechnique(other.to_string())),
        })
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Random => "random",
            Self::Scanline => "scanline",
            Self::Spiral => "spiral",
            Self::Wave => "wave",
        })
    }
}

/// Shape of the `wave` technique: rows bend by `amplitude * sin(frequency * x)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wave {
    pub amplitude: f64,
    pub frequency: f64,
}

impl Default for Wave {
    fn default() -> Self {
        Self {
            amplitude: 10.0,
            frequency: 0.1,
        }
    }
}

/// Applies a [`Technique`] to pixel sequences.
///
/// Owns the generator used by `random` and by address shuffling, so a pinned
/// seed makes every random decision reproducible.
pub struct Orderer {
    technique: Technique,
    wave: Wave,
    rng: StdRng,
}

impl Orderer {
    pub fn new(technique: Technique, wave: Wave, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            technique,
            wave,
            rng,
        }
    }

    pub fn technique(&self) -> Technique {
        self.technique
    }

    /// Reorders `pixels` in place. `(width, height)` is the frame's bounding box.
    pub fn order(&mut self, pixels: &mut [Pixel], (width, height): (u32, u32)) {
        match self.technique {
            Technique::Standard | Technique::Scanline => {}
            Technique::Random => pixels.shuffle(&mut self.rng),
            Technique::Spiral => {
                let center = (i64::from(width / 2), i64::from(height / 2));
                sort_by_metric(pixels, |pixel| spiral_turns(pixel, center));
            }
            Technique::Wave => {
                let wave = self.wave;
                sort_by_metric(pixels, |pixel| wave_height(pixel, wave));
            }
        }
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

// `sort_by` is stable, so equal metrics keep extraction order.
fn sort_by_metric(pixels: &mut [Pixel], metric: impl Fn(&Pixel) -> f64) {
    pixels.sort_by(|lhs, rhs| metric(lhs).total_cmp(&metric(rhs)));
}

pub(crate) fn spiral_turns(pixel: &Pixel, (center_x, center_y): (i64, i64)) -> f64 {
    let dx = (i64::from(pixel.x) - center_x) as f64;
    let dy = (i64::from(pixel.y) - center_y) as f64;
    let angle = dy.atan2(dx);
    let distance = dx.hypot(dy);
    distance / TAU + angle / TAU
}

pub(crate) fn wave_height(pixel: &Pixel, wave: Wave) -> f64 {
    f64::from(pixel.y) + wave.amplitude * (wave.frequency * f64::from(pixel.x)).sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid(width: u32, height: u32) -> Vec<Pixel> {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.push(Pixel {
                    x,
                    y,
                    r: (x as u16) << 8,
                    g: (y as u16) << 8,
                    b: 0,
                    a: 0xff,
                });
            }
        }
        pixels
    }

    fn sorted_coords(pixels: &[Pixel]) -> Vec<(u32, u32)> {
        let mut coords: Vec<_> = pixels.iter().map(|p| (p.x, p.y)).collect();
        coords.sort_unstable();
        coords
    }

    #[test]
    fn parses_every_technique_name() {
        for name in ["standard", "random", "scanline", "spiral", "wave"] {
            let technique: Technique = name.parse().unwrap();
            assert_eq!(technique.to_string(), name);
        }
        assert!(matches!(
            "zigzag".parse::<Technique>(),
            Err(ConfigError::InvalidTechnique(_))
        ));
    }

    #[test]
    fn standard_and_scanline_keep_extraction_order() {
        let original = grid(5, 4);
        for technique in [Technique::Standard, Technique::Scanline] {
            let mut pixels = original.clone();
            Orderer::new(technique, Wave::default(), Some(7)).order(&mut pixels, (5, 4));
            assert_eq!(pixels, original);
        }
    }

    #[test]
    fn random_is_a_reproducible_permutation() {
        let original = grid(8, 8);

        let mut first = original.clone();
        Orderer::new(Technique::Random, Wave::default(), Some(42)).order(&mut first, (8, 8));
        let mut second = original.clone();
        Orderer::new(Technique::Random, Wave::default(), Some(42)).order(&mut second, (8, 8));

        assert_eq!(first, second);
        assert_ne!(first, original);
        assert_eq!(sorted_coords(&first), sorted_coords(&original));
    }

    #[test]
    fn spiral_is_non_decreasing_in_turns() {
        let mut pixels = grid(9, 7);
        Orderer::new(Technique::Spiral, Wave::default(), None).order(&mut pixels, (9, 7));

        let turns: Vec<_> = pixels.iter().map(|p| spiral_turns(p, (4, 3))).collect();
        assert!(turns.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(sorted_coords(&pixels), sorted_coords(&grid(9, 7)));
        // only the three pixels just above-left of the center have negative turns
        assert!(pixels.iter().position(|p| (p.x, p.y) == (4, 3)).unwrap() < 4);
    }

    #[test]
    fn spiral_ties_keep_input_order() {
        let mut pixels = vec![
            Pixel { x: 3, y: 1, r: 1, g: 0, b: 0, a: 0xff },
            Pixel { x: 0, y: 0, r: 0, g: 0, b: 0, a: 0xff },
            Pixel { x: 3, y: 1, r: 2, g: 0, b: 0, a: 0xff },
        ];
        Orderer::new(Technique::Spiral, Wave::default(), None).order(&mut pixels, (4, 4));

        let reds: Vec<_> = pixels.iter().filter(|p| p.x == 3).map(|p| p.r).collect();
        assert_eq!(reds, vec![1, 2]);
    }

    #[test]
    fn wave_is_non_decreasing_and_stable() {
        let wave = Wave {
            amplitude: 2.5,
            frequency: 0.7,
        };
        let mut pixels = grid(10, 6);
        Orderer::new(Technique::Wave, wave, None).order(&mut pixels, (10, 6));

        let heights: Vec<_> = pixels.iter().map(|p| wave_height(p, wave)).collect();
        assert!(heights.windows(2).all(|w| w[0] <= w[1]));

        // a flat wave degenerates to rows, and ties keep left-to-right order
        let flat = Wave {
            amplitude: 0.0,
            frequency: 1.0,
        };
        let mut pixels = grid(4, 3);
        Orderer::new(Technique::Wave, flat, None).order(&mut pixels, (4, 3));
        assert_eq!(pixels, grid(4, 3));
    }
}
