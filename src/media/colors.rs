//! Dominant color extraction.
//!
//! The image is downscaled, then every opaque pixel is dropped into a coarse
//! RGB bucket (16 levels per channel). The three fullest buckets, averaged,
//! become the primary, secondary and tertiary colors.

use crate::types::ColorPalette;
use image::DynamicImage;
use std::collections::HashMap;

const SAMPLE_SIZE: u32 = 64;
const MIN_ALPHA: u8 = 128;

#[derive(Default)]
struct Bucket {
    count: u64,
    sum: [u64; 3],
}

impl Bucket {
    fn hex(&self) -> String {
        let [r, g, b] = self.sum.map(|s| (s / self.count.max(1)) as u8);
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

pub fn dominant_colors(image: &DynamicImage) -> ColorPalette {
    let sample = if image.width() > SAMPLE_SIZE || image.height() > SAMPLE_SIZE {
        image.thumbnail(SAMPLE_SIZE, SAMPLE_SIZE).to_rgba8()
    } else {
        image.to_rgba8()
    };

    let mut buckets: HashMap<[u8; 3], Bucket> = HashMap::new();
    for pixel in sample.pixels() {
        let [r, g, b, a] = pixel.0;
        if a < MIN_ALPHA {
            continue;
        }
        let bucket = buckets.entry([r >> 4, g >> 4, b >> 4]).or_default();
        bucket.count += 1;
        bucket.sum[0] += u64::from(r);
        bucket.sum[1] += u64::from(g);
        bucket.sum[2] += u64::from(b);
    }

    let mut ranked: Vec<([u8; 3], Bucket)> = buckets.into_iter().collect();
    // Ties broken by bucket key so the palette is deterministic.
    ranked.sort_by(|(ka, a), (kb, b)| b.count.cmp(&a.count).then(ka.cmp(kb)));

    let mut hexes = ranked.iter().take(3).map(|(_, bucket)| bucket.hex());
    ColorPalette {
        primary: hexes.next().unwrap_or_default(),
        secondary: hexes.next().unwrap_or_default(),
        tertiary: hexes.next().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn single_color_image() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let palette = dominant_colors(&DynamicImage::ImageRgba8(img));
        assert_eq!(palette.primary, "#ff0000");
        assert_eq!(palette.secondary, "");
        assert_eq!(palette.tertiary, "");
    }

    #[test]
    fn colors_ranked_by_area() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255]));
        for x in 0..10 {
            for y in 0..3 {
                img.put_pixel(x, y, Rgba([0, 255, 0, 255]));
            }
        }
        img.put_pixel(0, 9, Rgba([255, 255, 255, 255]));
        let palette = dominant_colors(&DynamicImage::ImageRgba8(img));
        assert_eq!(palette.primary, "#0000ff");
        assert_eq!(palette.secondary, "#00ff00");
        assert_eq!(palette.tertiary, "#ffffff");
    }

    #[test]
    fn transparent_pixels_are_ignored() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 0]));
        let palette = dominant_colors(&DynamicImage::ImageRgba8(img));
        assert!(palette.is_empty());
    }
}
