use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;
use tracing::debug;

pub const VISION_UPSCALE: u32 = 2;
pub const VISION_MAX_EDGE: u32 = 3000;
pub const VISION_CONTRAST: f32 = 1.2;
const UNSHARP_SIGMA: f32 = 1.0;
const UNSHARP_THRESHOLD: i32 = 2;

pub fn prepare_for_vision(image: &DynamicImage) -> RgbImage {
    let (width, height) = (image.width().max(1), image.height().max(1));
    let longest = width.max(height);
    let target = (longest * VISION_UPSCALE).min(VISION_MAX_EDGE).max(longest);
    let scaled = if target > longest {
        let factor = target as f32 / longest as f32;
        image.resize_exact(
            ((width as f32 * factor).round() as u32).max(1),
            ((height as f32 * factor).round() as u32).max(1),
            FilterType::Lanczos3,
        )
    } else {
        image.clone()
    };
    let contrasted = enhance_rgb_contrast(&scaled.to_rgb8(), VISION_CONTRAST);
    DynamicImage::ImageRgb8(contrasted)
        .unsharpen(UNSHARP_SIGMA, UNSHARP_THRESHOLD)
        .to_rgb8()
}

// Same mean-anchored stretch as the OCR path, anchored on mean luma.
fn enhance_rgb_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let count = (image.width() as u64 * image.height() as u64).max(1) as f32;
    let mean = image
        .pixels()
        .map(|pixel| {
            let [r, g, b] = pixel.0;
            0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
        })
        .sum::<f32>()
        / count;
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let value = mean + (*channel as f32 - mean) * factor;
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    output
}

pub fn vision_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let prepared = prepare_for_vision(image);
    let mut buf = Vec::new();
    prepared.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "encoded {}x{} slide image -> {} bytes png",
        prepared.width(),
        prepared.height(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_images_are_doubled() {
        let image = DynamicImage::new_rgb8(100, 50);
        assert_eq!(prepare_for_vision(&image).dimensions(), (200, 100));
    }

    #[test]
    fn large_images_are_capped() {
        let image = DynamicImage::new_rgb8(2000, 1000);
        assert_eq!(prepare_for_vision(&image).dimensions(), (3000, 1500));
        let huge = DynamicImage::new_rgb8(4000, 10);
        assert_eq!(prepare_for_vision(&huge).dimensions(), (4000, 10));
    }

    #[test]
    fn encodes_png() {
        let image = DynamicImage::new_rgb8(8, 8);
        let png = vision_png(&image).expect("png");
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).expect("decode");
        assert_eq!(decoded.width(), 16);
    }
}
