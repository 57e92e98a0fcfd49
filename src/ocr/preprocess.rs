use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

pub const OCR_CONTRAST: f32 = 1.5;

pub fn prepare_for_ocr(image: &DynamicImage, min_width: u32) -> GrayImage {
    let (width, height) = (image.width(), image.height());
    let upscaled = if width > 0 && width < min_width {
        let scale = min_width as f32 / width as f32;
        let new_height = ((height as f32 * scale) as u32).max(1);
        image.resize_exact(min_width, new_height, FilterType::Lanczos3)
    } else {
        image.clone()
    };
    enhance_contrast(&flatten_to_luma(&upscaled), OCR_CONTRAST)
}

// Transparent pixels are composited over white before conversion.
pub fn flatten_to_luma(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = GrayImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let blend = |channel: u8| channel as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = 0.299 * blend(r) + 0.587 * blend(g) + 0.114 * blend(b);
        luma.put_pixel(x, y, image::Luma([value.round().clamp(0.0, 255.0) as u8]));
    }
    luma
}

// Scales each pixel's distance from the mean intensity by `factor`.
pub fn enhance_contrast(image: &GrayImage, factor: f32) -> GrayImage {
    let count = (image.width() as u64 * image.height() as u64).max(1);
    let sum: u64 = image.pixels().map(|pixel| pixel[0] as u64).sum();
    let mean = (sum as f32 / count as f32).round();
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let value = mean + (pixel[0] as f32 - mean) * factor;
        pixel[0] = value.round().clamp(0.0, 255.0) as u8;
    }
    output
}
