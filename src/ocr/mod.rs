pub mod classify;
mod preprocess;
mod reconstruct;
mod reflow;
mod tesseract;

use image::{DynamicImage, GrayImage};

use crate::error::ProviderError;

pub use preprocess::{enhance_contrast, flatten_to_luma, prepare_for_ocr};
pub use reconstruct::{filter_lines, group_paragraphs, reconstruct};
pub use reflow::reflow_translation;
pub use tesseract::{TesseractEngine, tesseract_language};

pub const DEFAULT_MIN_WIDTH: u32 = 1200;

pub trait OcrEngine: Send + Sync {
    fn extract(&self, image: &GrayImage, language_hint: &str) -> Result<String, ProviderError>;
}

pub fn recognize(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    language_hint: &str,
    min_width: u32,
) -> Result<String, ProviderError> {
    let prepared = prepare_for_ocr(image, min_width);
    let raw = engine.extract(&prepared, language_hint)?;
    let text = reconstruct(&raw);
    if text.is_empty() {
        return Err(ProviderError::EmptyOcr);
    }
    Ok(text)
}
