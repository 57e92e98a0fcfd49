use image::DynamicImage;
use tracing::{debug, warn};

use crate::deck::{Picture, Rect, Slide};

#[derive(Debug, Clone)]
pub struct ImageRegion {
    pub slide_index: usize,
    pub bounds: Rect,
    pub image: DynamicImage,
    pub picture: Picture,
}

// The first picture starting in the left half wins; one that fails to decode
// counts as no image at all.
pub fn locate_image(slide: &Slide, deck_width: i64) -> Option<ImageRegion> {
    let half = deck_width / 2;
    let picture = slide
        .pictures
        .iter()
        .find(|picture| picture.bounds.left < half)?;
    let Some(bytes) = picture.bytes.as_deref() else {
        debug!(
            "slide {}: picture '{}' has no media",
            slide.number(),
            picture.name
        );
        return None;
    };
    match image::load_from_memory(bytes) {
        Ok(image) => Some(ImageRegion {
            slide_index: slide.index,
            bounds: picture.bounds,
            image,
            picture: picture.clone(),
        }),
        Err(err) => {
            warn!(
                "slide {}: cannot decode picture '{}': {}",
                slide.number(),
                picture.name,
                err
            );
            None
        }
    }
}
