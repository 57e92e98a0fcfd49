mod fit;

use crate::deck::{EMU_PER_INCH, Rect};
use crate::document::{Alignment, Color, StructuredDocument};
use crate::settings::Settings;

pub use fit::{FitReport, FitSettings, needs_reduction, shrink_to_fit};

pub const DEFAULT_BASE_FONT_SIZE: f32 = 11.0;
pub const DEFAULT_FONT_FAMILY: &str = "Calibri";
pub const DEFAULT_LINE_SPACING: f32 = 1.15;
pub const MIN_TEXT_WIDTH_INCHES: f64 = 1.5;

const FALLBACK_LEFT_RATIO: f64 = 0.52;
const FALLBACK_WIDTH_RATIO: f64 = 0.46;
const FALLBACK_TOP_INCHES: f64 = 0.4;
const FALLBACK_VERTICAL_INCHES: f64 = 0.8;
const NO_SPACE_BEFORE: &[char] = &[' ', '.', ',', '!', '?', ':', ';', ')', ']'];
const SPACER_TEXT: &str = " ";

fn inches(value: f64) -> i64 {
    (value * EMU_PER_INCH as f64).round() as i64
}

// Right of the image when there is room, otherwise the right-hand half of
// the slide.
pub fn place_text_region(
    image: Option<Rect>,
    slide_width: i64,
    slide_height: i64,
    margin_inches: f64,
) -> Rect {
    let fallback = Rect::new(
        (slide_width as f64 * FALLBACK_LEFT_RATIO).round() as i64,
        inches(FALLBACK_TOP_INCHES),
        (slide_width as f64 * FALLBACK_WIDTH_RATIO).round() as i64,
        slide_height - inches(FALLBACK_VERTICAL_INCHES),
    );
    let Some(image) = image else {
        return fallback;
    };
    let margin = inches(margin_inches);
    let left = image.right() + margin;
    let width = slide_width - left - margin;
    if width < inches(MIN_TEXT_WIDTH_INCHES) {
        return fallback;
    }
    Rect::new(left, image.top, width, image.height)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub size_pt: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub alignment: Alignment,
    pub runs: Vec<Run>,
    pub spacer: bool,
}

impl Paragraph {
    fn new(alignment: Alignment) -> Self {
        Self {
            alignment,
            runs: Vec::new(),
            spacer: false,
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextFrame {
    pub bounds: Rect,
    pub paragraphs: Vec<Paragraph>,
    pub font_family: String,
    pub line_spacing: f32,
}

impl TextFrame {
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.paragraphs.iter().flat_map(|paragraph| paragraph.runs.iter())
    }

    pub fn smallest_font_size(&self) -> Option<f32> {
        self.runs().map(|run| run.size_pt).reduce(f32::min)
    }

    pub fn char_count(&self) -> usize {
        self.paragraphs
            .iter()
            .map(|paragraph| paragraph.text().chars().count())
            .sum()
    }

    // Block texts as rendered, without the separators added between runs.
    pub fn block_texts(&self) -> Vec<String> {
        self.paragraphs
            .iter()
            .filter(|paragraph| !paragraph.spacer)
            .flat_map(|paragraph| paragraph.runs.iter().map(|run| run.text.trim().to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub base_font_size: f32,
    pub font_family: String,
    pub line_spacing: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            base_font_size: DEFAULT_BASE_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            line_spacing: DEFAULT_LINE_SPACING,
        }
    }
}

impl RenderSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_font_size: settings.base_font_size,
            font_family: settings.font_family.clone(),
            line_spacing: settings.line_spacing,
        }
    }
}

fn needs_space(previous: &Run, next: &str) -> bool {
    !previous.text.ends_with([' ', '\n'])
        && !next.trim_start_matches('\n').starts_with(NO_SPACE_BEFORE)
}

pub fn render_document(
    document: &StructuredDocument,
    bounds: Rect,
    settings: &RenderSettings,
) -> TextFrame {
    let mut paragraphs: Vec<Paragraph> = Vec::new();
    for line in document.lines() {
        let blocks: Vec<_> = line
            .blocks
            .iter()
            .filter(|block| !block.translated.trim().is_empty())
            .collect();
        if blocks.is_empty() {
            if paragraphs.last().is_some_and(|paragraph| paragraph.spacer) {
                continue;
            }
            paragraphs.push(Paragraph {
                alignment: line.alignment,
                runs: vec![Run {
                    text: SPACER_TEXT.to_string(),
                    bold: false,
                    size_pt: settings.base_font_size,
                    color: Color::Black,
                }],
                spacer: true,
            });
            continue;
        }

        let mut paragraph = Paragraph::new(line.alignment);
        let last = blocks.len() - 1;
        for (idx, block) in blocks.into_iter().enumerate() {
            let mut text = block.translated.clone();
            if let Some(previous) = paragraph.runs.last()
                && needs_space(previous, &text)
            {
                text.insert(0, ' ');
            }
            let formatting = block.formatting;
            paragraph.runs.push(Run {
                text,
                bold: formatting.bold,
                size_pt: (settings.base_font_size + formatting.size_relative as f32).max(1.0),
                color: formatting.effective_color(),
            });
            if block.ends_with_break && idx < last {
                paragraphs.push(std::mem::replace(
                    &mut paragraph,
                    Paragraph::new(line.alignment),
                ));
            }
        }
        paragraphs.push(paragraph);
    }

    TextFrame {
        bounds,
        paragraphs,
        font_family: settings.font_family.clone(),
        line_spacing: settings.line_spacing,
    }
}
