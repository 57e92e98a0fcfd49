use tracing::debug;

use super::TextFrame;
use crate::settings::Settings;

pub const SHRINK_STEP_PT: f32 = 0.5;

// Overflow is guessed from paragraph and character counts, not measured.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSettings {
    pub min_font_size: f32,
    pub max_iterations: usize,
    pub step: f32,
    pub max_paragraphs: usize,
    pub max_chars: usize,
    pub dense_paragraphs: usize,
    pub dense_avg_chars: f32,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            min_font_size: 6.0,
            max_iterations: 20,
            step: SHRINK_STEP_PT,
            max_paragraphs: 30,
            max_chars: 2500,
            dense_paragraphs: 20,
            dense_avg_chars: 60.0,
        }
    }
}

impl FitSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            min_font_size: settings.min_font_size,
            max_iterations: settings.max_fit_iterations,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub iterations: usize,
    pub sizes: Vec<f32>,
}

impl FitReport {
    pub fn final_size(&self) -> Option<f32> {
        self.sizes.last().copied()
    }
}

// Spacer paragraphs carry no text and do not count toward the thresholds.
pub fn needs_reduction(frame: &TextFrame, settings: &FitSettings) -> bool {
    let paragraphs = frame
        .paragraphs
        .iter()
        .filter(|paragraph| !paragraph.spacer)
        .count();
    let chars = frame.char_count();
    let average = chars as f32 / paragraphs.max(1) as f32;
    paragraphs > settings.max_paragraphs
        || chars > settings.max_chars
        || (paragraphs > settings.dense_paragraphs && average > settings.dense_avg_chars)
}

pub fn shrink_to_fit(frame: &mut TextFrame, settings: &FitSettings) -> FitReport {
    let mut sizes: Vec<f32> = frame.smallest_font_size().into_iter().collect();
    let mut iterations = 0;
    while iterations < settings.max_iterations {
        let Some(smallest) = frame.smallest_font_size() else {
            break;
        };
        if smallest <= settings.min_font_size || !needs_reduction(frame, settings) {
            break;
        }
        for paragraph in &mut frame.paragraphs {
            for run in &mut paragraph.runs {
                if run.size_pt > settings.min_font_size {
                    run.size_pt = (run.size_pt - settings.step).max(settings.min_font_size);
                }
            }
        }
        iterations += 1;
        sizes.extend(frame.smallest_font_size());
    }
    if iterations > 0 {
        debug!(
            "font fit: {} iterations, smallest size {:?}",
            iterations,
            sizes.last()
        );
    }
    FitReport { iterations, sizes }
}
