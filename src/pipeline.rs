use anyhow::{Result, anyhow};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::cost::PriceTable;
use crate::deck::{SlideOutput, read_deck, write_deck};
use crate::error::{PipelineError, StageError};
use crate::locate::locate_image;
use crate::progress::{Phase, ProgressEvent, ProgressSink, SlideStatus};
use crate::render::{FitSettings, RenderSettings, place_text_region, render_document, shrink_to_fit};
use crate::settings::Settings;
use crate::translate::{
    Backends, ChainConfig, Mode, SlideChain, SlideInput, build_chain, translate_slide,
};

pub const UNKNOWN_METHOD: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlideSelection {
    #[default]
    All,
    Indices(BTreeSet<usize>),
}

impl SlideSelection {
    pub fn contains(&self, index: usize) -> bool {
        match self {
            SlideSelection::All => true,
            SlideSelection::Indices(indices) => indices.contains(&index),
        }
    }

    // "1,3-5" style, 1-based.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return Ok(SlideSelection::All);
        }
        let mut indices = BTreeSet::new();
        for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (slide_number(start)?, slide_number(end)?),
                None => {
                    let number = slide_number(part)?;
                    (number, number)
                }
            };
            if start > end {
                return Err(anyhow!("invalid slide range '{}'", part));
            }
            indices.extend((start..=end).map(|number| number - 1));
        }
        if indices.is_empty() {
            return Err(anyhow!("no slides selected in '{}'", value));
        }
        Ok(SlideSelection::Indices(indices))
    }
}

impl FromStr for SlideSelection {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

fn slide_number(value: &str) -> Result<usize> {
    let number: usize = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid slide number '{}'", value.trim()))?;
    if number == 0 {
        return Err(anyhow!("slide numbers start at 1"));
    }
    Ok(number)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideRecord {
    pub slide: usize,
    pub method: String,
    pub model: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub total_slides: usize,
    pub selected_slides: usize,
    pub processed_slides: usize,
    pub skipped_slides: usize,
    pub failed_slides: usize,
    pub slide_methods: Vec<SlideRecord>,
    pub warnings: Vec<String>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    pub elapsed_seconds: f64,
}

impl PipelineStats {
    pub fn method_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.slide_methods {
            *counts.entry(record.method.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub document: Vec<u8>,
    pub stats: PipelineStats,
}

impl PipelineOutput {
    pub fn all_failed(&self) -> bool {
        self.stats.failed_slides > 0 && self.stats.processed_slides == 0
    }
}

pub struct Pipeline {
    chain: SlideChain,
    mode: Mode,
    render: RenderSettings,
    fit: FitSettings,
    prices: PriceTable,
    margin_inches: f64,
}

struct Counter<'a> {
    sink: &'a dyn ProgressSink,
    total: usize,
    slide_total: usize,
}

impl Counter<'_> {
    fn emit(
        &self,
        current: usize,
        slide_index: usize,
        status: SlideStatus,
        phase: Option<Phase>,
        error: Option<String>,
        slide_methods: Option<Vec<SlideRecord>>,
    ) {
        self.sink.on_progress(&ProgressEvent {
            current,
            total: self.total,
            status,
            slide_index,
            slide_total: self.slide_total,
            phase,
            error,
            slide_methods,
        });
    }
}

impl Pipeline {
    pub fn new(config: &ChainConfig, backends: &Backends, settings: &Settings) -> Result<Self> {
        Ok(Self {
            chain: build_chain(config, backends)?,
            mode: config.mode,
            render: RenderSettings::from_settings(settings),
            fit: FitSettings::from_settings(settings),
            prices: PriceTable::default().with_prices(&settings.prices),
            margin_inches: settings.text_margin_inches,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.chain.stage_names()
    }

    pub async fn run(
        &self,
        deck_bytes: &[u8],
        selection: &SlideSelection,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let started = Instant::now();
        let deck = read_deck(deck_bytes).map_err(PipelineError::InvalidDocument)?;
        let selected = deck
            .slides
            .iter()
            .filter(|slide| selection.contains(slide.index))
            .count();
        let counter = Counter {
            sink: progress,
            total: selected,
            slide_total: deck.slides.len(),
        };
        let mut stats = PipelineStats {
            total_slides: deck.slides.len(),
            selected_slides: selected,
            ..PipelineStats::default()
        };
        let mut outputs = Vec::new();
        let mut current = 0;
        info!(
            "translating {} of {} slides ({})",
            selected,
            deck.slides.len(),
            self.mode
        );

        for slide in &deck.slides {
            if !selection.contains(slide.index) {
                stats.skipped_slides += 1;
                continue;
            }
            current += 1;
            let number = slide.number();
            counter.emit(current, number, SlideStatus::Processing, None, None, None);
            cancel.checkpoint()?;

            let Some(region) = locate_image(slide, deck.width) else {
                debug!("slide {}: no image in the left half", number);
                stats.skipped_slides += 1;
                counter.emit(current, number, SlideStatus::Skipped, None, None, None);
                continue;
            };

            counter.emit(current, number, SlideStatus::Processing, Some(Phase::Ocr), None, None);
            let input = SlideInput {
                slide_number: number,
                image: Arc::new(region.image),
                cancel: cancel.clone(),
            };
            match translate_slide(&self.chain, &input).await {
                Ok(translation) => {
                    counter.emit(
                        current,
                        number,
                        SlideStatus::Processing,
                        Some(Phase::Render),
                        None,
                        None,
                    );
                    let bounds = place_text_region(
                        Some(region.bounds),
                        deck.width,
                        deck.height,
                        self.margin_inches,
                    );
                    let mut frame = render_document(&translation.document, bounds, &self.render);
                    shrink_to_fit(&mut frame, &self.fit);

                    stats.processed_slides += 1;
                    stats.total_input_tokens += translation.usage.input_tokens;
                    stats.total_output_tokens += translation.usage.output_tokens;
                    stats.total_cost += self.prices.cost(&translation.model_name, translation.usage);
                    if let Some(note) = translation.fallback_note() {
                        warn!("slide {}: recovered after fallback: {}", number, note);
                    }
                    stats.slide_methods.push(SlideRecord {
                        slide: number,
                        method: translation.method.as_str().to_string(),
                        model: Some(translation.model_name.clone()),
                        error: translation.fallback_note(),
                    });
                    outputs.push(SlideOutput {
                        slide_index: slide.index,
                        picture: region.picture,
                        text: Some(frame),
                    });
                    if self.mode == Mode::OcrFree {
                        counter.emit(
                            current,
                            number,
                            SlideStatus::Processing,
                            Some(Phase::SlideMethod),
                            None,
                            Some(stats.slide_methods.clone()),
                        );
                    }
                    counter.emit(current, number, SlideStatus::Completed, None, None, None);
                }
                Err(StageError::Cancelled(cancelled)) => {
                    info!("cancelled at slide {}", number);
                    return Err(cancelled.into());
                }
                Err(StageError::Provider(error)) => {
                    warn!("slide {} failed: {}", number, error);
                    let message = error.to_string();
                    stats.failed_slides += 1;
                    stats.warnings.push(format!("Slide {}: {}", number, message));
                    stats.slide_methods.push(SlideRecord {
                        slide: number,
                        method: UNKNOWN_METHOD.to_string(),
                        model: None,
                        error: Some(message.clone()),
                    });
                    outputs.push(SlideOutput {
                        slide_index: slide.index,
                        picture: region.picture,
                        text: None,
                    });
                    counter.emit(current, number, SlideStatus::Failed, None, Some(message), None);
                }
            }
            cancel.checkpoint()?;
        }

        let document = write_deck(deck_bytes, &deck, &outputs).map_err(PipelineError::Output)?;
        stats.elapsed_seconds = started.elapsed().as_secs_f64();
        info!(
            "done: {} processed, {} failed, {} skipped in {:.1}s",
            stats.processed_slides, stats.failed_slides, stats.skipped_slides, stats.elapsed_seconds
        );
        Ok(PipelineOutput { document, stats })
    }
}
