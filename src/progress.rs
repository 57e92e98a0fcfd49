use serde::Serialize;

use crate::pipeline::SlideRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideStatus {
    Processing,
    Skipped,
    Completed,
    Failed,
}

impl SlideStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SlideStatus::Processing => "processing",
            SlideStatus::Skipped => "skipped",
            SlideStatus::Completed => "completed",
            SlideStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ocr,
    Render,
    SlideMethod,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Ocr => "ocr",
            Phase::Render => "render",
            Phase::SlideMethod => "slide_method",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub status: SlideStatus,
    pub slide_index: usize,
    pub slide_total: usize,
    pub phase: Option<Phase>,
    pub error: Option<String>,
    pub slide_methods: Option<Vec<SlideRecord>>,
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}
