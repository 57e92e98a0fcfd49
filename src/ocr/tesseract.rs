use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use std::io::Write;
use std::process::Command;

use super::OcrEngine;
use crate::error::ProviderError;

const LANGUAGE_CODES: &[(&str, &str)] = &[("es", "spa"), ("fr", "fra"), ("it", "ita"), ("en", "eng")];
const FALLBACK_LANGUAGES: &str = "spa+eng";

pub fn tesseract_language(code: &str) -> &'static str {
    LANGUAGE_CODES
        .iter()
        .find(|(ours, _)| ours.eq_ignore_ascii_case(code.trim()))
        .map(|(_, theirs)| *theirs)
        .unwrap_or(FALLBACK_LANGUAGES)
}

#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: String,
    psm: u32,
    oem: u32,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract", 3, 3)
    }
}

impl TesseractEngine {
    pub fn new(program: impl Into<String>, psm: u32, oem: u32) -> Self {
        Self {
            program: program.into(),
            psm,
            oem,
        }
    }

    fn run(&self, image: &GrayImage, languages: &str) -> Result<String> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush().ok();

        let output = Command::new(&self.program)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(languages)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("--oem")
            .arg(self.oem.to_string())
            .output()
            .with_context(|| format!("failed to run {} (is it installed?)", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn extract(&self, image: &GrayImage, language_hint: &str) -> Result<String, ProviderError> {
        self.run(image, tesseract_language(language_hint))
            .map_err(|err| ProviderError::Ocr(format!("{err:#}")))
    }
}
