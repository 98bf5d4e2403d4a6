use crate::{
    config::Config,
    error::{Error, Insufficient},
    extract::{Page, non_empty_pages, total_chars},
    probe::Capabilities,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextQuality {
    Text,
    ImageOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecision {
    /// The text layer is usable as is.
    UseText,
    /// Image-only and an OCR toolchain is available.
    RunOcr,
    /// Image-only and nothing can recover text locally.
    Insufficient(Insufficient),
}

pub fn classify(cfg: &Config, pages: &[Page]) -> TextQuality {
    if total_chars(pages) < cfg.extraction.min_total_chars || non_empty_pages(pages) == 0 {
        TextQuality::ImageOnly
    } else {
        TextQuality::Text
    }
}

/// Decide what to do with the first extraction pass.
pub fn decide(cfg: &Config, caps: &Capabilities, pages: &[Page]) -> TextDecision {
    match classify(cfg, pages) {
        TextQuality::Text => TextDecision::UseText,
        TextQuality::ImageOnly if caps.ocr_available => TextDecision::RunOcr,
        TextQuality::ImageOnly => TextDecision::Insufficient(Insufficient::OcrUnavailable {
            chars: total_chars(pages),
        }),
    }
}

/// Check the extraction of the OCR output; there is no further fallback.
pub fn after_ocr(cfg: &Config, pages: &[Page]) -> Result<(), Error> {
    match classify(cfg, pages) {
        TextQuality::Text => Ok(()),
        TextQuality::ImageOnly => Err(Error::ExtractionInsufficient(
            Insufficient::OcrYieldTooLow {
                chars: total_chars(pages),
            },
        )),
    }
}
