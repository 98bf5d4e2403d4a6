//! Per-page text extraction from a PDF's text layer.
//!
//! This stage never decides whether a document is image-only; it only reports
//! what the text layer holds. See `policy` for the OCR decision.

use crate::error::{Error, Result};
use lopdf::Document;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-indexed.
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub normalize_unicode: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
        }
    }
}

/// Number of pages in the PDF at `path`.
pub fn page_count(path: &Path) -> Result<u32> {
    let doc = load(path)?;
    Ok(doc.get_pages().len() as u32)
}

/// Extract normalized text for every page, in order.
///
/// `on_page(page_number, total_pages)` fires once per page after it is extracted.
pub fn extract(
    path: &Path,
    opts: ExtractOptions,
    on_page: &mut dyn FnMut(u32, u32),
) -> Result<Vec<Page>> {
    let doc = load(path)?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    let total = page_numbers.len() as u32;
    debug!("extracting {} pages from {}", total, path.display());

    let mut pages = Vec::with_capacity(page_numbers.len());
    for number in page_numbers {
        let raw = match doc.extract_text(&[number]) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("page {number} of {}: text layer unreadable: {err}", path.display());
                String::new()
            }
        };
        pages.push(Page {
            page_number: number,
            text: normalize(&raw, opts.normalize_unicode),
        });
        on_page(number, total);
    }
    Ok(pages)
}

fn load(path: &Path) -> Result<Document> {
    Document::load(path).map_err(|e| Error::DocumentUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize(raw: &str, normalize_unicode: bool) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").expect("static whitespace regex"));
    let text = if normalize_unicode {
        raw.nfkc().collect::<String>()
    } else {
        raw.to_string()
    };
    ws.replace_all(&text, " ").trim().to_string()
}

pub fn total_chars(pages: &[Page]) -> usize {
    pages.iter().map(|p| p.text.chars().count()).sum()
}

pub fn non_empty_pages(pages: &[Page]) -> usize {
    pages.iter().filter(|p| !p.text.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Step 1:\n\n\tReview\u{00a0} form  ", true), "Step 1: Review form");
        assert_eq!(normalize("\n \t", false), "");
    }

    #[test]
    fn nfkc_folds_ligatures() {
        assert_eq!(normalize("ﬁle", true), "file");
        assert_eq!(normalize("ﬁle", false), "ﬁle");
    }

    #[test]
    fn unreadable_document_is_typed() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("bad.pdf");
        std::fs::write(&p, b"not a pdf").unwrap();
        let err = extract(&p, ExtractOptions::default(), &mut |_: u32, _: u32| {}).unwrap_err();
        assert!(matches!(err, Error::DocumentUnreadable { .. }));
    }
}
