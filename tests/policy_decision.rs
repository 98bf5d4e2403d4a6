use sop_scout::{
    config::Config,
    error::{Error, Insufficient},
    extract::Page,
    policy::{TextDecision, after_ocr, decide},
    probe::Capabilities,
};
use std::path::PathBuf;

fn mk_pages(texts: &[&str]) -> Vec<Page> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Page {
            page_number: i as u32 + 1,
            text: t.to_string(),
        })
        .collect()
}

fn with_ocr() -> Capabilities {
    Capabilities {
        ocr_available: true,
        ocr_entrypoint: Some(PathBuf::from("/res/ocr/linux-x64/ocrmypdf")),
        ocr_search_path: Vec::new(),
    }
}

#[test]
fn text_document_uses_text_layer() {
    let cfg = Config::default();
    let long = "a".repeat(300);
    let pages = mk_pages(&[&long, &long]);
    assert_eq!(decide(&cfg, &Capabilities::default(), &pages), TextDecision::UseText);
}

#[test]
fn zero_pages_without_ocr_is_insufficient() {
    let cfg = Config::default();
    let d = decide(&cfg, &Capabilities::default(), &[]);
    assert_eq!(
        d,
        TextDecision::Insufficient(Insufficient::OcrUnavailable { chars: 0 })
    );
}

#[test]
fn sparse_text_runs_ocr_when_available() {
    let cfg = Config::default();
    let pages = mk_pages(&["Page 1", "", "Scanned"]);
    assert_eq!(decide(&cfg, &with_ocr(), &pages), TextDecision::RunOcr);
}

#[test]
fn floor_is_inclusive_of_500_chars() {
    let cfg = Config::default();
    let exact = "x".repeat(500);
    assert_eq!(
        decide(&cfg, &Capabilities::default(), &mk_pages(&[&exact])),
        TextDecision::UseText
    );
    let short = "x".repeat(499);
    assert!(matches!(
        decide(&cfg, &Capabilities::default(), &mk_pages(&[&short])),
        TextDecision::Insufficient(_)
    ));
}

#[test]
fn low_ocr_yield_is_reported_distinctly() {
    let cfg = Config::default();
    let err = after_ocr(&cfg, &mk_pages(&["blurry"])).unwrap_err();
    assert!(matches!(
        err,
        Error::ExtractionInsufficient(Insufficient::OcrYieldTooLow { chars: 6 })
    ));
    assert!(err.to_string().contains("OCR ran but text yield was still insufficient"));

    let unavailable = Error::ExtractionInsufficient(Insufficient::OcrUnavailable { chars: 0 });
    assert!(unavailable.to_string().contains("no OCR toolchain is available"));
    assert!(unavailable.to_string().contains("online mode"));
}
