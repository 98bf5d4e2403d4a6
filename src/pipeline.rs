use crate::{
    config::Config,
    engine::Inference,
    error::{Error, IoContext, Result},
    extract::{self, ExtractOptions, Page},
    ocr::Ocr,
    policy::{self, TextDecision},
    probe::Capabilities,
    progress::{ProgressEvent, ProgressSink, scale},
    prompt::build_prompt,
    report::{AnalysisReport, FileOutcome},
    response,
    util::ensure_dir,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

const EXTRACT_END: u8 = 20;
const OCR_START: u8 = 20;
const OCR_END: u8 = 35;
const PROMPT: u8 = 40;
const MODEL_END: u8 = 90;
const PARSING: u8 = 95;

/// Turns SOP PDFs into automation reports with a local model.
pub struct Analyzer<I: Inference, O: Ocr> {
    cfg: Config,
    capabilities: Capabilities,
    inference: I,
    ocr: O,
}

/// Forwards events and remembers the last percentage for error reporting.
struct Tracker<'a> {
    sink: &'a mut dyn ProgressSink,
    last: u8,
}

impl Tracker<'_> {
    fn emit(&mut self, event: ProgressEvent) {
        self.last = event.percent();
        self.sink.emit(event);
    }
}

impl<I: Inference, O: Ocr> Analyzer<I, O> {
    pub fn new(cfg: &Config, capabilities: Capabilities, inference: I, ocr: O) -> Self {
        Self {
            cfg: cfg.clone(),
            capabilities,
            inference,
            ocr,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Analyze one document. On failure an `error` event is emitted before returning.
    pub fn analyze(&self, path: &Path, sink: &mut dyn ProgressSink) -> Result<AnalysisReport> {
        let mut tracker = Tracker { sink, last: 0 };
        match self.run(path, &mut tracker) {
            Ok(report) => Ok(report),
            Err(err) => {
                let percent = tracker.last;
                tracker.emit(ProgressEvent::Error {
                    percent,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Analyze each path in order; one failure does not stop the rest.
    pub fn analyze_batch(&self, paths: &[PathBuf], sink: &mut dyn ProgressSink) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, paths.len(), path.display());
            let file = path.display().to_string();
            let outcome = match self.analyze(path, sink) {
                Ok(report) => FileOutcome {
                    file,
                    ok: true,
                    report: Some(report),
                    error: None,
                    error_kind: None,
                },
                Err(err) => {
                    warn!("{}: {err}", path.display());
                    FileOutcome {
                        file,
                        ok: false,
                        report: None,
                        error: Some(err.to_string()),
                        error_kind: Some(err.kind().to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    fn run(&self, path: &Path, tracker: &mut Tracker<'_>) -> Result<AnalysisReport> {
        let started = Instant::now();
        let file_bytes = validate_input(&self.cfg, path)?;
        info!("analyzing {} ({} bytes)", path.display(), file_bytes);

        let mut pages = self.extract(path, tracker, 0, EXTRACT_END)?;
        self.check_page_limit(&pages)?;

        match policy::decide(&self.cfg, &self.capabilities, &pages) {
            TextDecision::UseText => {}
            TextDecision::Insufficient(why) => return Err(Error::ExtractionInsufficient(why)),
            TextDecision::RunOcr => {
                info!(
                    "text layer has {} chars; running OCR",
                    extract::total_chars(&pages)
                );
                pages = self.ocr_and_extract(path, tracker)?;
                policy::after_ocr(&self.cfg, &pages)?;
            }
        }

        let prompt = build_prompt(
            &pages,
            self.cfg.prompt.ctx_size,
            self.cfg.prompt.predict_tokens,
            self.cfg.prompt.safety_margin_tokens,
        );
        if prompt.truncated {
            warn!(
                "document exceeds the prompt budget of {} chars; middle section truncated",
                prompt.char_budget
            );
        }
        tracker.emit(ProgressEvent::Prompt {
            percent: PROMPT,
            prompt_chars: prompt.text.chars().count(),
            truncated: prompt.truncated,
        });

        let raw = self.inference.run(&prompt.text, &mut |p: u8| {
            tracker.emit(ProgressEvent::Model {
                percent: scale(PROMPT, MODEL_END, usize::from(p.min(100)), 100),
            })
        })?;
        if self.cfg.debug.dump_raw_output {
            self.dump_raw(path, &raw);
        }

        tracker.emit(ProgressEvent::Parsing { percent: PARSING });
        let report = response::parse_report(&raw, pages.len() as u32)?;

        tracker.emit(ProgressEvent::Done { percent: 100 });
        info!(
            "analyzed {} in {:.1}s: {} opportunities",
            path.display(),
            started.elapsed().as_secs_f64(),
            report.detailed_analysis.automation_opportunities.len()
        );
        Ok(report)
    }

    fn extract(&self, path: &Path, tracker: &mut Tracker<'_>, from: u8, to: u8) -> Result<Vec<Page>> {
        let opts = ExtractOptions {
            normalize_unicode: self.cfg.extraction.normalize_unicode,
        };
        extract::extract(path, opts, &mut |page: u32, total: u32| {
            tracker.emit(ProgressEvent::Extracting {
                percent: scale(from, to, page as usize, total as usize),
                page: page as usize,
                total_pages: total as usize,
            })
        })
    }

    fn check_page_limit(&self, pages: &[Page]) -> Result<()> {
        let max = self.cfg.limits.max_input_pages as usize;
        if max > 0 && pages.len() > max {
            return Err(Error::InvalidInput(format!(
                "document has {} pages; the limit is {max}",
                pages.len()
            )));
        }
        Ok(())
    }

    /// OCR a temporary copy of the input and extract the result.
    fn ocr_and_extract(&self, path: &Path, tracker: &mut Tracker<'_>) -> Result<Vec<Page>> {
        tracker.emit(ProgressEvent::Ocr { percent: OCR_START });
        let scratch = tempfile::Builder::new()
            .prefix("sop-scout-ocr")
            .tempdir()
            .io_context(|| "create OCR scratch directory")?;
        let input = scratch.path().join("input.pdf");
        let output = scratch.path().join("searchable.pdf");
        std::fs::copy(path, &input).io_context(|| format!("copy {} for OCR", path.display()))?;

        self.ocr.make_searchable(&input, &output)?;
        tracker.emit(ProgressEvent::Ocr { percent: OCR_END });

        let pages = self.extract(&output, tracker, OCR_END, PROMPT)?;
        self.check_page_limit(&pages)?;
        Ok(pages)
    }

    fn dump_raw(&self, path: &Path, raw: &str) {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let dir = Path::new(&self.cfg.paths.work_dir);
        let target = dir.join(format!("{stem}.raw.txt"));
        let written = ensure_dir(dir).map_err(|e| e.to_string()).and_then(|_| {
            std::fs::write(&target, raw).map_err(|e| e.to_string())
        });
        match written {
            Ok(()) => info!("raw model output written to {}", target.display()),
            Err(e) => warn!("could not write raw model output to {}: {e}", target.display()),
        }
    }
}

/// Reject inputs that are not local PDF files within the configured limits.
///
/// Returns the file size in bytes.
pub fn validate_input(cfg: &Config, input: &Path) -> Result<u64> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(Error::InvalidInput(format!("URL inputs are disabled: {input_str}")));
    }

    if !input.is_file() {
        return Err(Error::InvalidInput(format!(
            "input does not exist: {input_str}"
        )));
    }

    match input.extension().and_then(|s| s.to_str()) {
        Some(ext) if !ext.eq_ignore_ascii_case("pdf") => {
            return Err(Error::InvalidInput(format!("input is not a PDF: {input_str}")));
        }
        Some(_) => {}
        None => warn!("input has no extension; assuming PDF: {input_str}"),
    }

    let bytes = std::fs::metadata(input)
        .io_context(|| format!("stat {input_str}"))?
        .len();
    let max = cfg.limits.max_input_file_bytes;
    if max > 0 && bytes > max {
        return Err(Error::InvalidInput(format!(
            "input is {bytes} bytes; the limit is {max}: {input_str}"
        )));
    }
    Ok(bytes)
}

pub fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
