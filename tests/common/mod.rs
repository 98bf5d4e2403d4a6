#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use sop_scout::{
    config::Config,
    engine::Inference,
    error::{Error, Result},
    ocr::Ocr,
    resources::fetch::{ByteProgress, Fetcher},
    util::sha256_hex,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;

pub const MANIFEST_URL: &str = "https://mirror.test/manifest.json";
pub const PACK_URL: &str = "https://mirror.test/offline-pack.zip";

/// Config pointing at `resource_dir` with a fixed platform and test URLs.
pub fn test_config(resource_dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.paths.resource_dir = resource_dir.display().to_string();
    cfg.resources.manifest_url = MANIFEST_URL.to_string();
    cfg.resources.pack_url = PACK_URL.to_string();
    cfg.resources.platform = "linux-x64".to_string();
    cfg
}

/// In-memory `Fetcher` that records every download.
#[derive(Default)]
pub struct MapFetcher {
    files: RefCell<HashMap<String, Vec<u8>>>,
    downloads: RefCell<Vec<String>>,
}

impl MapFetcher {
    pub fn put(&self, url: &str, bytes: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(url.to_string(), bytes.into());
    }

    pub fn remove(&self, url: &str) {
        self.files.borrow_mut().remove(url);
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }

    pub fn clear_downloads(&self) {
        self.downloads.borrow_mut().clear();
    }

    fn lookup(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::DownloadFailed {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

impl Fetcher for MapFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.lookup(url)
    }

    fn download_to(&self, url: &str, dest: &Path, on_bytes: &mut ByteProgress<'_>) -> Result<u64> {
        let bytes = self.lookup(url)?;
        self.downloads.borrow_mut().push(url.to_string());
        std::fs::write(dest, &bytes).map_err(|e| Error::Io {
            context: format!("write {}", dest.display()),
            source: e,
        })?;
        let len = bytes.len() as u64;
        on_bytes(len / 2, Some(len));
        on_bytes(len, Some(len));
        Ok(len)
    }
}

/// Inference double that returns canned output and keeps the prompts it saw.
pub struct ScriptedInference {
    output: Result<String, (Option<i32>, String)>,
    pub prompts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedInference {
    pub fn replying(output: impl Into<String>) -> Self {
        Self {
            output: Ok(output.into()),
            prompts: Rc::default(),
        }
    }

    pub fn failing(code: Option<i32>, stderr: &str) -> Self {
        Self {
            output: Err((code, stderr.to_string())),
            prompts: Rc::default(),
        }
    }
}

impl Inference for ScriptedInference {
    fn run(&self, prompt: &str, on_percent: &mut dyn FnMut(u8)) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        on_percent(10);
        on_percent(55);
        match &self.output {
            Ok(out) => {
                on_percent(100);
                Ok(out.clone())
            }
            Err((code, stderr)) => Err(sop_scout::engine::llama::exit_failure(
                *code,
                stderr.clone(),
            )),
        }
    }
}

/// OCR double that counts calls and copies the input through unchanged.
#[derive(Default)]
pub struct PassthroughOcr {
    pub calls: RefCell<usize>,
}

impl Ocr for PassthroughOcr {
    fn make_searchable(&self, input: &Path, output: &Path) -> Result<()> {
        *self.calls.borrow_mut() += 1;
        std::fs::copy(input, output).map_err(|e| Error::Io {
            context: "copy".to_string(),
            source: e,
        })?;
        Ok(())
    }
}

/// OCR double that must never be reached.
pub struct NoOcr;

impl Ocr for NoOcr {
    fn make_searchable(&self, _input: &Path, _output: &Path) -> Result<()> {
        panic!("OCR must not run for this document");
    }
}

/// Write a PDF with one text line per page.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![40.into(), 780.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save pdf");
}

/// Zip archive with the given `(name, bytes, unix_mode)` entries.
pub fn zip_bytes(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes, mode) in entries {
        let opts = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
        writer.start_file(*name, opts).expect("start zip entry");
        writer.write_all(bytes).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

pub fn sha(bytes: &[u8]) -> String {
    sha256_hex(bytes)
}

/// A well-formed report whose single opportunity cites `page`.
pub fn report_json(page: i64) -> String {
    serde_json::json!({
        "executiveSummary": {
            "processName": "Invoice approval",
            "totalSteps": 6,
            "automatableSteps": 4,
            "automationPotentialPercent": 66.7,
            "estimatedTimeSavings": "5 hours/week",
            "overallComplexity": "Medium",
            "summary": "Most of the matching work is rule based."
        },
        "detailedAnalysis": {
            "currentState": {
                "manualSteps": 6,
                "decisionPoints": 2,
                "systemsInvolved": ["ERP", "Email"],
                "painPoints": ["Manual three-way match"]
            },
            "automationOpportunities": [{
                "title": "Automated three-way match",
                "description": "Match invoice, PO and receipt automatically.",
                "sopReference": { "stepIdentifier": "Step 3", "pageNumber": page },
                "automationType": "RPA",
                "complexity": "Medium",
                "estimatedRoi": "High",
                "estimatedTimeSavings": "3 hours/week"
            }],
            "implementationRoadmap": [{
                "phase": "Phase 1",
                "timeline": "4 weeks",
                "opportunities": ["Automated three-way match"]
            }],
            "technicalRequirements": {
                "systems": ["ERP"],
                "integrations": ["ERP API"],
                "skills": ["RPA development"]
            }
        }
    })
    .to_string()
}
