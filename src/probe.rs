use crate::{config::Config, platform::Platform, resources::ResourceDirectory};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub installed: bool,
    pub missing: Vec<PathBuf>,
    pub ocr_available: bool,
    pub installed_pack_version: Option<String>,
}

/// What the analysis pipeline may rely on, computed once per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub ocr_available: bool,
    pub ocr_entrypoint: Option<PathBuf>,
    /// Directories the OCR entrypoint needs on `PATH` (engine, rasterizer).
    pub ocr_search_path: Vec<PathBuf>,
}

/// Presence check of the writable resource directory only.
pub fn resource_status(cfg: &Config, dir: &ResourceDirectory, platform: Platform) -> ResourceStatus {
    let required = [
        ResourceDirectory::model_rel(cfg),
        ResourceDirectory::inference_binary_rel(cfg, platform),
    ];
    let missing: Vec<PathBuf> = required
        .iter()
        .map(|rel| dir.root().join(rel))
        .filter(|p| !p.exists())
        .collect();

    let ocr_available = [
        ResourceDirectory::ocr_entrypoint_rel(cfg, platform),
        ResourceDirectory::ocr_engine_rel(cfg, platform),
        ResourceDirectory::ocr_rasterizer_rel(cfg, platform),
    ]
    .iter()
    .all(|rel| dir.root().join(rel).exists());

    debug!(
        "resource status root={} missing={} ocr={}",
        dir.root().display(),
        missing.len(),
        ocr_available
    );

    ResourceStatus {
        installed: missing.is_empty(),
        missing,
        ocr_available,
        installed_pack_version: dir.installed_version().map(str::to_string),
    }
}

impl Capabilities {
    /// Probe the resource directory (and packaged fallback) for an OCR toolchain.
    pub fn probe(cfg: &Config, dir: &ResourceDirectory, platform: Platform) -> Self {
        let entrypoint = dir.locate(cfg, &ResourceDirectory::ocr_entrypoint_rel(cfg, platform));
        let engine = dir.locate(cfg, &ResourceDirectory::ocr_engine_rel(cfg, platform));
        let rasterizer = dir.locate(cfg, &ResourceDirectory::ocr_rasterizer_rel(cfg, platform));

        match (entrypoint, engine, rasterizer) {
            (Some(entrypoint), Some(engine), Some(rasterizer)) => {
                let ocr_search_path = [engine, rasterizer]
                    .iter()
                    .filter_map(|p| p.parent().map(PathBuf::from))
                    .collect();
                Self {
                    ocr_available: true,
                    ocr_entrypoint: Some(entrypoint),
                    ocr_search_path,
                }
            }
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &std::path::Path, rel: &std::path::Path) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, b"x").unwrap();
    }

    #[test]
    fn ocr_requires_engine_and_rasterizer() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let platform = Platform::LinuxX64;
        touch(tmp.path(), &ResourceDirectory::model_rel(&cfg));
        touch(tmp.path(), &ResourceDirectory::inference_binary_rel(&cfg, platform));
        touch(tmp.path(), &ResourceDirectory::ocr_entrypoint_rel(&cfg, platform));

        let dir = ResourceDirectory::open(tmp.path());
        let status = resource_status(&cfg, &dir, platform);
        assert!(status.installed);
        assert!(!status.ocr_available);
        assert!(!Capabilities::probe(&cfg, &dir, platform).ocr_available);

        touch(tmp.path(), &ResourceDirectory::ocr_engine_rel(&cfg, platform));
        touch(tmp.path(), &ResourceDirectory::ocr_rasterizer_rel(&cfg, platform));
        let caps = Capabilities::probe(&cfg, &dir, platform);
        assert!(caps.ocr_available);
        assert_eq!(caps.ocr_search_path.len(), 2);
    }

    #[test]
    fn empty_directory_reports_missing_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let dir = ResourceDirectory::open(tmp.path());
        let status = resource_status(&cfg, &dir, Platform::WinX64);
        assert!(!status.installed);
        assert_eq!(status.missing.len(), 2);
        assert!(status.missing[1].ends_with("llama-cli.exe"));
        assert_eq!(status.installed_pack_version, None);
    }
}
