//! Local resource pack: directory layout, manifests, installation and updates.
//!
//! Layout under the resource root:
//!
//! ```text
//! models/<model-file>
//! llama/<platform>/<inference-binary>
//! ocr/<platform>/<ocr-entrypoint>
//! ocr/<platform>/tesseract/<engine-binary>
//! ocr/<platform>/ghostscript/<rasterizer-binary>
//! .resource-manifest.json
//! ```
//!
//! Only the installer and updater mutate this tree. Callers serialize
//! install/update against analysis; nothing here takes a lock.

pub mod archive;
pub mod fetch;
pub mod install;
pub mod manifest;
pub mod update;

use crate::{config::Config, platform::Platform};
use manifest::InstalledManifest;
use std::path::{Path, PathBuf};

pub const MODELS_DIR: &str = "models";
pub const INFERENCE_DIR: &str = "llama";
pub const OCR_DIR: &str = "ocr";
pub const OCR_ENGINE_DIR: &str = "tesseract";
pub const OCR_RASTERIZER_DIR: &str = "ghostscript";

/// A resource root together with the manifest that describes it.
#[derive(Debug, Clone)]
pub struct ResourceDirectory {
    root: PathBuf,
    manifest: Option<InstalledManifest>,
}

impl ResourceDirectory {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let manifest = manifest::read_local(&root);
        Self { root, manifest }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::open(cfg.resource_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> Option<&InstalledManifest> {
        self.manifest.as_ref()
    }

    /// Re-read the local manifest after the tree changed on disk.
    pub fn reload(&mut self) {
        self.manifest = manifest::read_local(&self.root);
    }

    pub fn installed_version(&self) -> Option<&str> {
        self.manifest.as_ref().map(|m| m.version.as_str())
    }

    pub fn model_rel(cfg: &Config) -> PathBuf {
        Path::new(MODELS_DIR).join(&cfg.resources.model_file)
    }

    pub fn inference_binary_rel(cfg: &Config, platform: Platform) -> PathBuf {
        Path::new(INFERENCE_DIR)
            .join(platform.key())
            .join(platform.exe(&cfg.resources.inference_binary))
    }

    pub fn inference_dir_rel(platform: Platform) -> PathBuf {
        Path::new(INFERENCE_DIR).join(platform.key())
    }

    pub fn ocr_dir_rel(platform: Platform) -> PathBuf {
        Path::new(OCR_DIR).join(platform.key())
    }

    pub fn ocr_entrypoint_rel(cfg: &Config, platform: Platform) -> PathBuf {
        Self::ocr_dir_rel(platform).join(platform.exe(&cfg.resources.ocr_entrypoint))
    }

    pub fn ocr_engine_rel(cfg: &Config, platform: Platform) -> PathBuf {
        Self::ocr_dir_rel(platform)
            .join(OCR_ENGINE_DIR)
            .join(platform.exe(&cfg.resources.ocr_engine_binary))
    }

    pub fn ocr_rasterizer_rel(cfg: &Config, platform: Platform) -> PathBuf {
        Self::ocr_dir_rel(platform)
            .join(OCR_RASTERIZER_DIR)
            .join(platform.exe(&cfg.resources.ocr_rasterizer_binary))
    }

    /// First existing location of `rel`: this directory, then the packaged fallback.
    pub fn locate(&self, cfg: &Config, rel: &Path) -> Option<PathBuf> {
        let primary = self.root.join(rel);
        if primary.exists() {
            return Some(primary);
        }
        cfg.packaged_resources_dir()
            .map(|p| p.join(rel))
            .filter(|p| p.exists())
    }
}
