use super::fetch::Fetcher;
use crate::{
    error::{Error, Result},
    platform::Platform,
    util::write_atomic,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCAL_MANIFEST_FILE: &str = ".resource-manifest.json";

/// Remote description of a pack and its independently versioned components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub version: String,
    #[serde(default)]
    pub components: ManifestComponents,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestComponents {
    #[serde(default)]
    pub common: Vec<Component>,
    #[serde(default)]
    pub platform: BTreeMap<String, Vec<Component>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    File,
    Zip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ResourceManifest {
    /// `common` followed by the entries for `platform`.
    pub fn components_for(&self, platform: Platform) -> Vec<&Component> {
        self.components
            .common
            .iter()
            .chain(
                self.components
                    .platform
                    .get(platform.key())
                    .into_iter()
                    .flatten(),
            )
            .collect()
    }
}

impl Component {
    /// Install target relative to the resource root: `path` for files, `extractTo` for zips.
    pub fn target(&self) -> Result<&str> {
        let target = match self.kind {
            ComponentKind::File => self.path.as_deref(),
            ComponentKind::Zip => self.extract_to.as_deref(),
        };
        target.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            Error::InvalidPackFormat(format!(
                "component '{}' has no {}",
                self.name,
                match self.kind {
                    ComponentKind::File => "path",
                    ComponentKind::Zip => "extractTo",
                }
            ))
        })
    }

    pub fn expected_sha256(&self) -> Option<String> {
        normalize_sha(self.sha256.as_deref())
    }
}

fn normalize_sha(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
}

/// What is physically installed, keyed by component name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledManifest {
    pub version: String,
    pub installed_at: String,
    #[serde(default)]
    pub components: BTreeMap<String, InstalledComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledComponent {
    pub name: String,
    pub url: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
}

impl InstalledComponent {
    pub fn from_component(c: &Component) -> Result<Self> {
        Ok(Self {
            name: c.name.clone(),
            url: c.url.clone(),
            path: c.target()?.to_string(),
            kind: c.kind,
            version: c.version.clone(),
            sha256: c.sha256.clone(),
        })
    }

    /// Same url, sha256 and version as the remote entry.
    pub fn matches(&self, remote: &Component) -> bool {
        self.url == remote.url
            && normalize_sha(self.sha256.as_deref()) == remote.expected_sha256()
            && self.version == remote.version
    }
}

pub fn local_manifest_path(base_dir: &Path) -> PathBuf {
    base_dir.join(LOCAL_MANIFEST_FILE)
}

/// Absent or unparsable manifests read as `None`.
pub fn read_local(base_dir: &Path) -> Option<InstalledManifest> {
    let path = local_manifest_path(base_dir);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!("no local manifest at {}: {err}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(m) => Some(m),
        Err(err) => {
            warn!("ignoring corrupt local manifest {}: {err}", path.display());
            None
        }
    }
}

/// Overwrite the local manifest atomically. Call only once every artifact it names is on disk.
pub fn write_local(base_dir: &Path, manifest: &InstalledManifest) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(manifest)
        .map_err(|e| Error::InvalidPackFormat(format!("serialize local manifest: {e}")))?;
    write_atomic(&local_manifest_path(base_dir), &bytes)
}

pub fn fetch_remote<F: Fetcher + ?Sized>(fetcher: &F, manifest_url: &str) -> Result<ResourceManifest> {
    let unavailable = |reason: String| Error::ManifestUnavailable {
        url: manifest_url.to_string(),
        reason,
    };
    let bytes = fetcher
        .get_bytes(manifest_url)
        .map_err(|e| unavailable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| unavailable(format!("parse: {e}")))
}
