use super::{
    ResourceDirectory, archive,
    fetch::Fetcher,
    manifest::{self, InstalledComponent, InstalledManifest, ResourceManifest},
};
use crate::{
    config::Config,
    error::{Error, IoContext, Result},
    platform::Platform,
    probe::{ResourceStatus, resource_status},
    util::{copy_dir_all, mark_executable_tree, now_rfc3339, safe_join},
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Name of the optional manifest a full pack carries at its root.
pub const PACK_MANIFEST_FILE: &str = "manifest.json";

/// Install the full resource pack.
///
/// Returns immediately when the pack is already installed unless `force` is set.
/// The destination is replaced wholesale, and only after the downloaded archive
/// proved to contain the expected top-level directory.
pub fn install<F: Fetcher + ?Sized>(
    cfg: &Config,
    dir: &mut ResourceDirectory,
    fetcher: &F,
    force: bool,
) -> Result<ResourceStatus> {
    let platform = Platform::configured(cfg)?;
    let status = resource_status(cfg, dir, platform);
    if status.installed && !force {
        info!("resource pack already installed at {}", dir.root().display());
        return Ok(status);
    }

    let staging = tempfile::Builder::new()
        .prefix("sop-scout-pack")
        .tempdir()
        .io_context(|| "create pack staging dir")?;
    let archive_path = staging.path().join("pack.zip");
    let url = cfg.resources.pack_url.as_str();

    info!("downloading resource pack from {url}");
    let mut last_decile = None;
    let bytes = fetcher.download_to(url, &archive_path, &mut |done: u64, total: Option<u64>| {
        if let Some(total) = total.filter(|t| *t > 0) {
            let decile = done * 10 / total;
            if last_decile != Some(decile) {
                last_decile = Some(decile);
                debug!("pack download {}%", decile * 10);
            }
        }
    })?;
    info!("downloaded {bytes} bytes");

    let extracted = staging.path().join("extracted");
    archive::extract_zip(&archive_path, &extracted)?;

    let pack_root = extracted.join(&cfg.resources.pack_root);
    if !pack_root.is_dir() {
        return Err(Error::InvalidPackFormat(format!(
            "archive does not contain top-level '{}/' directory",
            cfg.resources.pack_root
        )));
    }
    let pack_manifest = read_pack_manifest(&pack_root)?;

    replace_tree(&pack_root, dir.root())?;
    mark_executable_tree(&dir.root().join(ResourceDirectory::inference_dir_rel(platform)))?;
    mark_executable_tree(&dir.root().join(ResourceDirectory::ocr_dir_rel(platform)))?;

    let installed = installed_from_pack(cfg, dir.root(), pack_manifest.as_ref(), platform)?;
    manifest::write_local(dir.root(), &installed)?;
    dir.reload();

    let status = resource_status(cfg, dir, platform);
    if !status.installed {
        warn!(
            "pack installed but required resources are missing: {:?}",
            status.missing
        );
    }
    info!(
        "installed resource pack version={} at {}",
        installed.version,
        dir.root().display()
    );
    Ok(status)
}

fn read_pack_manifest(pack_root: &Path) -> Result<Option<ResourceManifest>> {
    let path = pack_root.join(PACK_MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read(&path).io_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| Error::InvalidPackFormat(format!("pack {PACK_MANIFEST_FILE}: {e}")))
}

/// Remove `dest` and copy `src` into its place.
fn replace_tree(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest).io_context(|| format!("remove {}", dest.display()))?;
    }
    copy_dir_all(src, dest)
}

/// Records for the pack's components that are actually present under `root`.
fn installed_from_pack(
    cfg: &Config,
    root: &Path,
    pack_manifest: Option<&ResourceManifest>,
    platform: Platform,
) -> Result<InstalledManifest> {
    let Some(pack_manifest) = pack_manifest else {
        return Ok(InstalledManifest {
            version: cfg.resources.fallback_pack_version.clone(),
            installed_at: now_rfc3339(),
            components: BTreeMap::new(),
        });
    };

    let mut components = BTreeMap::new();
    for c in pack_manifest.components_for(platform) {
        let target = c.target()?;
        let on_disk = safe_join(root, target).is_some_and(|p| p.exists());
        if !on_disk {
            debug!("pack manifest lists '{}' but {target} is absent", c.name);
            continue;
        }
        components.insert(c.name.clone(), InstalledComponent::from_component(c)?);
    }
    Ok(InstalledManifest {
        version: pack_manifest.version.clone(),
        installed_at: now_rfc3339(),
        components,
    })
}
