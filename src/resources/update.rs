use super::{
    INFERENCE_DIR, OCR_DIR, ResourceDirectory, archive,
    fetch::Fetcher,
    install,
    manifest::{self, Component, ComponentKind, InstalledComponent, InstalledManifest},
};
use crate::{
    config::Config,
    error::{Error, IoContext, Result},
    platform::Platform,
    probe::{ResourceStatus, resource_status},
    progress::{UpdateProgress, UpdateStatus, scale},
    util::{ensure_dir, mark_executable_tree, now_rfc3339, safe_join, sha256_file},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Share of the overall percentage spent downloading; installing takes the rest.
const DOWNLOAD_SPAN: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateStrategy {
    /// Download only the listed components.
    Components,
    /// Reinstall the full pack.
    FullPack,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub installed_version: Option<String>,
    pub remote_version: Option<String>,
    pub update_available: bool,
    pub components_to_update: Vec<Component>,
    pub strategy: UpdateStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Components of `remote` (for `platform`) that are absent from `local` or differ in url/sha256/version.
pub fn stale_components<'a>(
    remote: &'a [&'a Component],
    local: Option<&InstalledManifest>,
) -> Vec<&'a Component> {
    remote
        .iter()
        .copied()
        .filter(|c| {
            local
                .and_then(|m| m.components.get(&c.name))
                .is_none_or(|installed| !installed.matches(c))
        })
        .collect()
}

pub fn check_for_update<F: Fetcher + ?Sized>(
    cfg: &Config,
    dir: &ResourceDirectory,
    fetcher: &F,
) -> Result<UpdateCheck> {
    let platform = Platform::configured(cfg)?;
    let installed_version = dir.installed_version().map(str::to_string);

    let remote = match manifest::fetch_remote(fetcher, &cfg.resources.manifest_url) {
        Ok(remote) => remote,
        Err(err @ Error::ManifestUnavailable { .. }) => {
            warn!("{err}; a full pack reinstall is required");
            return Ok(UpdateCheck {
                installed_version,
                remote_version: None,
                update_available: true,
                components_to_update: Vec::new(),
                strategy: UpdateStrategy::FullPack,
                reason: Some(err.to_string()),
            });
        }
        Err(err) => return Err(err),
    };

    let applicable = remote.components_for(platform);
    if applicable.is_empty() {
        // Without components only the pack version can be compared.
        let update_available = installed_version.as_deref() != Some(remote.version.as_str());
        let reason = update_available.then(|| {
            format!(
                "remote manifest {} lists no components for {platform}",
                remote.version
            )
        });
        return Ok(UpdateCheck {
            installed_version,
            remote_version: Some(remote.version),
            update_available,
            components_to_update: Vec::new(),
            strategy: UpdateStrategy::FullPack,
            reason,
        });
    }

    let stale: Vec<Component> = stale_components(&applicable, dir.manifest())
        .into_iter()
        .cloned()
        .collect();
    let version_differs = installed_version.as_deref() != Some(remote.version.as_str());

    debug!(
        "update check installed={:?} remote={} stale={}",
        installed_version,
        remote.version,
        stale.len()
    );

    Ok(UpdateCheck {
        installed_version,
        remote_version: Some(remote.version),
        update_available: version_differs || !stale.is_empty(),
        components_to_update: stale,
        strategy: UpdateStrategy::Components,
        reason: None,
    })
}

/// Bring the resource directory up to date with the remote manifest.
///
/// Every flagged component is downloaded and verified before anything is
/// installed, and the local manifest is committed last, so a failed update
/// leaves the previous manifest in place.
pub fn apply_update<F: Fetcher + ?Sized>(
    cfg: &Config,
    dir: &mut ResourceDirectory,
    fetcher: &F,
    on_progress: &mut dyn FnMut(UpdateProgress),
) -> Result<ResourceStatus> {
    let platform = Platform::configured(cfg)?;
    let check = check_for_update(cfg, dir, fetcher)?;

    let remote_version = check.remote_version.clone().unwrap_or_default();
    if !check.update_available {
        info!("resources are up to date (version {remote_version})");
        return Ok(resource_status(cfg, dir, platform));
    }

    if check.strategy == UpdateStrategy::FullPack {
        warn!(
            "falling back to full pack reinstall: {}",
            check.reason.as_deref().unwrap_or("no component manifest")
        );
        return install::install(cfg, dir, fetcher, true);
    }

    ensure_dir(dir.root())?;
    let pending = &check.components_to_update;
    let staged: Vec<&Component> = if pending.is_empty() {
        Vec::new()
    } else {
        info!("updating {} component(s) to {remote_version}", pending.len());
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(dir.root())
            .io_context(|| format!("create staging dir in {}", dir.root().display()))?;
        let staged = download_all(dir.root(), staging.path(), pending, fetcher, on_progress)?;
        install_all(&staged, on_progress)?;
        staged.into_iter().map(|s| s.component).collect()
    };

    let mut merged = dir.manifest().cloned().unwrap_or_else(|| InstalledManifest {
        version: remote_version.clone(),
        installed_at: now_rfc3339(),
        components: BTreeMap::new(),
    });
    for c in staged {
        merged
            .components
            .insert(c.name.clone(), InstalledComponent::from_component(c)?);
    }
    merged.version = remote_version;
    merged.installed_at = now_rfc3339();
    manifest::write_local(dir.root(), &merged)?;
    dir.reload();

    info!("resources updated to version {}", merged.version);
    Ok(resource_status(cfg, dir, platform))
}

struct Staged<'a> {
    component: &'a Component,
    download: PathBuf,
    dest: PathBuf,
}

fn download_all<'a, F: Fetcher + ?Sized>(
    root: &Path,
    staging: &Path,
    pending: &'a [Component],
    fetcher: &F,
    on_progress: &mut dyn FnMut(UpdateProgress),
) -> Result<Vec<Staged<'a>>> {
    let n = pending.len();
    let mut staged = Vec::with_capacity(n);

    for (i, c) in pending.iter().enumerate() {
        let target = c.target()?;
        let dest = safe_join(root, target).ok_or_else(|| {
            Error::InvalidPackFormat(format!(
                "component '{}' target escapes the resource directory: {target}",
                c.name
            ))
        })?;
        let download = staging.join(format!("{i:03}-{}", sanitize(&c.name)));

        let mut last = scale(0, DOWNLOAD_SPAN, i, n);
        on_progress(UpdateProgress {
            status: UpdateStatus::Downloading,
            component: c.name.clone(),
            percent: last,
        });
        fetcher.download_to(&c.url, &download, &mut |done: u64, total: Option<u64>| {
            let Some(total) = total.filter(|t| *t > 0) else {
                return;
            };
            let frac = (done as f64 / total as f64).min(1.0);
            let percent = ((i as f64 + frac) / n as f64 * DOWNLOAD_SPAN as f64).round() as u8;
            if percent != last {
                last = percent;
                on_progress(UpdateProgress {
                    status: UpdateStatus::Downloading,
                    component: c.name.clone(),
                    percent,
                });
            }
        })?;

        if let Some(expected) = c.expected_sha256() {
            let actual = sha256_file(&download)?;
            if actual != expected {
                return Err(Error::IntegrityCheckFailed {
                    component: c.name.clone(),
                    expected,
                    actual,
                });
            }
            debug!("verified {} sha256={actual}", c.name);
        } else {
            warn!("component '{}' has no sha256; installing unverified", c.name);
        }

        staged.push(Staged {
            component: c,
            download,
            dest,
        });
    }
    Ok(staged)
}

fn install_all(staged: &[Staged<'_>], on_progress: &mut dyn FnMut(UpdateProgress)) -> Result<()> {
    let n = staged.len();
    for (i, s) in staged.iter().enumerate() {
        let c = s.component;
        on_progress(UpdateProgress {
            status: UpdateStatus::Installing,
            component: c.name.clone(),
            percent: scale(DOWNLOAD_SPAN, 100, i, n),
        });
        match c.kind {
            ComponentKind::Zip => {
                archive::extract_zip(&s.download, &s.dest)?;
            }
            ComponentKind::File => {
                if let Some(parent) = s.dest.parent() {
                    ensure_dir(parent)?;
                }
                if s.dest.exists() {
                    std::fs::remove_file(&s.dest)
                        .io_context(|| format!("remove {}", s.dest.display()))?;
                }
                std::fs::rename(&s.download, &s.dest).io_context(|| {
                    format!("move {} -> {}", s.download.display(), s.dest.display())
                })?;
            }
        }
        if holds_binaries(c) {
            mark_executable_tree(&s.dest)?;
        }
        info!("installed component {} -> {}", c.name, s.dest.display());
    }
    if let Some(last) = staged.last() {
        on_progress(UpdateProgress {
            status: UpdateStatus::Installing,
            component: last.component.name.clone(),
            percent: 100,
        });
    }
    Ok(())
}

fn holds_binaries(c: &Component) -> bool {
    c.target().is_ok_and(|t| {
        let first = Path::new(t).components().next();
        first.is_some_and(|f| f.as_os_str() == INFERENCE_DIR || f.as_os_str() == OCR_DIR)
    })
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
