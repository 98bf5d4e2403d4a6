use crate::error::{IoContext, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).io_context(|| format!("create_dir_all {}", p.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f = File::open(path).io_context(|| format!("open {}", path.display()))?;
    let mut h = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = f
            .read(&mut buf)
            .io_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    Ok(format!("{:x}", h.finalize()))
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Write `bytes` to a sibling temp file, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .io_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .io_context(|| format!("write temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .io_context(|| format!("sync temp file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .io_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

/// Join a manifest/archive relative path under `base`, refusing absolute paths and `..`.
pub fn safe_join(base: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    let mut has_component = false;
    for component in rel.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => return None,
            Component::CurDir => {}
            Component::Normal(_) => has_component = true,
        }
    }
    has_component.then(|| base.join(rel))
}

pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;
    for entry in std::fs::read_dir(src).io_context(|| format!("read_dir {}", src.display()))? {
        let entry = entry.io_context(|| format!("read_dir entry in {}", src.display()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let ty = entry
            .file_type()
            .io_context(|| format!("file_type {}", from.display()))?;
        if ty.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)
                .io_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}

/// Mark `path` executable, recursing into directories. No-op off Unix.
pub fn mark_executable_tree(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.is_dir() {
            for entry in
                std::fs::read_dir(path).io_context(|| format!("read_dir {}", path.display()))?
            {
                let child = entry
                    .io_context(|| format!("read_dir entry in {}", path.display()))?
                    .path();
                mark_executable_tree(&child)?;
            }
        } else if path.is_file() {
            let mut perms = std::fs::metadata(path)
                .io_context(|| format!("metadata {}", path.display()))?
                .permissions();
            perms.set_mode(perms.mode() | 0o755);
            std::fs::set_permissions(path, perms)
                .io_context(|| format!("chmod {}", path.display()))?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// At most `max` characters of `s` on one line, for diagnostics.
pub fn snippet(s: &str, max: usize) -> String {
    let flat: String = s
        .trim()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(max + 1)
        .collect();
    if flat.chars().count() > max {
        let mut cut: String = flat.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_join_rejects_escapes() {
        let base = Path::new("/base");
        assert!(safe_join(base, "../etc/passwd").is_none());
        assert!(safe_join(base, "/abs").is_none());
        assert!(safe_join(base, "").is_none());
        assert_eq!(
            safe_join(base, "models/m.gguf"),
            Some(PathBuf::from("/base/models/m.gguf"))
        );
    }

    #[test]
    fn snippet_caps_length() {
        assert_eq!(snippet("abc", 10), "abc");
        assert_eq!(snippet("abcdef", 3), "ab…");
        assert_eq!(snippet(" a\nb ", 10), "a b");
    }
}
