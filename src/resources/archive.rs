use crate::{
    error::{Error, IoContext, Result},
    util::ensure_dir,
};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// Extract every entry of the zip at `archive` under `dest`, merging with what is there.
///
/// Entries whose names would escape `dest` are skipped. Returns the number of files written.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).io_context(|| format!("open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        Error::InvalidPackFormat(format!("{} is not a zip archive: {e}", archive.display()))
    })?;
    ensure_dir(dest)?;

    let mut files = 0;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::InvalidPackFormat(format!("zip entry {i}: {e}")))?;
        let outpath = match entry.enclosed_name() {
            Some(rel) => dest.join(rel),
            None => {
                warn!("skipping unsafe zip entry name: {}", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            ensure_dir(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            ensure_dir(parent)?;
        }
        let mut out =
            File::create(&outpath).io_context(|| format!("create {}", outpath.display()))?;
        std::io::copy(&mut entry, &mut out)
            .io_context(|| format!("extract {}", outpath.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode().filter(|m| m & 0o777 != 0) {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode & 0o7777))
                    .io_context(|| format!("chmod {}", outpath.display()))?;
            }
        }
        files += 1;
    }
    debug!("extracted {files} files from {} into {}", archive.display(), dest.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    #[test]
    fn merges_into_existing_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        {
            let mut w = zip::ZipWriter::new(File::create(&archive).unwrap());
            w.start_file("bin/tool", SimpleFileOptions::default()).unwrap();
            w.write_all(b"new").unwrap();
            w.finish().unwrap();
        }
        let dest = tmp.path().join("dest");
        std::fs::create_dir_all(dest.join("bin")).unwrap();
        std::fs::write(dest.join("bin/keep"), b"old").unwrap();

        assert_eq!(extract_zip(&archive, &dest).unwrap(), 1);
        assert_eq!(std::fs::read(dest.join("bin/tool")).unwrap(), b"new");
        assert_eq!(std::fs::read(dest.join("bin/keep")).unwrap(), b"old");
    }

    #[test]
    fn rejects_non_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        std::fs::write(&archive, b"plain text").unwrap();
        let err = extract_zip(&archive, &tmp.path().join("d")).unwrap_err();
        assert!(matches!(err, Error::InvalidPackFormat(_)));
    }
}
