mod common;

use common::{MapFetcher, PACK_URL, sha, test_config, zip_bytes};
use serde_json::json;
use sop_scout::{
    error::Error,
    resources::{ResourceDirectory, install::install, manifest::read_local},
};

const MODEL: &[u8] = b"weights";
const LLAMA: &[u8] = b"#!/bin/sh\necho llama\n";

fn pack_with_manifest() -> Vec<u8> {
    let manifest = json!({
        "version": "2024.06",
        "components": {
            "common": [{
                "name": "model",
                "type": "file",
                "url": "https://mirror.test/model.gguf",
                "path": "models/qwen2.5-3b-instruct-q4_k_m.gguf",
                "sha256": sha(MODEL),
            }],
            "platform": {
                "linux-x64": [
                    {
                        "name": "llama-linux-x64",
                        "type": "zip",
                        "url": "https://mirror.test/llama-linux.zip",
                        "extractTo": "llama/linux-x64",
                    },
                    {
                        "name": "ocr-linux-x64",
                        "type": "zip",
                        "url": "https://mirror.test/ocr-linux.zip",
                        "extractTo": "ocr/linux-x64",
                    }
                ]
            }
        }
    })
    .to_string();
    zip_bytes(&[
        ("offline-pack/manifest.json", manifest.as_bytes(), 0o644),
        ("offline-pack/models/qwen2.5-3b-instruct-q4_k_m.gguf", MODEL, 0o644),
        ("offline-pack/llama/linux-x64/llama-cli", LLAMA, 0o644),
    ])
}

#[test]
fn install_is_idempotent_unless_forced() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("resources");
    let cfg = test_config(&root);
    let fetcher = MapFetcher::default();
    fetcher.put(PACK_URL, pack_with_manifest());

    let mut dir = ResourceDirectory::open(&root);
    let status = install(&cfg, &mut dir, &fetcher, false).unwrap();
    assert!(status.installed, "missing: {:?}", status.missing);
    assert!(!status.ocr_available);
    assert_eq!(status.installed_pack_version.as_deref(), Some("2024.06"));
    assert_eq!(fetcher.downloads().len(), 1);

    install(&cfg, &mut dir, &fetcher, false).unwrap();
    assert_eq!(fetcher.downloads().len(), 1);

    install(&cfg, &mut dir, &fetcher, true).unwrap();
    assert_eq!(fetcher.downloads().len(), 2);
}

#[test]
fn only_components_present_on_disk_are_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("resources");
    let cfg = test_config(&root);
    let fetcher = MapFetcher::default();
    fetcher.put(PACK_URL, pack_with_manifest());

    let mut dir = ResourceDirectory::open(&root);
    install(&cfg, &mut dir, &fetcher, false).unwrap();

    let local = read_local(&root).expect("local manifest");
    let names: Vec<&str> = local.components.keys().map(String::as_str).collect();
    assert_eq!(names, ["llama-linux-x64", "model"]);
}

#[test]
fn pack_without_manifest_records_fallback_version() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("resources");
    let cfg = test_config(&root);
    let fetcher = MapFetcher::default();
    fetcher.put(
        PACK_URL,
        zip_bytes(&[
            ("offline-pack/models/qwen2.5-3b-instruct-q4_k_m.gguf", MODEL, 0o644),
            ("offline-pack/llama/linux-x64/llama-cli", LLAMA, 0o644),
        ]),
    );

    let mut dir = ResourceDirectory::open(&root);
    install(&cfg, &mut dir, &fetcher, false).unwrap();
    let local = read_local(&root).unwrap();
    assert_eq!(local.version, "legacy");
    assert!(local.components.is_empty());
}

#[test]
fn pack_without_root_directory_is_rejected_and_destination_kept() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("resources");
    std::fs::create_dir_all(root.join("models")).unwrap();
    std::fs::write(root.join("models/keep.txt"), "keep").unwrap();

    let cfg = test_config(&root);
    let fetcher = MapFetcher::default();
    fetcher.put(PACK_URL, zip_bytes(&[("models/m.gguf", MODEL, 0o644)]));

    let mut dir = ResourceDirectory::open(&root);
    let err = install(&cfg, &mut dir, &fetcher, true).unwrap_err();
    assert!(matches!(err, Error::InvalidPackFormat(_)), "{err}");
    assert_eq!(std::fs::read_to_string(root.join("models/keep.txt")).unwrap(), "keep");
}

#[test]
fn non_zip_download_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("resources");
    let cfg = test_config(&root);
    let fetcher = MapFetcher::default();
    fetcher.put(PACK_URL, b"<html>captive portal</html>".as_slice());

    let mut dir = ResourceDirectory::open(&root);
    let err = install(&cfg, &mut dir, &fetcher, false).unwrap_err();
    assert!(matches!(err, Error::InvalidPackFormat(_)));
    assert!(!root.exists());
}

#[test]
fn missing_pack_is_a_download_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(&tmp.path().join("resources"));
    let mut dir = ResourceDirectory::from_config(&cfg);
    let err = install(&cfg, &mut dir, &MapFetcher::default(), false).unwrap_err();
    assert!(matches!(err, Error::DownloadFailed { .. }));
}

#[cfg(unix)]
#[test]
fn binaries_are_marked_executable() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("resources");
    let cfg = test_config(&root);
    let fetcher = MapFetcher::default();
    fetcher.put(PACK_URL, pack_with_manifest());

    let mut dir = ResourceDirectory::open(&root);
    install(&cfg, &mut dir, &fetcher, false).unwrap();
    let mode = std::fs::metadata(root.join("llama/linux-x64/llama-cli"))
        .unwrap()
        .permissions()
        .mode();
    assert_ne!(mode & 0o111, 0);
}
