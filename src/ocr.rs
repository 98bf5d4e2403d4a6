use crate::{
    config::Config,
    engine::process::wait_with_ticks,
    error::{Error, IoContext, Result},
    probe::Capabilities,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};

/// Turns an image-only PDF into one with a searchable text layer.
pub trait Ocr {
    fn make_searchable(&self, input: &Path, output: &Path) -> Result<()>;
}

/// OCRmyPDF-style entrypoint run as a subprocess.
#[derive(Debug, Clone)]
pub struct OcrMyPdf {
    entrypoint: Option<PathBuf>,
    search_path: Vec<PathBuf>,
    language: String,
    timeout: Option<Duration>,
}

impl OcrMyPdf {
    pub fn from_capabilities(cfg: &Config, caps: &Capabilities) -> Self {
        Self {
            entrypoint: caps.ocr_entrypoint.clone(),
            search_path: caps.ocr_search_path.clone(),
            language: cfg.ocr.language.clone(),
            timeout: (cfg.ocr.timeout_seconds > 0)
                .then(|| Duration::from_secs(cfg.ocr.timeout_seconds)),
        }
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "--skip-text".into(),
            "--output-type".into(),
            "pdf".into(),
            "-l".into(),
            self.language.as_str().into(),
            input.into(),
            output.into(),
        ]
    }

    /// `PATH` with the bundled engine and rasterizer directories in front.
    fn path_env(&self) -> Option<OsString> {
        let existing = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .search_path
            .iter()
            .cloned()
            .chain(std::env::split_paths(&existing));
        std::env::join_paths(dirs).ok()
    }
}

impl Ocr for OcrMyPdf {
    fn make_searchable(&self, input: &Path, output: &Path) -> Result<()> {
        let entrypoint = self
            .entrypoint
            .as_deref()
            .ok_or_else(|| Error::ConfigurationMissing {
                what: "OCR entrypoint",
                path: PathBuf::from("ocr/<platform>"),
            })?;

        let mut cmd = Command::new(entrypoint);
        cmd.args(self.args(input, output));
        if let Some(path) = self.path_env() {
            cmd.env("PATH", path);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        info!("running OCR on {}", input.display());
        let mut child = cmd
            .spawn()
            .io_context(|| format!("spawn OCR entrypoint {}", entrypoint.display()))?;
        let finished = wait_with_ticks(&mut child, self.timeout, &mut |_: Duration| {})?;
        debug!("OCR stderr: {}", finished.stderr_lossy());

        if finished.timed_out || !finished.status.success() {
            return Err(Error::io(
                format!("OCR of {}", input.display()),
                std::io::Error::other(format!(
                    "{} ({})",
                    if finished.timed_out {
                        "timed out".to_string()
                    } else {
                        format!("exit status {}", finished.status)
                    },
                    finished.stderr_lossy()
                )),
            ));
        }
        if !output.exists() {
            return Err(Error::io(
                format!("OCR of {}", input.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no output PDF was produced"),
            ));
        }
        Ok(())
    }
}
