use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Windows `STATUS_DLL_NOT_FOUND`, as reported through a process exit code.
pub const WINDOWS_DLL_NOT_FOUND: u32 = 0xC000_0135;

#[derive(Debug, Error)]
pub enum Error {
    #[error("resource manifest unavailable at {url}: {reason}")]
    ManifestUnavailable { url: String, reason: String },

    #[error("download failed: GET {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("integrity check failed for component '{component}': expected sha256 {expected}, got {actual}")]
    IntegrityCheckFailed {
        component: String,
        expected: String,
        actual: String,
    },

    #[error("invalid resource pack: {0}")]
    InvalidPackFormat(String),

    #[error("{what} not found at {}; install the offline resource pack (sop-scout install)", .path.display())]
    ConfigurationMissing { what: &'static str, path: PathBuf },

    #[error("local inference failed: {message}{}", stderr_suffix(.stderr))]
    InferenceFailed {
        code: Option<i32>,
        message: String,
        stderr: String,
    },

    #[error("{0}")]
    ExtractionInsufficient(Insufficient),

    #[error("model output is not a valid report: {reason} (near: {snippet:?})")]
    InvalidModelOutput { reason: String, snippet: String },

    #[error("cannot read document {}: {reason}", .path.display())]
    DocumentUnreadable { path: PathBuf, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a document did not yield enough text to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insufficient {
    OcrUnavailable { chars: usize },
    OcrYieldTooLow { chars: usize },
}

impl std::fmt::Display for Insufficient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Insufficient::OcrUnavailable { chars } => write!(
                f,
                "document looks image-only ({chars} characters of text) and no OCR toolchain is available; \
                 install the OCR components of the resource pack, run an external OCR tool, or switch to online mode"
            ),
            Insufficient::OcrYieldTooLow { chars } => write!(
                f,
                "OCR ran but text yield was still insufficient ({chars} characters); \
                 the scan may be too low quality, try a cleaner copy or online mode"
            ),
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\nstderr: {trimmed}")
    }
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn download(url: &str, reason: impl std::fmt::Display) -> Self {
        Error::DownloadFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly label used in batch outcomes and progress events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ManifestUnavailable { .. } => "manifest_unavailable",
            Error::DownloadFailed { .. } => "download_failed",
            Error::IntegrityCheckFailed { .. } => "integrity_check_failed",
            Error::InvalidPackFormat(_) => "invalid_pack_format",
            Error::ConfigurationMissing { .. } => "configuration_missing",
            Error::InferenceFailed { .. } => "inference_failed",
            Error::ExtractionInsufficient(_) => "extraction_insufficient",
            Error::InvalidModelOutput { .. } => "invalid_model_output",
            Error::DocumentUnreadable { .. } => "document_unreadable",
            Error::InvalidInput(_) => "invalid_input",
            Error::Io { .. } => "io",
        }
    }
}

/// Extension for attaching a human context to `std::io::Result`.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::io(f(), e))
    }
}
