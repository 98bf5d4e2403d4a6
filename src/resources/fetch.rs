use crate::{
    config::Config,
    error::{Error, IoContext, Result},
};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Byte-level download callback: `(bytes_so_far, total_if_known)`.
pub type ByteProgress<'a> = dyn FnMut(u64, Option<u64>) + 'a;

/// Network access used by the installer and updater.
pub trait Fetcher {
    /// GET a small document (the manifest) into memory.
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    fn download_to(&self, url: &str, dest: &Path, on_bytes: &mut ByteProgress<'_>) -> Result<u64>;
}

pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(cfg: &Config) -> Self {
        let mut builder = ureq::Agent::config_builder()
            .max_redirects(cfg.download.max_redirects)
            .timeout_connect(Some(Duration::from_secs(
                cfg.download.connect_timeout_seconds,
            )));
        if cfg.download.timeout_seconds > 0 {
            builder = builder.timeout_global(Some(Duration::from_secs(cfg.download.timeout_seconds)));
        }
        let agent: ureq::Agent = builder.build().into();
        Self { agent }
    }
}

impl Fetcher for HttpFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {url}");
        let mut resp = self
            .agent
            .get(url)
            .call()
            .map_err(|e| Error::download(url, e))?;
        resp.body_mut()
            .read_to_vec()
            .map_err(|e| Error::download(url, e))
    }

    fn download_to(&self, url: &str, dest: &Path, on_bytes: &mut ByteProgress<'_>) -> Result<u64> {
        debug!("GET {url} -> {}", dest.display());
        let mut resp = self
            .agent
            .get(url)
            .call()
            .map_err(|e| Error::download(url, e))?;
        let total = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let mut reader = resp.body_mut().as_reader();
        let mut file = File::create(dest).io_context(|| format!("create {}", dest.display()))?;
        let mut buf = vec![0u8; 64 * 1024];
        let mut written = 0u64;
        loop {
            let n = reader.read(&mut buf).map_err(|e| Error::download(url, e))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .io_context(|| format!("write {}", dest.display()))?;
            written += n as u64;
            on_bytes(written, total);
        }
        file.flush()
            .io_context(|| format!("flush {}", dest.display()))?;
        Ok(written)
    }
}
