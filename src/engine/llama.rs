use super::{Inference, process::wait_with_ticks, types::InferenceParams};
use crate::{
    config::Config,
    error::{Error, IoContext, Result, WINDOWS_DLL_NOT_FOUND},
    platform::Platform,
    resources::ResourceDirectory,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};

/// Smooth time-based progress between two fixed percentages.
///
/// Token-level progress is not exposed by every build of the binary, so the
/// ramp approaches `end` asymptotically with time constant `tau`.
#[derive(Debug, Clone, Copy)]
pub struct Ramp {
    pub start: u8,
    pub end: u8,
    pub tau: Duration,
}

impl Ramp {
    pub fn from_config(cfg: &Config) -> Self {
        let start = cfg.inference.ramp_start_percent.min(99);
        Self {
            start,
            end: cfg.inference.ramp_end_percent.clamp(start, 99),
            tau: Duration::from_secs_f64(cfg.inference.ramp_seconds.max(0.001)),
        }
    }

    pub fn at(&self, elapsed: Duration) -> u8 {
        let frac = 1.0 - (-elapsed.as_secs_f64() / self.tau.as_secs_f64()).exp();
        let span = f64::from(self.end.saturating_sub(self.start));
        (f64::from(self.start) + span * frac)
            .floor()
            .min(f64::from(self.end.max(self.start))) as u8
    }
}

/// Runs a `llama-cli`-compatible binary as a subprocess.
#[derive(Debug, Clone)]
pub struct LlamaRunner {
    binary: PathBuf,
    model: PathBuf,
    params: InferenceParams,
    timeout: Option<Duration>,
    ramp: Ramp,
    keep_stderr: bool,
}

impl LlamaRunner {
    /// Resolve the binary and model from the resource directory, then the packaged fallback.
    pub fn new(cfg: &Config, dir: &ResourceDirectory, platform: Platform) -> Result<Self> {
        let binary_rel = ResourceDirectory::inference_binary_rel(cfg, platform);
        let binary = dir
            .locate(cfg, &binary_rel)
            .ok_or_else(|| Error::ConfigurationMissing {
                what: "inference binary",
                path: dir.root().join(&binary_rel),
            })?;
        let model_rel = ResourceDirectory::model_rel(cfg);
        let model = dir
            .locate(cfg, &model_rel)
            .ok_or_else(|| Error::ConfigurationMissing {
                what: "model file",
                path: dir.root().join(&model_rel),
            })?;
        info!("inference binary={} model={}", binary.display(), model.display());
        Ok(Self::with_paths(binary, model, cfg))
    }

    pub fn with_paths(binary: PathBuf, model: PathBuf, cfg: &Config) -> Self {
        let timeout = (cfg.inference.timeout_seconds > 0)
            .then(|| Duration::from_secs(cfg.inference.timeout_seconds));
        Self {
            binary,
            model,
            params: InferenceParams::from_config(cfg),
            timeout,
            ramp: Ramp::from_config(cfg),
            keep_stderr: cfg.debug.keep_subprocess_stderr,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn model(&self) -> &Path {
        &self.model
    }
}

impl Inference for LlamaRunner {
    fn run(&self, prompt: &str, on_percent: &mut dyn FnMut(u8)) -> Result<String> {
        // Prompts easily exceed OS argument-length limits; hand them over as a file.
        let mut prompt_file = tempfile::Builder::new()
            .prefix("sop-scout-prompt")
            .suffix(".txt")
            .tempfile()
            .io_context(|| "create prompt file")?;
        prompt_file
            .write_all(prompt.as_bytes())
            .io_context(|| "write prompt file")?;
        prompt_file.flush().io_context(|| "flush prompt file")?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(self.params.args(&self.model, prompt_file.path()));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        debug!(
            "spawning {} (prompt {} chars)",
            self.binary.display(),
            prompt.chars().count()
        );

        let mut child = cmd.spawn().map_err(|e| Error::InferenceFailed {
            code: None,
            message: format!("cannot start {}: {e}", self.binary.display()),
            stderr: String::new(),
        })?;

        let mut last = self.ramp.start;
        on_percent(last);
        let ramp = self.ramp;
        let finished = wait_with_ticks(&mut child, self.timeout, &mut |elapsed: Duration| {
            let p = ramp.at(elapsed);
            if p > last {
                last = p;
                on_percent(p);
            }
        })?;

        if self.keep_stderr && !finished.stderr.is_empty() {
            debug!("inference stderr: {}", finished.stderr_lossy());
        }
        if finished.timed_out {
            return Err(Error::InferenceFailed {
                code: None,
                message: format!(
                    "inference exceeded the configured timeout of {:?}",
                    self.timeout.unwrap_or_default()
                ),
                stderr: finished.stderr_lossy(),
            });
        }
        if !finished.status.success() {
            return Err(exit_failure(finished.status.code(), finished.stderr_lossy()));
        }

        info!("inference finished in {:.1}s", finished.elapsed.as_secs_f64());
        on_percent(100);
        Ok(String::from_utf8_lossy(&finished.stdout).into_owned())
    }
}

/// Map a non-zero exit of the inference binary to an `InferenceFailed` error.
pub fn exit_failure(code: Option<i32>, stderr: String) -> Error {
    let message = match code {
        Some(c) if c as u32 == WINDOWS_DLL_NOT_FOUND => format!(
            "inference binary could not load a required DLL (exit code 0x{WINDOWS_DLL_NOT_FOUND:08X}, \
             STATUS_DLL_NOT_FOUND); the resource bundle is incomplete, \
             reinstall it with `sop-scout install --force`"
        ),
        Some(c) => format!("inference binary exited with code {c}"),
        None => "inference binary was terminated by a signal".to_string(),
    };
    Error::InferenceFailed {
        code,
        message,
        stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_is_monotone_and_bounded() {
        let ramp = Ramp {
            start: 10,
            end: 90,
            tau: Duration::from_secs(10),
        };
        assert_eq!(ramp.at(Duration::ZERO), 10);
        let mut prev = 0;
        for s in 0..200 {
            let p = ramp.at(Duration::from_secs(s));
            assert!(p >= prev && p <= 90);
            prev = p;
        }
        assert!(ramp.at(Duration::from_secs(10)) > 50);
    }

    #[test]
    fn inverted_ramp_holds_at_start() {
        let ramp = Ramp {
            start: 90,
            end: 10,
            tau: Duration::from_secs(1),
        };
        assert_eq!(ramp.at(Duration::ZERO), 90);
        assert_eq!(ramp.at(Duration::from_secs(30)), 90);
    }

    #[test]
    fn ordinary_exit_codes_are_generic() {
        let err = exit_failure(Some(1), "boom".into());
        assert!(err.to_string().contains("exited with code 1"));
        assert!(err.to_string().contains("boom"));
    }
}
