use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;

/// Decoding parameters passed to the inference binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    pub ctx_size: usize,
    pub n_predict: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    /// 0 lets the binary choose.
    pub threads: u32,
}

impl InferenceParams {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            ctx_size: cfg.prompt.ctx_size,
            n_predict: cfg.prompt.predict_tokens,
            temperature: cfg.inference.temperature,
            top_p: cfg.inference.top_p,
            repeat_penalty: cfg.inference.repeat_penalty,
            threads: cfg.inference.threads,
        }
    }

    /// Command line for `llama-cli`-compatible binaries.
    pub fn args(&self, model: &Path, prompt_file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-m".into(),
            model.into(),
            "-f".into(),
            prompt_file.into(),
            "--ctx-size".into(),
            self.ctx_size.to_string().into(),
            "--n-predict".into(),
            self.n_predict.to_string().into(),
            "--temp".into(),
            self.temperature.to_string().into(),
            "--top-p".into(),
            self.top_p.to_string().into(),
            "--repeat-penalty".into(),
            self.repeat_penalty.to_string().into(),
            "--no-display-prompt".into(),
        ];
        if self.threads > 0 {
            args.push("--threads".into());
            args.push(self.threads.to_string().into());
        }
        args
    }
}
