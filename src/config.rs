use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub download: Download,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub extraction: Extraction,
    #[serde(default)]
    pub prompt: Prompt,
    #[serde(default)]
    pub inference: Inference,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Resource directory, defaulting to the per-user data dir.
    pub fn resource_dir(&self) -> PathBuf {
        if !self.paths.resource_dir.is_empty() {
            return PathBuf::from(&self.paths.resource_dir);
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sop-scout")
            .join("resources")
    }

    pub fn packaged_resources_dir(&self) -> Option<PathBuf> {
        if self.paths.packaged_resources_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.paths.packaged_resources_dir))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Writable resource directory; empty means `<data_dir>/sop-scout/resources`.
    pub resource_dir: String,
    /// Read-only resources shipped next to the application, checked second.
    pub packaged_resources_dir: String,
    pub work_dir: String,
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            resource_dir: "".into(),
            packaged_resources_dir: "".into(),
            work_dir: ".sop-scout-work".into(),
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub manifest_url: String,
    pub pack_url: String,
    /// Top-level directory every full pack archive must contain.
    pub pack_root: String,
    /// Version recorded when a pack carries no manifest of its own.
    pub fallback_pack_version: String,
    /// `auto` or an explicit platform key such as `win-x64`.
    pub platform: String,
    pub model_file: String,
    pub inference_binary: String,
    pub ocr_entrypoint: String,
    pub ocr_engine_binary: String,
    pub ocr_rasterizer_binary: String,
}
impl Default for Resources {
    fn default() -> Self {
        Self {
            manifest_url: "https://example.com/sop-scout/offline/manifest.json".into(),
            pack_url: "https://example.com/sop-scout/offline/offline-pack.zip".into(),
            pack_root: "offline-pack".into(),
            fallback_pack_version: "legacy".into(),
            platform: "auto".into(),
            model_file: "qwen2.5-3b-instruct-q4_k_m.gguf".into(),
            inference_binary: "llama-cli".into(),
            ocr_entrypoint: "ocrmypdf".into(),
            ocr_engine_binary: "tesseract".into(),
            ocr_rasterizer_binary: "gs".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Download {
    pub max_redirects: u32,
    pub connect_timeout_seconds: u64,
    /// Whole-request ceiling; 0 disables it.
    pub timeout_seconds: u64,
}
impl Default for Download {
    fn default() -> Self {
        Self {
            max_redirects: 5,
            connect_timeout_seconds: 30,
            timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    pub max_input_pages: u32,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 512 * 1024 * 1024,
            max_input_pages: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Extraction {
    /// Below this many characters in total the document is treated as image-only.
    pub min_total_chars: usize,
    pub normalize_unicode: bool,
}
impl Default for Extraction {
    fn default() -> Self {
        Self {
            min_total_chars: 500,
            normalize_unicode: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompt {
    pub ctx_size: usize,
    pub predict_tokens: usize,
    pub safety_margin_tokens: usize,
}
impl Default for Prompt {
    fn default() -> Self {
        Self {
            ctx_size: 8192,
            predict_tokens: 2048,
            safety_margin_tokens: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Inference {
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub threads: u32,
    /// Wall-clock ceiling for one inference run; 0 disables it.
    pub timeout_seconds: u64,
    pub ramp_start_percent: u8,
    pub ramp_end_percent: u8,
    /// Time constant of the synthetic progress ramp.
    pub ramp_seconds: f64,
}
impl Default for Inference {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            repeat_penalty: 1.1,
            threads: 0,
            timeout_seconds: 0,
            ramp_start_percent: 10,
            ramp_end_percent: 90,
            ramp_seconds: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ocr {
    pub language: String,
    pub timeout_seconds: u64,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            language: "eng".into(),
            timeout_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_subprocess_stderr: bool,
    /// Write raw model output to `<work_dir>/<stem>.raw.txt`.
    pub dump_raw_output: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_subprocess_stderr: true,
            dump_raw_output: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub reject_url_inputs: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
        }
    }
}
