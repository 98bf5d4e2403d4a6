use crate::{
    config::Config,
    error::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform key used in manifests and in the resource directory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "win-x64")]
    WinX64,
    #[serde(rename = "mac-arm64")]
    MacArm64,
    #[serde(rename = "mac-x64")]
    MacX64,
    #[serde(rename = "linux-x64")]
    LinuxX64,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::WinX64
        } else if cfg!(target_os = "macos") {
            if cfg!(target_arch = "aarch64") {
                Platform::MacArm64
            } else {
                Platform::MacX64
            }
        } else {
            Platform::LinuxX64
        }
    }

    /// `auto` (or empty) resolves to the running host.
    pub fn resolve(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" | "auto" => Some(Self::current()),
            other => Self::from_key(other),
        }
    }

    /// Platform selected by `resources.platform`.
    pub fn configured(cfg: &Config) -> Result<Self> {
        Self::resolve(&cfg.resources.platform).ok_or_else(|| {
            Error::InvalidInput(format!(
                "unknown resources.platform '{}' (expected auto, win-x64, mac-arm64, mac-x64 or linux-x64)",
                cfg.resources.platform
            ))
        })
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "win-x64" => Some(Platform::WinX64),
            "mac-arm64" => Some(Platform::MacArm64),
            "mac-x64" => Some(Platform::MacX64),
            "linux-x64" => Some(Platform::LinuxX64),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Platform::WinX64 => "win-x64",
            Platform::MacArm64 => "mac-arm64",
            Platform::MacX64 => "mac-x64",
            Platform::LinuxX64 => "linux-x64",
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Platform::WinX64)
    }

    /// Executable file name for `stem` on this platform.
    pub fn exe(self, stem: &str) -> String {
        if self.is_windows() && !stem.to_ascii_lowercase().ends_with(".exe") {
            format!("{stem}.exe")
        } else {
            stem.to_string()
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
