use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquire::AcquireOptions;

/// Repository fetching limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Wall-clock budget for one clone, in seconds.
    pub timeout_secs: u64,
    /// Repositories with more eligible files than this are rejected up front.
    pub max_files: usize,
    /// Executable used for cloning.
    pub git_program: PathBuf,
    /// Where temp checkouts go; the system temp dir when unset.
    pub work_dir: Option<PathBuf>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 90,
            max_files: 30_000,
            git_program: PathBuf::from("git"),
            work_dir: None,
        }
    }
}

/// Which files count as source, and which directories are never walked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub extension: String,
    /// Directory *names*, compared against path components.
    pub exclude_dir_names: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            exclude_dir_names: vec![".git".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache_dir: PathBuf,
    /// Short name resolved through `language::lookup`.
    pub language_reference: String,
    /// Worker threads for per-file tokenizing; 0 means one per core.
    pub threads: usize,
    pub acquisition: AcquisitionConfig,
    pub scan: ScanConfig,
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".analytics_cache"),
            language_reference: "py312".to_string(),
            threads: 0,
            acquisition: AcquisitionConfig::default(),
            scan: ScanConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Config {
    pub fn acquire_options(&self) -> AcquireOptions {
        AcquireOptions {
            timeout: Duration::from_secs(self.acquisition.timeout_secs.max(1)),
            max_files: self.acquisition.max_files,
            extension: self.scan.extension.clone(),
            exclude_dir_names: self.scan.exclude_dir_names.clone(),
            work_dir: self.acquisition.work_dir.clone(),
        }
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs.max(1))
    }
}

/// Read `.keyfreq.json` from `dir`; missing or unreadable files mean defaults.
pub fn load_config(dir: &Path) -> Config {
    let primary = dir.join(".keyfreq.json");

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|_e| {
        crate::debug_log!("[keyfreq] ignoring {}: {}", primary.display(), _e);
        Config::default()
    })
}
