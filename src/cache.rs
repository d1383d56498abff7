use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::census::AnalysisResult;
use crate::repo::RepoRef;

/// Hex characters kept from the SHA-256 of the canonical URL.
pub const KEY_LEN: usize = 24;

/// Why a stored record could not be used. Never leaves this module.
#[derive(Debug, Error)]
enum CacheCorruption {
    #[error("unreadable record: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("record totals disagree with its tables")]
    Inconsistent,
}

impl CacheCorruption {
    /// Damage that rereading will not fix. Other I/O failures (permissions,
    /// descriptor exhaustion) leave the record in place.
    fn is_permanent(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::InvalidData,
            Self::Malformed(_) | Self::Inconsistent => true,
        }
    }
}

pub fn cache_key(repo: &RepoRef) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repo.clone_url().as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..KEY_LEN].to_string()
}

/// One JSON file per repository, named by its fingerprint.
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so readers see either the old record or the new one. Concurrent
/// writers of one key race benignly: the last rename wins.
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record_path(&self, repo: &RepoRef) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(repo)))
    }

    /// A damaged record is deleted and reported as a miss. A record that
    /// merely cannot be read right now is a miss and stays on disk.
    pub fn get(&self, repo: &RepoRef) -> Option<AnalysisResult> {
        let path = self.record_path(repo);
        match read_record(&path) {
            Ok(found) => found,
            Err(fault) => {
                crate::debug_log!(
                    "[keyfreq] cache record {} unusable ({}), recomputing",
                    path.display(),
                    fault
                );
                if fault.is_permanent() {
                    let _ = fs::remove_file(&path);
                }
                None
            }
        }
    }

    pub fn put(&self, repo: &RepoRef, result: &AnalysisResult) -> Result<()> {
        write_json_atomic(&self.record_path(repo), result)
    }
}

fn read_record(path: &Path) -> Result<Option<AnalysisResult>, CacheCorruption> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let result: AnalysisResult = serde_json::from_str(&text)?;
    if !result.is_consistent() {
        return Err(CacheCorruption::Inconsistent);
    }
    Ok(Some(result))
}

/// Pretty-print `value` to `path` through a sibling temp file and a rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut w, value)?;
        w.write_all(b"\n")?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to publish {}", path.display()))?;
    Ok(())
}
