use anyhow::{Context, Result};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

fn excluded_dir_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // `!` globs are ignore rules; list both the directory and its descendants
    // so the walker never descends into it.
    for d in exclude_dir_names {
        let d = d.trim().trim_matches('/');
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    pub rel_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    /// File extension that marks a source file, without the dot.
    pub extension: String,
    pub exclude_dir_names: Vec<String>,
}

impl ScanOptions {
    pub fn new(root: impl Into<PathBuf>, extension: &str, exclude_dir_names: &[String]) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
            exclude_dir_names: exclude_dir_names.to_vec(),
        }
    }

    fn is_eligible(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
    }
}

/// Every eligible source file under `opts.root`, sorted by relative path.
///
/// Hidden files and ignore files are not consulted: a cloned corpus is taken
/// as-is. Symlinks are listed but not followed, so a dangling one surfaces as
/// a read failure later and is skipped there. Unreadable directories are
/// skipped.
pub fn scan_sources(opts: &ScanOptions) -> Result<Vec<FileEntry>> {
    let meta = std::fs::metadata(&opts.root)
        .with_context(|| format!("Corpus root does not exist: {}", opts.root.display()))?;
    anyhow::ensure!(meta.is_dir(), "Corpus root is not a directory: {}", opts.root.display());

    let overrides = excluded_dir_overrides(&opts.root, &opts.exclude_dir_names)?;
    let walker = WalkBuilder::new(&opts.root)
        .standard_filters(false)
        .follow_links(false)
        .overrides(overrides)
        .build();

    let mut entries = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_e) => {
                crate::debug_log!("[keyfreq] walk error: {}", _e);
                continue;
            }
        };

        let is_candidate = dent
            .file_type()
            .map(|ft| ft.is_file() || ft.is_symlink())
            .unwrap_or(false);
        if !is_candidate || !opts.is_eligible(dent.path()) {
            continue;
        }

        let abs_path = dent.into_path();
        let rel_path = abs_path
            .strip_prefix(&opts.root)
            .with_context(|| format!("{} is not under {}", abs_path.display(), opts.root.display()))?
            .to_path_buf();

        entries.push(FileEntry { abs_path, rel_path });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, body).unwrap();
    }

    fn rels(entries: &[FileEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.rel_path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn lists_only_eligible_files_in_path_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "pkg/b.py", "x = 1");
        touch(tmp.path(), "pkg/a.py", "");
        touch(tmp.path(), "a.py", "y = 2");
        touch(tmp.path(), "README.md", "# hi");
        touch(tmp.path(), "setup.pyc", "");
        touch(tmp.path(), ".hidden/tool.py", "");

        let opts = ScanOptions::new(tmp.path(), "py", &[]);
        let got = rels(&scan_sources(&opts).unwrap());
        assert_eq!(got, [".hidden/tool.py", "a.py", "pkg/a.py", "pkg/b.py"]);
    }

    #[test]
    fn excluded_directories_are_not_walked() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), ".git/hooks/sample.py", "");
        touch(tmp.path(), "src/.git/nested.py", "");
        touch(tmp.path(), "src/keep.py", "");

        let opts = ScanOptions::new(tmp.path(), ".py", &[".git".to_string()]);
        assert_eq!(rels(&scan_sources(&opts).unwrap()), ["src/keep.py"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let opts = ScanOptions::new(tmp.path().join("nope"), "py", &[]);
        assert!(scan_sources(&opts).is_err());
    }
}
