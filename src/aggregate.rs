use rayon::prelude::*;

use crate::census::{decode_source, AnalysisResult, Tally};
use crate::error::AnalyticsError;
use crate::language::LanguageReference;
use crate::scanner::{scan_sources, FileEntry, ScanOptions};

struct FileTally {
    tally: Tally,
    bytes: u64,
}

fn tally_file(entry: &FileEntry, reference: &LanguageReference) -> Option<FileTally> {
    let raw = match std::fs::read(&entry.abs_path) {
        Ok(b) => b,
        Err(_e) => {
            crate::debug_log!("[keyfreq] skip {}: {}", entry.rel_path.display(), _e);
            return None;
        }
    };
    let text = decode_source(&raw);
    Some(FileTally {
        bytes: text.len() as u64,
        tally: Tally::from_source(&text, reference),
    })
}

/// Enumerate eligible files and enforce the ceiling before any file is read.
pub fn prepare(opts: &ScanOptions, max_files: usize) -> Result<Vec<FileEntry>, AnalyticsError> {
    let files = scan_sources(opts).map_err(|e| AnalyticsError::InvalidInput(format!("{e:#}")))?;
    preflight(&files, max_files, &opts.extension)?;
    Ok(files)
}

pub fn preflight(files: &[FileEntry], max_files: usize, extension: &str) -> Result<(), AnalyticsError> {
    if files.is_empty() {
        return Err(AnalyticsError::EmptyCorpus {
            extension: extension.to_string(),
        });
    }
    if files.len() > max_files {
        return Err(AnalyticsError::CorpusTooLarge {
            found: files.len(),
            max: max_files,
            extension: extension.to_string(),
        });
    }
    Ok(())
}

pub fn aggregate(
    files: &[FileEntry],
    source: &str,
    reference: &LanguageReference,
    threads: usize,
) -> AnalysisResult {
    aggregate_with_progress(files, source, reference, threads, &|| {})
}

/// Tally files in parallel, then merge in `files` order.
///
/// Per-file work shares nothing; the reduction is a single sequential pass
/// over the ordered results, so ties in the ranked tables follow the same
/// first-seen order a sequential walk would give. `threads == 0` uses the
/// global rayon pool. `progress` is called once per file attempted.
pub fn aggregate_with_progress<P>(
    files: &[FileEntry],
    source: &str,
    reference: &LanguageReference,
    threads: usize,
    progress: &P,
) -> AnalysisResult
where
    P: Fn() + Sync,
{
    let run = || -> Vec<Option<FileTally>> {
        files
            .par_iter()
            .map(|entry| {
                let out = tally_file(entry, reference);
                progress();
                out
            })
            .collect()
    };

    let per_file = if threads == 0 {
        run()
    } else {
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(run),
            Err(_e) => {
                crate::debug_log!("[keyfreq] thread pool unavailable ({}), using global pool", _e);
                run()
            }
        }
    };

    let mut total = Tally::default();
    let mut files_processed: u64 = 0;
    let mut total_bytes: u64 = 0;
    for ft in per_file.into_iter().flatten() {
        total.merge(&ft.tally);
        total_bytes += ft.bytes;
        files_processed += 1;
    }

    let mut result = AnalysisResult::from_tally(total, source, reference);
    result.meta.files_processed = Some(files_processed);
    result.meta.total_bytes = Some(total_bytes);
    result
}

/// Scan, check, and aggregate a directory already on disk.
pub fn analyze_directory(
    opts: &ScanOptions,
    max_files: usize,
    threads: usize,
    source: &str,
    reference: &LanguageReference,
) -> Result<AnalysisResult, AnalyticsError> {
    let files = prepare(opts, max_files)?;
    Ok(aggregate(&files, source, reference, threads))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::py312;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &[u8]) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, body).unwrap();
    }

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.py", b"class A:\n    def __init__(self):\n        print(len([]))\n");
        write(tmp.path(), "pkg/b.py", b"import os\nfor x in range(3):\n    print(x)\n");
        write(tmp.path(), "pkg/broken.py", b"def f(:\n    s = '''unterminated\n");
        write(tmp.path(), "pkg/latin1.py", b"name = 'caf\xe9'\nreturn_ = str(name)\n");
        write(tmp.path(), "notes.txt", b"def not_python(): pass");
        tmp
    }

    #[test]
    fn merges_counts_and_metadata() {
        let tmp = fixture();
        let opts = ScanOptions::new(tmp.path(), "py", &[]);
        let r = analyze_directory(&opts, 100, 2, "local", py312()).unwrap();

        assert_eq!(r.meta.files_processed, Some(4));
        assert_eq!(r.builtin_freq.get("print"), 2);
        assert_eq!(r.builtin_freq.get("len"), 1);
        assert_eq!(r.builtin_freq.get("range"), 1);
        assert_eq!(r.builtin_freq.get("str"), 1);
        assert_eq!(r.dunder_freq.get("__init__"), 1);
        // a.py + broken.py each contribute one `def`.
        assert_eq!(r.keyword_freq.get("def"), 2);
        assert_eq!(r.keyword_freq.get("return"), 0);
        assert!(r.is_consistent());
        assert!(r.meta.total_bytes.unwrap() > 0);
        assert_eq!(r.meta.source, "local");
        assert!(r.meta.repo_url.is_none());
    }

    #[test]
    fn repeated_runs_are_identical() {
        let tmp = fixture();
        let opts = ScanOptions::new(tmp.path(), "py", &[]);
        let first = analyze_directory(&opts, 100, 4, "local", py312()).unwrap();
        let second = analyze_directory(&opts, 100, 1, "local", py312()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn ties_follow_path_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.py", b"zip\n");
        write(tmp.path(), "a.py", b"abs\n");
        write(tmp.path(), "c.py", b"abs\nzip\nmin\n");
        let opts = ScanOptions::new(tmp.path(), "py", &[]);
        let r = analyze_directory(&opts, 10, 3, "local", py312()).unwrap();
        let order: Vec<&str> = r.builtin_freq.iter().map(|(k, _)| k).collect();
        assert_eq!(order, ["abs", "zip", "min"]);
    }

    #[test]
    fn over_ceiling_fails_before_reading() {
        let tmp = TempDir::new().unwrap();
        for i in 0..4 {
            write(tmp.path(), &format!("m{i}.py"), b"pass\n");
        }
        let opts = ScanOptions::new(tmp.path(), "py", &[]);
        let err = prepare(&opts, 3).unwrap_err();
        assert!(matches!(err, AnalyticsError::CorpusTooLarge { found: 4, max: 3, .. }));

        // At the ceiling is fine.
        let files = prepare(&opts, 4).unwrap();
        let seen = AtomicUsize::new(0);
        let r = aggregate_with_progress(&files, "local", py312(), 0, &|| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(seen.load(Ordering::Relaxed), 4);
        assert_eq!(r.keyword_freq.get("pass"), 4);
    }

    #[test]
    fn no_eligible_files_is_empty_corpus() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "README.md", b"# docs");
        write(tmp.path(), "lib/mod.rs", b"fn main() {}");
        let opts = ScanOptions::new(tmp.path(), "py", &[]);
        let err = analyze_directory(&opts, 10, 0, "local", py312()).unwrap_err();
        assert_eq!(err.code(), "empty_corpus");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ok.py", b"print()\n");
        std::os::unix::fs::symlink(tmp.path().join("gone.py"), tmp.path().join("link.py")).unwrap();
        let opts = ScanOptions::new(tmp.path(), "py", &[]);
        let files = prepare(&opts, 10).unwrap();
        assert_eq!(files.len(), 2);
        let r = aggregate(&files, "local", py312(), 0);
        assert_eq!(r.meta.files_processed, Some(1));
        assert_eq!(r.builtin_freq.get("print"), 1);
    }
}
