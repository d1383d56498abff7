use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::process::Child;

use crate::aggregate::preflight;
use crate::error::AnalyticsError;
use crate::repo::RepoRef;
use crate::scanner::{scan_sources, FileEntry, ScanOptions};

/// Upper bound on how long an abandoned clone may take to die.
const GROUP_EXIT_WAIT: Duration = Duration::from_secs(2);

/// Materializes a repository at `dest` (which must not exist yet).
///
/// Implementations must stop their work when the returned future is dropped;
/// the caller enforces the timeout by dropping it.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, dest: &Path) -> impl Future<Output = Result<(), AnalyticsError>> + Send;
}

/// Shallow `git clone` in its own process group. If the fetch is abandoned
/// the whole group (git and its transport and pack helpers) is killed.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: PathBuf,
}

impl GitFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new("git")
    }
}

/// A running clone. Dropping it before `wait` finishes kills the process
/// group and blocks until the group is gone, so nothing writes into the
/// checkout once the caller moves on to remove it.
struct CloneProcess {
    child: Child,
    exited: bool,
    #[cfg(unix)]
    pgid: Option<nix::unistd::Pid>,
}

impl CloneProcess {
    fn new(child: Child) -> Self {
        Self {
            #[cfg(unix)]
            pgid: child.id().and_then(|id| i32::try_from(id).ok()).map(nix::unistd::Pid::from_raw),
            child,
            exited: false,
        }
    }

    #[cfg(unix)]
    fn group_alive(&self) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        match self.pgid {
            Some(pgid) => killpg(pgid, None::<Signal>) != Err(Errno::ESRCH),
            None => false,
        }
    }

    #[cfg(not(unix))]
    fn group_alive(&self) -> bool {
        false
    }

    fn kill_group(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
        }
        let _ = self.child.start_kill();
    }
}

impl Drop for CloneProcess {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        self.kill_group();
        let deadline = Instant::now() + GROUP_EXIT_WAIT;
        loop {
            // Reap git itself; orphaned helpers are reaped by init.
            let reaped = !matches!(self.child.try_wait(), Ok(None));
            if reaped && !self.group_alive() {
                break;
            }
            if Instant::now() >= deadline {
                crate::debug_log!("[keyfreq] clone process group still present after kill");
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Fetcher for GitFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), AnalyticsError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(["clone", "--depth", "1", "--single-branch", "--quiet", "--"])
            .arg(url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| {
            AnalyticsError::AcquisitionFailed(format!(
                "could not run {}: {e}",
                self.program.display()
            ))
        })?;
        let mut clone = CloneProcess::new(child);

        let mut stderr_pipe = clone.child.stderr.take();
        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        };
        let (status, stderr) = tokio::join!(clone.child.wait(), read_stderr);
        let status = status
            .map_err(|e| AnalyticsError::AcquisitionFailed(format!("waiting for git clone: {e}")))?;
        clone.exited = true;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(AnalyticsError::AcquisitionFailed(format!(
                "git clone exited with {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// A materialized corpus on disk. The whole temp tree is removed when this is
/// dropped or closed, whichever path the request takes out.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    root: PathBuf,
}

impl Workspace {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// A checked corpus: its files are known, non-empty, and within the ceiling.
#[derive(Debug)]
pub struct Corpus {
    pub workspace: Workspace,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone)]
pub struct AcquireOptions {
    pub timeout: Duration,
    pub max_files: usize,
    pub extension: String,
    pub exclude_dir_names: Vec<String>,
    /// Parent for temp checkouts; the system temp dir when `None`.
    pub work_dir: Option<PathBuf>,
}

pub struct Acquirer<F> {
    fetcher: F,
    opts: AcquireOptions,
}

impl<F: Fetcher> Acquirer<F> {
    pub fn new(fetcher: F, opts: AcquireOptions) -> Self {
        Self { fetcher, opts }
    }

    fn temp_dir(&self) -> Result<TempDir, AnalyticsError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("keyfreq_");
        let made = match &self.opts.work_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AnalyticsError::AcquisitionFailed(format!(
                        "cannot create work dir {}: {e}",
                        parent.display()
                    ))
                })?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        };
        made.map_err(|e| AnalyticsError::AcquisitionFailed(format!("cannot create temp dir: {e}")))
    }

    /// Fetch `repo` into a fresh temp directory, bounded by the timeout.
    pub async fn materialize(&self, repo: &RepoRef) -> Result<Workspace, AnalyticsError> {
        let dir = self.temp_dir()?;
        let root = dir.path().join(repo.name());

        // The fetch future is gone (and its work stopped) before `dir` is.
        let fetched = tokio::time::timeout(self.opts.timeout, self.fetcher.fetch(repo.clone_url(), &root)).await;
        match fetched {
            Err(_) => {
                crate::debug_log!("[keyfreq] fetch of {} timed out", repo.clone_url());
                return Err(AnalyticsError::AcquisitionTimeout {
                    secs: self.opts.timeout.as_secs(),
                });
            }
            Ok(Err(e)) => {
                crate::debug_log!("[keyfreq] fetch of {} failed: {}", repo.clone_url(), e);
                return Err(e);
            }
            Ok(Ok(())) => {}
        }

        if !root.is_dir() {
            return Err(AnalyticsError::AcquisitionFailed(
                "fetch produced no directory".to_string(),
            ));
        }
        Ok(Workspace { dir, root })
    }

    /// Materialize, then list eligible files and reject empty or oversized
    /// corpora before anything is tokenized.
    pub async fn acquire(&self, repo: &RepoRef) -> Result<Corpus, AnalyticsError> {
        let workspace = self.materialize(repo).await?;
        let scan = ScanOptions::new(workspace.root(), &self.opts.extension, &self.opts.exclude_dir_names);
        let max_files = self.opts.max_files;

        let files = tokio::task::spawn_blocking(move || {
            let files = scan_sources(&scan).map_err(|e| {
                AnalyticsError::AcquisitionFailed(format!("cannot list checkout: {e:#}"))
            })?;
            preflight(&files, max_files, &scan.extension)?;
            Ok::<_, AnalyticsError>(files)
        })
        .await
        .map_err(|e| AnalyticsError::AcquisitionFailed(format!("scan task failed: {e}")))??;

        Ok(Corpus { workspace, files })
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Writes a fixed file set instead of cloning.
    #[derive(Default)]
    pub struct FakeFetcher {
        pub files: Vec<(String, String)>,
        pub delay: Option<Duration>,
        pub fail: Option<String>,
        pub skip_dir: bool,
        pub calls: AtomicUsize,
        pub last_dest: Mutex<Option<PathBuf>>,
    }

    impl FakeFetcher {
        pub fn with_files(files: &[(&str, &str)]) -> Self {
            Self {
                files: files.iter().map(|(p, b)| (p.to_string(), b.to_string())).collect(),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_dest(&self) -> Option<PathBuf> {
            self.last_dest.lock().unwrap().clone()
        }
    }

    impl Fetcher for FakeFetcher {
        async fn fetch(&self, _url: &str, dest: &Path) -> Result<(), AnalyticsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_dest.lock().unwrap() = Some(dest.to_path_buf());
            if let Some(msg) = &self.fail {
                return Err(AnalyticsError::AcquisitionFailed(msg.clone()));
            }
            if self.skip_dir {
                return Ok(());
            }
            std::fs::create_dir_all(dest).unwrap();
            for (rel, body) in &self.files {
                let p = dest.join(rel);
                std::fs::create_dir_all(p.parent().unwrap()).unwrap();
                std::fs::write(p, body).unwrap();
            }
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            Ok(())
        }
    }

    impl Acquirer<FakeFetcher> {
        pub fn fetcher_calls(&self) -> usize {
            self.fetcher.calls()
        }
    }

    pub fn options(timeout: Duration, max_files: usize, work_dir: &Path) -> AcquireOptions {
        AcquireOptions {
            timeout,
            max_files,
            extension: "py".to_string(),
            exclude_dir_names: vec![".git".to_string()],
            work_dir: Some(work_dir.to_path_buf()),
        }
    }
}
