use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use keyfreq::acquire::{Acquirer, GitFetcher};
use keyfreq::aggregate::{aggregate_with_progress, prepare};
use keyfreq::cache::{write_json_atomic, ResultCache};
use keyfreq::census::{analyze_text, decode_source, AnalysisResult, FrequencyTable, IN_MEMORY_SOURCE};
use keyfreq::config::{load_config, Config};
use keyfreq::error::AnalyticsError;
use keyfreq::language::{self, LanguageReference};
use keyfreq::pipeline::Pipeline;
use keyfreq::remote::analyze_url;
use keyfreq::scanner::ScanOptions;
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "keyfreq")]
#[command(version)]
#[command(about = "Keyword, builtin and dunder frequency census against a frozen Python 3.12 reference")]
#[command(group(ArgGroup::new("input").args(["repo", "text", "url", "dir", "show_reference"])))]
struct Cli {
    /// Repository to analyze: `owner/name` or a full URL. Cloned shallowly; results are cached.
    #[arg(value_name = "REPO")]
    repo: Option<String>,

    /// Analyze a single local file as one in-memory text unit (`-` reads stdin)
    #[arg(long, value_name = "FILE")]
    text: Option<PathBuf>,

    /// Fetch one raw file over HTTP(S) into memory and analyze it
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Analyze every source file under an existing local directory (no clone, no cache)
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Print the language reference's name sets as JSON and exit
    #[arg(long)]
    show_reference: bool,

    /// `meta.source` label for --dir (defaults to the path)
    #[arg(long, requires = "dir")]
    label: Option<String>,

    /// Also write the JSON result to this path
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print a human summary with the top N names per table to stderr
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "15")]
    summary: Option<usize>,

    /// Skip the result cache for this request (no lookup, no store)
    #[arg(long)]
    no_cache: bool,

    /// Override the cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Clone timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Maximum number of eligible source files
    #[arg(long)]
    max_files: Option<usize>,

    /// Tokenizer worker threads (0 = one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Language reference name (e.g. py312)
    #[arg(long, value_name = "NAME")]
    language: Option<String>,

    /// Do not print the JSON result to stdout
    #[arg(long, short = 'q')]
    quiet: bool,
}

fn spinner(msg: String) -> ProgressBar {
    let sp = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        sp.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    sp.set_message(msg);
    sp.enable_steady_tick(Duration::from_millis(80));
    sp
}

fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(d) = &cli.cache_dir {
        cfg.cache_dir = d.clone();
    }
    if let Some(t) = cli.timeout {
        cfg.acquisition.timeout_secs = t;
        cfg.remote.timeout_secs = t;
    }
    if let Some(m) = cli.max_files {
        cfg.acquisition.max_files = m;
    }
    if let Some(n) = cli.threads {
        cfg.threads = n;
    }
    if let Some(l) = &cli.language {
        cfg.language_reference = l.clone();
    }
}

fn read_text_input(path: &Path) -> Result<String> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    Ok(decode_source(&bytes))
}

fn analyze_dir(cfg: &Config, dir: &Path, label: &str, reference: &LanguageReference) -> Result<AnalysisResult> {
    let opts = ScanOptions::new(dir, &cfg.scan.extension, &cfg.scan.exclude_dir_names);
    let files = prepare(&opts, cfg.acquisition.max_files)?;

    let bar = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} files") {
        bar.set_style(style);
    }
    let result = aggregate_with_progress(&files, label, reference, cfg.threads, &|| bar.inc(1));
    bar.finish_and_clear();
    Ok(result)
}

fn analyze_repo(
    cfg: &Config,
    repo: &str,
    reference: &'static LanguageReference,
    no_cache: bool,
) -> Result<AnalysisResult> {
    let acquirer = Acquirer::new(GitFetcher::new(&cfg.acquisition.git_program), cfg.acquire_options());
    let cache = (!no_cache).then(|| ResultCache::new(&cfg.cache_dir));
    let pipeline = Pipeline::new(acquirer, cache, reference, cfg.threads);

    let rt = tokio::runtime::Runtime::new()?;
    let sp = spinner(format!("analyzing {repo}..."));

    // Ctrl-C drops the request future: the clone is killed and the checkout removed.
    let outcome = rt.block_on(async {
        tokio::select! {
            r = pipeline.analyze(repo) => Some(r),
            _ = tokio::signal::ctrl_c() => None,
        }
    });

    match outcome {
        Some(Ok(result)) => {
            sp.finish_with_message(format!(
                "analyzed {} files",
                result.meta.files_processed.unwrap_or(0)
            ));
            Ok(result)
        }
        Some(Err(e)) => {
            sp.finish_and_clear();
            Err(e.into())
        }
        None => {
            sp.finish_with_message("cancelled");
            rt.shutdown_background();
            anyhow::bail!("cancelled")
        }
    }
}

fn sorted_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut v: Vec<&str> = names.collect();
    v.sort_unstable();
    v
}

fn reference_listing(reference: &LanguageReference) -> serde_json::Value {
    json!({
        "language_reference": reference.version,
        "keywords": sorted_names(reference.keywords()),
        "builtins": sorted_names(reference.builtins()),
        "special_methods": sorted_names(reference.special_methods()),
    })
}

fn top_line(table: &FrequencyTable, n: usize) -> String {
    table
        .top(n)
        .iter()
        .map(|(k, c)| format!("{k}={c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_summary(result: &AnalysisResult, n: usize) {
    let meta = &result.meta;
    eprintln!("Language reference: {}", meta.language_reference);
    eprintln!("Source: {}", meta.source);
    if let Some(files) = meta.files_processed {
        eprintln!("Files processed: {files}");
    }
    eprintln!("Tokens analyzed: {}", meta.total_tokens_analyzed);
    eprintln!("Keyword occurrences: {}", meta.total_keyword_occurrences);
    eprintln!("Built-in occurrences: {}", meta.total_builtin_occurrences);
    eprintln!("Dunder occurrences: {}", meta.total_dunder_occurrences);
    if let Some(bytes) = meta.total_bytes {
        eprintln!("Total bytes: {bytes}");
    }
    eprintln!();
    eprintln!("Top keywords: {}", top_line(&result.keyword_freq, n));
    eprintln!("Top built-ins: {}", top_line(&result.builtin_freq, n));
    eprintln!("Top dunder: {}", top_line(&result.dunder_freq, n));
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current dir")?;
    let mut cfg = load_config(&cwd);
    apply_overrides(&mut cfg, &cli);

    let reference = language::lookup(&cfg.language_reference).ok_or_else(|| {
        AnalyticsError::InvalidInput(format!(
            "unknown language reference {:?}",
            cfg.language_reference
        ))
    })?;

    if cli.show_reference {
        println!("{}", serde_json::to_string_pretty(&reference_listing(reference))?);
        return Ok(());
    }

    let result = if let Some(path) = &cli.text {
        analyze_text(&read_text_input(path)?, IN_MEMORY_SOURCE, reference)
    } else if let Some(url) = &cli.url {
        let sp = spinner(format!("fetching {url}..."));
        let out = analyze_url(url, cfg.remote_timeout(), cfg.remote.max_bytes, reference);
        sp.finish_and_clear();
        out?
    } else if let Some(dir) = &cli.dir {
        let label = cli
            .label
            .clone()
            .unwrap_or_else(|| dir.to_string_lossy().to_string());
        analyze_dir(&cfg, dir, &label, reference)?
    } else if let Some(repo) = &cli.repo {
        analyze_repo(&cfg, repo, reference, cli.no_cache)?
    } else {
        return Err(AnalyticsError::InvalidInput(
            "Missing input. Pass a repository (e.g. django/django), --text, --url or --dir".to_string(),
        )
        .into());
    };

    if let Some(out) = &cli.output {
        write_json_atomic(out, &result)?;
        eprintln!("Analytics saved to {}", out.display());
    }
    if let Some(n) = cli.summary {
        print_summary(&result, n);
    }
    if !cli.quiet {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        // Typed failures go to stdout as JSON so callers can switch on `code`.
        if let Some(ae) = e.downcast_ref::<AnalyticsError>() {
            println!("{}", json!({ "error": ae.to_string(), "code": ae.code() }));
            std::process::exit(ae.exit_code());
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
