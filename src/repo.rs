use regex::Regex;
use std::sync::OnceLock;

use crate::error::AnalyticsError;

const DEFAULT_HOST: &str = "https://github.com";

fn short_form_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.-]+/[\w.-]+$").expect("static regex"))
}

/// A repository reference as the user typed it, plus its canonical clone URL.
///
/// The canonical form is what gets fetched and what the cache key is derived
/// from, so every spelling of the same repository lands on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    raw: String,
    canonical: String,
}

impl RepoRef {
    pub fn parse(input: &str) -> Result<Self, AnalyticsError> {
        Ok(Self {
            raw: input.trim().to_string(),
            canonical: normalize(input)?,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn clone_url(&self) -> &str {
        &self.canonical
    }

    /// Last path segment without `.git`; used as the checkout directory name.
    pub fn name(&self) -> String {
        let last = self
            .canonical
            .rsplit(|c: char| c == '/' || c == ':')
            .find(|seg| !seg.is_empty())
            .unwrap_or("");
        let stem = last.strip_suffix(".git").unwrap_or(last);
        let clean: String = stem
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
            .collect();
        let clean = clean.trim_matches('.').to_string();
        if clean.is_empty() {
            "repo".to_string()
        } else {
            clean
        }
    }
}

fn invalid(input: &str, why: &str) -> AnalyticsError {
    AnalyticsError::InvalidInput(format!("{why}: {input:?}"))
}

fn strip_git_suffix(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    path.strip_suffix(".git").unwrap_or(path)
}

fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|seg| seg == "." || seg == "..")
}

/// Canonical clone URL for `owner/name`, an `http(s)://` URL, or an
/// `git@host:path` SSH reference. Pure: same input, same output.
pub fn normalize(input: &str) -> Result<String, AnalyticsError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AnalyticsError::InvalidInput(
            "Missing repository. Use e.g. \"django/django\"".to_string(),
        ));
    }
    if s.chars().any(char::is_whitespace) {
        return Err(invalid(s, "whitespace in repository reference"));
    }

    let short = strip_git_suffix(s);
    if short_form_re().is_match(short) {
        if has_dot_segment(short) {
            return Err(invalid(s, "bad path segment"));
        }
        return Ok(format!("{DEFAULT_HOST}/{short}.git"));
    }

    if let Some((scheme, rest)) = s.split_once("://") {
        let scheme = scheme.to_ascii_lowercase();
        if scheme != "https" && scheme != "http" {
            return Err(invalid(s, "unsupported scheme"));
        }
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        let path = strip_git_suffix(path.trim_start_matches('/'));
        if host.is_empty() || path.is_empty() || has_dot_segment(path) {
            return Err(invalid(s, "expected a repository URL like https://host/owner/name"));
        }
        return Ok(format!("{scheme}://{}/{path}.git", host.to_ascii_lowercase()));
    }

    if let Some(rest) = s.strip_prefix("git@") {
        let Some((host, path)) = rest.split_once(':') else {
            return Err(invalid(s, "expected git@host:owner/name"));
        };
        let path = strip_git_suffix(path);
        if host.is_empty() || path.is_empty() || path.starts_with('-') || has_dot_segment(path) {
            return Err(invalid(s, "expected git@host:owner/name"));
        }
        return Ok(format!("git@{}:{path}.git", host.to_ascii_lowercase()));
    }

    Err(invalid(s, "expected owner/name or a repository URL"))
}
