use thiserror::Error;

/// Failures a caller can act on. Cache damage is handled inside the cache and
/// never shows up here.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid repository reference: {0}")]
    InvalidInput(String),

    #[error("Fetch timed out after {secs}s. Try a smaller repository.")]
    AcquisitionTimeout { secs: u64 },

    #[error("Fetch failed: {0}")]
    AcquisitionFailed(String),

    #[error("Corpus contains no .{extension} files")]
    EmptyCorpus { extension: String },

    #[error("Corpus has {found} .{extension} files; max allowed is {max}")]
    CorpusTooLarge {
        found: usize,
        max: usize,
        extension: String,
    },
}

impl AnalyticsError {
    /// Stable identifier a front end can switch on.
    pub fn code(&self) -> &'static str {
        match self {
            AnalyticsError::InvalidInput(_) => "invalid_input",
            AnalyticsError::AcquisitionTimeout { .. } => "acquisition_timeout",
            AnalyticsError::AcquisitionFailed(_) => "acquisition_failed",
            AnalyticsError::EmptyCorpus { .. } => "empty_corpus",
            AnalyticsError::CorpusTooLarge { .. } => "corpus_too_large",
        }
    }

    /// Process exit status used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AnalyticsError::InvalidInput(_) => 2,
            AnalyticsError::AcquisitionTimeout { .. } => 3,
            AnalyticsError::AcquisitionFailed(_) => 4,
            AnalyticsError::EmptyCorpus { .. } => 5,
            AnalyticsError::CorpusTooLarge { .. } => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let all = [
            AnalyticsError::InvalidInput(String::new()),
            AnalyticsError::AcquisitionTimeout { secs: 1 },
            AnalyticsError::AcquisitionFailed(String::new()),
            AnalyticsError::EmptyCorpus { extension: "py".into() },
            AnalyticsError::CorpusTooLarge { found: 2, max: 1, extension: "py".into() },
        ];
        let mut codes: Vec<&str> = all.iter().map(|e| e.code()).collect();
        let mut exits: Vec<i32> = all.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        exits.sort_unstable();
        exits.dedup();
        assert_eq!(codes.len(), 5);
        assert_eq!(exits.len(), 5);
    }

    #[test]
    fn too_large_message_names_both_counts() {
        let e = AnalyticsError::CorpusTooLarge { found: 31, max: 30, extension: "py".into() };
        assert_eq!(e.to_string(), "Corpus has 31 .py files; max allowed is 30");
    }
}
