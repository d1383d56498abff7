use crate::acquire::{Acquirer, Corpus, Fetcher};
use crate::aggregate::aggregate;
use crate::cache::ResultCache;
use crate::census::AnalysisResult;
use crate::error::AnalyticsError;
use crate::language::LanguageReference;
use crate::repo::RepoRef;

/// One request: cache lookup, then fetch → check → aggregate → store.
///
/// Requests share nothing but the cache directory, so independent calls may
/// run concurrently. Two requests for the same repository may both compute;
/// the cache's atomic publish keeps whichever finishes last.
pub struct Pipeline<F> {
    acquirer: Acquirer<F>,
    cache: Option<ResultCache>,
    reference: &'static LanguageReference,
    threads: usize,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(
        acquirer: Acquirer<F>,
        cache: Option<ResultCache>,
        reference: &'static LanguageReference,
        threads: usize,
    ) -> Self {
        Self {
            acquirer,
            cache,
            reference,
            threads,
        }
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    pub async fn analyze(&self, input: &str) -> Result<AnalysisResult, AnalyticsError> {
        let repo = RepoRef::parse(input)?;

        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&repo)) {
            crate::debug_log!("[keyfreq] cache hit for {}", repo.clone_url());
            return Ok(hit);
        }

        let Corpus { workspace, files } = self.acquirer.acquire(&repo).await?;

        let source = repo.raw().to_string();
        let reference = self.reference;
        let threads = self.threads;
        let aggregated =
            tokio::task::spawn_blocking(move || aggregate(&files, &source, reference, threads)).await;

        if let Err(_e) = workspace.close() {
            crate::debug_log!("[keyfreq] failed to remove checkout: {}", _e);
        }

        let mut result = aggregated
            .map_err(|e| AnalyticsError::AcquisitionFailed(format!("analysis task failed: {e}")))?;
        result.meta.repo_url = Some(repo.raw().to_string());

        if let Some(cache) = &self.cache {
            if let Err(_e) = cache.put(&repo, &result) {
                crate::debug_log!("[keyfreq] cache write failed: {:#}", _e);
            }
        }
        Ok(result)
    }
}
