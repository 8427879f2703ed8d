//! Turns a posting URL into a reviewable preview.

use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::classifier::{classify_url, url_hints};
use crate::error::{FetchError, OrchestrationError};
use crate::extract;
use crate::fetcher::{PageFetcher, RawFetchResult};
use crate::models::{ExtractedFields, FieldKind, PostingPreview, PostingSource};
use crate::normalize::Normalizer;
use crate::suggest::{SuggestionIndex, MIN_QUERY_CHARS};

pub const MAX_SUGGESTED_TITLES: usize = 5;

/// Stateless apart from the suggestion index, which it only reads.
pub struct Orchestrator {
    fetcher: Arc<dyn PageFetcher>,
    index: Arc<SuggestionIndex>,
    normalizer: Normalizer,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, index: Arc<SuggestionIndex>, normalizer: Normalizer) -> Self {
        Self {
            fetcher,
            index,
            normalizer,
        }
    }

    pub async fn preview(&self, raw_url: &str) -> Result<PostingPreview, OrchestrationError> {
        let url = parse_posting_url(raw_url)?;
        let source = classify_url(&url);
        info!(url = %url, source = %source, "previewing posting");

        let page = self.fetch_with_retry(&url, source).await?;
        Ok(self.build_preview(url, source, &page))
    }

    async fn fetch_with_retry(&self, url: &Url, source: PostingSource) -> Result<RawFetchResult, FetchError> {
        match self.fetcher.fetch(url, source).await {
            Err(e) if e.is_timeout() => {
                warn!(url = %url, error = %e, "fetch timed out, retrying once");
                self.fetcher.fetch(url, source).await
            }
            other => other,
        }
    }

    fn build_preview(&self, url: Url, source: PostingSource, page: &RawFetchResult) -> PostingPreview {
        let extraction = extract::extract(source, page);
        let hints = url_hints(&url, source);

        let mut fields = extraction.fields;
        fields.fill_missing(ExtractedFields {
            job_title: hints.job_title,
            company_name: hints.company_name,
            location: hints.location,
            ..Default::default()
        });
        let fields = self.normalizer.normalize(fields);
        let suggested_titles = self.suggested_titles(fields.job_title.as_deref());

        info!(
            url = %url,
            strategy = %extraction.strategy,
            fallback = extraction.fallback.is_some(),
            title = fields.job_title.as_deref().unwrap_or("-"),
            company = fields.company_name.as_deref().unwrap_or("-"),
            "preview ready"
        );

        PostingPreview {
            source,
            url: url.to_string(),
            external_id: hints.job_id,
            fields,
            suggested_titles,
            strategy: extraction.strategy,
            fallback_reason: extraction.fallback.map(|e| e.to_string()),
            snapshot: page.snapshot(),
        }
    }

    /// Titles from confirmed postings that resemble `title`: matches for the
    /// whole title first, then for each of its words.
    fn suggested_titles(&self, title: Option<&str>) -> Vec<String> {
        let Some(title) = title else {
            return Vec::new();
        };
        let words = title
            .split_whitespace()
            .filter(|word| word.chars().count() >= MIN_QUERY_CHARS);

        let mut suggestions: Vec<String> = Vec::new();
        for seed in std::iter::once(title).chain(words) {
            for candidate in self.index.query(seed, FieldKind::Title) {
                let seen = candidate.eq_ignore_ascii_case(title)
                    || suggestions.iter().any(|s| s.eq_ignore_ascii_case(&candidate));
                if seen {
                    continue;
                }
                suggestions.push(candidate);
                if suggestions.len() == MAX_SUGGESTED_TITLES {
                    return suggestions;
                }
            }
        }
        suggestions
    }
}

/// Accepts absolute `http`/`https` URLs with a host.
pub fn parse_posting_url(raw: &str) -> Result<Url, OrchestrationError> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| OrchestrationError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(&format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}
