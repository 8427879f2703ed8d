//! Turns a reviewed preview into a stored posting.
//!
//! This is the only path that feeds the suggestion index, so suggestions are
//! drawn from confirmed postings alone.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::classifier::{classify_url, url_hints};
use crate::db::PostingStore;
use crate::models::{ApplicationStatus, ConfirmedPosting, FieldKind, PostingId, PostingPreview};
use crate::normalize::{clean_line, clean_paragraphs};
use crate::orchestrator::parse_posting_url;
use crate::suggest::{SuggestionIndex, PLACEHOLDER_COMPANY, PLACEHOLDER_TITLE};

/// Values the user typed over the extracted ones. `None` keeps the extracted value.
#[derive(Debug, Clone, Default)]
pub struct PostingEdits {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub notes: Option<String>,
}

pub struct Confirmer<'a, S: PostingStore> {
    store: &'a S,
    index: &'a SuggestionIndex,
}

impl<'a, S: PostingStore> Confirmer<'a, S> {
    pub fn new(store: &'a S, index: &'a SuggestionIndex) -> Self {
        Self { store, index }
    }

    pub fn confirm(&self, preview: &PostingPreview, edits: PostingEdits) -> Result<PostingId> {
        let fields = &preview.fields;
        let now = Utc::now();
        let posting = ConfirmedPosting {
            company_name: edited(edits.company_name)
                .or_else(|| fields.company_name.clone())
                .unwrap_or_else(|| PLACEHOLDER_COMPANY.to_string()),
            job_title: edited(edits.job_title)
                .or_else(|| fields.job_title.clone())
                .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
            location: edited(edits.location).or_else(|| fields.location.clone()),
            description: edits
                .description
                .as_deref()
                .and_then(clean_paragraphs)
                .or_else(|| fields.description.clone()),
            job_url: preview.url.clone(),
            source: preview.source,
            external_id: preview.external_id.clone(),
            status: edits.status.unwrap_or_default(),
            notes: edits.notes.as_deref().and_then(clean_paragraphs),
            applied_at: now,
            created_at: now,
            updated_at: now,
        };

        let id = self
            .store
            .persist(&posting, Some(&preview.snapshot))
            .context("Failed to save posting")?;
        self.remember(&posting);
        info!(id = %id, title = %posting.job_title, company = %posting.company_name, "posting confirmed");
        Ok(id)
    }

    /// Records a posting typed in by hand, typically after the fetch failed.
    pub fn confirm_manual(&self, raw_url: &str, edits: PostingEdits) -> Result<PostingId> {
        let url = parse_posting_url(raw_url)?;
        let source = classify_url(&url);
        let hints = url_hints(&url, source);

        let now = Utc::now();
        let posting = ConfirmedPosting {
            company_name: edited(edits.company_name)
                .or(hints.company_name)
                .unwrap_or_else(|| PLACEHOLDER_COMPANY.to_string()),
            job_title: edited(edits.job_title)
                .or(hints.job_title)
                .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
            location: edited(edits.location).or(hints.location),
            description: edits.description.as_deref().and_then(clean_paragraphs),
            job_url: url.to_string(),
            source,
            external_id: hints.job_id,
            status: edits.status.unwrap_or_default(),
            notes: edits.notes.as_deref().and_then(clean_paragraphs),
            applied_at: now,
            created_at: now,
            updated_at: now,
        };

        let id = self
            .store
            .persist(&posting, None)
            .context("Failed to save posting")?;
        self.remember(&posting);
        info!(id = %id, url = %posting.job_url, "manual posting recorded");
        Ok(id)
    }

    fn remember(&self, posting: &ConfirmedPosting) {
        self.index
            .insert(FieldKind::Company, &posting.company_name, posting.updated_at);
        self.index
            .insert(FieldKind::Title, &posting.job_title, posting.updated_at);
    }
}

/// A user edit after single-line cleaning; blank edits count as no edit.
fn edited(value: Option<String>) -> Option<String> {
    value.as_deref().and_then(clean_line)
}
