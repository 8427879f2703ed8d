use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::extract::Strategy;

/// Site family a posting URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingSource {
    LinkedIn,
    Glassdoor,
    Indeed,
    Unknown,
}

impl PostingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingSource::LinkedIn => "linkedin",
            PostingSource::Glassdoor => "glassdoor",
            PostingSource::Indeed => "indeed",
            PostingSource::Unknown => "unknown",
        }
    }

    /// Job boards that hydrate their listings client-side.
    pub fn needs_rendering(&self) -> bool {
        !matches!(self, PostingSource::Unknown)
    }
}

impl fmt::Display for PostingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Ok(PostingSource::LinkedIn),
            "glassdoor" => Ok(PostingSource::Glassdoor),
            "indeed" => Ok(PostingSource::Indeed),
            "unknown" | "other" => Ok(PostingSource::Unknown),
            other => Err(format!("unknown posting source '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Interview,
    Rejected,
    Offer,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Offer => "offer",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "applied" => Ok(ApplicationStatus::Applied),
            "interview" => Ok(ApplicationStatus::Interview),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "offer" => Ok(ApplicationStatus::Offer),
            other => Err(format!("unknown application status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    CompanyName,
    JobTitle,
    Location,
    Description,
    DescriptionPreview,
}

impl FieldName {
    pub const ALL: [FieldName; 5] = [
        FieldName::CompanyName,
        FieldName::JobTitle,
        FieldName::Location,
        FieldName::Description,
        FieldName::DescriptionPreview,
    ];
}

/// Fields pulled out of a posting page. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub description_preview: Option<String>,
}

impl ExtractedFields {
    pub fn get(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::CompanyName => self.company_name.as_deref(),
            FieldName::JobTitle => self.job_title.as_deref(),
            FieldName::Location => self.location.as_deref(),
            FieldName::Description => self.description.as_deref(),
            FieldName::DescriptionPreview => self.description_preview.as_deref(),
        }
    }

    fn slot(&mut self, field: FieldName) -> &mut Option<String> {
        match field {
            FieldName::CompanyName => &mut self.company_name,
            FieldName::JobTitle => &mut self.job_title,
            FieldName::Location => &mut self.location,
            FieldName::Description => &mut self.description,
            FieldName::DescriptionPreview => &mut self.description_preview,
        }
    }

    /// Copies every field of `other` that is absent here.
    pub fn fill_missing(&mut self, mut other: ExtractedFields) {
        for field in FieldName::ALL {
            let slot = self.slot(field);
            if slot.is_none() {
                *slot = other.slot(field).take();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        FieldName::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// Raw page captured at fetch time, kept for offline viewing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub html: String,
    pub final_url: String,
    pub captured_at: DateTime<Utc>,
}

/// Auto-extracted candidate data returned before anything is stored.
#[derive(Debug, Clone, Serialize)]
pub struct PostingPreview {
    pub source: PostingSource,
    pub url: String,
    pub external_id: Option<String>,
    #[serde(flatten)]
    pub fields: ExtractedFields,
    pub suggested_titles: Vec<String>,
    pub strategy: Strategy,
    pub fallback_reason: Option<String>,
    #[serde(skip)]
    pub snapshot: Snapshot,
}

/// Opaque identifier handed out by the storage collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostingId(pub i64);

impl fmt::Display for PostingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedPosting {
    pub company_name: String,
    pub job_title: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub job_url: String,
    pub source: PostingSource,
    pub external_id: Option<String>,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostingRecord {
    pub id: PostingId,
    #[serde(flatten)]
    pub posting: ConfirmedPosting,
    pub has_snapshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Title,
    Company,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionEntry {
    pub kind: FieldKind,
    pub value: String,
    pub used_at: DateTime<Utc>,
}
