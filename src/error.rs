//! Typed failures of the extraction engine.
//!
//! Storage and CLI code keep using `anyhow`; these enums are what the engine
//! hands back to its callers.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::PostingSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    HttpError,
    Blocked,
    NetworkError,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::HttpError => "http error",
            FetchErrorKind::Blocked => "blocked",
            FetchErrorKind::NetworkError => "network error",
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind} fetching {url}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    /// HTTP status, when the server answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn timeout(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, url, message)
    }

    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NetworkError, url, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FetchErrorKind::Timeout
    }
}

/// Raised by a site strategy; always recovered by the generic fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("unrecognized {site} layout: {reason}")]
    UnrecognizedLayout { site: PostingSource, reason: String },

    #[error("no {site} strategy for {url}")]
    Unsupported { site: PostingSource, url: String },
}

/// The only failures `preview` reports to its caller.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),
}

impl OrchestrationError {
    /// Sub-kind for fetch failures, so a UI can tell "try again" from "blocked".
    pub fn fetch_kind(&self) -> Option<FetchErrorKind> {
        match self {
            OrchestrationError::FetchFailed(e) => Some(e.kind),
            OrchestrationError::InvalidUrl { .. } => None,
        }
    }
}
