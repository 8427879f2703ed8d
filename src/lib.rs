//! Job-posting capture: fetch a posting URL, extract its fields, let the user
//! review them, and keep the confirmed posting with a snapshot of the page.

pub mod classifier;
pub mod config;
pub mod confirm;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod suggest;
pub mod text;

pub use confirm::{Confirmer, PostingEdits};
pub use db::{Database, PostingStore};
pub use error::{ExtractionError, FetchError, FetchErrorKind, OrchestrationError};
pub use fetcher::{Fetcher, PageFetcher, RawFetchResult};
pub use orchestrator::Orchestrator;
pub use suggest::SuggestionIndex;
