//! schema.org `JobPosting` data embedded as JSON-LD.
//!
//! Most boards and many careers pages ship this block for search engines,
//! and it outlives markup redesigns, so every strategy consults it.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::trace;

use crate::models::ExtractedFields;
use crate::text::collapse_whitespace;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPostingData {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Usually HTML; the normalizer strips it.
    pub description: Option<String>,
}

impl JobPostingData {
    pub fn into_fields(self) -> ExtractedFields {
        ExtractedFields {
            company_name: self.company,
            job_title: self.title,
            location: self.location,
            description: self.description,
            description_preview: None,
        }
    }
}

/// First `JobPosting` object found in the page's JSON-LD scripts.
pub fn job_posting(document: &Html) -> Option<JobPostingData> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    document.select(&selector).find_map(|script| {
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => find_posting(&value).map(read_posting),
            Err(e) => {
                trace!(error = %e, "skipping unparsable JSON-LD block");
                None
            }
        }
    })
}

fn find_posting(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_posting),
        Value::Object(map) => {
            if is_job_posting(map.get("@type")) {
                return Some(value);
            }
            map.get("@graph").and_then(find_posting)
        }
        _ => None,
    }
}

fn is_job_posting(kind: Option<&Value>) -> bool {
    match kind {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("JobPosting"),
        Some(Value::Array(kinds)) => kinds.iter().any(|k| is_job_posting(Some(k))),
        _ => false,
    }
}

fn read_posting(posting: &Value) -> JobPostingData {
    JobPostingData {
        title: string_field(posting.get("title")),
        company: posting.get("hiringOrganization").and_then(named),
        location: location(posting),
        description: posting
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    let text = collapse_whitespace(value?.as_str()?);
    (!text.is_empty()).then_some(text)
}

/// A `name` property, or the value itself when it is a bare string.
fn named(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => string_field(Some(value)),
        Value::Object(_) => string_field(value.get("name")),
        Value::Array(items) => items.iter().find_map(named),
        _ => None,
    }
}

fn location(posting: &Value) -> Option<String> {
    let places: Vec<&Value> = match posting.get("jobLocation") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
        None => Vec::new(),
    };
    let found = places.into_iter().find_map(place_text);
    if found.is_some() {
        return found;
    }
    let remote = posting
        .get("jobLocationType")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("TELECOMMUTE"));
    remote.then(|| "Remote".to_string())
}

fn place_text(place: &Value) -> Option<String> {
    let address = match place {
        Value::String(_) => return string_field(Some(place)),
        Value::Object(map) => map.get("address").unwrap_or(place),
        _ => return None,
    };
    if address.is_string() {
        return string_field(Some(address));
    }

    let mut parts: Vec<String> = Vec::new();
    for key in ["addressLocality", "addressRegion", "addressCountry"] {
        let Some(part) = address.get(key).and_then(named) else {
            continue;
        };
        if !parts.iter().any(|p| p.eq_ignore_ascii_case(&part)) {
            parts.push(part);
        }
    }
    (!parts.is_empty()).then(|| parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(json: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><head><script type="application/ld+json">{}</script></head><body></body></html>"#,
            json
        ))
    }

    #[test]
    fn test_reads_plain_job_posting() {
        let doc = doc_with(
            r#"{"@context":"https://schema.org","@type":"JobPosting",
                "title":"Platform Engineer",
                "hiringOrganization":{"@type":"Organization","name":"Initech"},
                "jobLocation":{"@type":"Place","address":{"addressLocality":"Austin","addressRegion":"TX","addressCountry":"US"}},
                "description":"<p>Build things</p>"}"#,
        );
        let data = job_posting(&doc).unwrap();
        assert_eq!(data.title.as_deref(), Some("Platform Engineer"));
        assert_eq!(data.company.as_deref(), Some("Initech"));
        assert_eq!(data.location.as_deref(), Some("Austin, TX, US"));
        assert_eq!(data.description.as_deref(), Some("<p>Build things</p>"));
    }

    #[test]
    fn test_finds_posting_inside_graph_and_type_lists() {
        let doc = doc_with(
            r#"{"@graph":[{"@type":"WebPage"},{"@type":["JobPosting"],"title":"SRE",
                "hiringOrganization":"Globex","jobLocationType":"TELECOMMUTE"}]}"#,
        );
        let data = job_posting(&doc).unwrap();
        assert_eq!(data.title.as_deref(), Some("SRE"));
        assert_eq!(data.company.as_deref(), Some("Globex"));
        assert_eq!(data.location.as_deref(), Some("Remote"));
    }

    #[test]
    fn test_ignores_broken_and_unrelated_blocks() {
        assert_eq!(job_posting(&doc_with("{not json")), None);
        assert_eq!(job_posting(&doc_with(r#"{"@type":"Organization","name":"X"}"#)), None);
        assert_eq!(job_posting(&Html::parse_document("<p>nothing</p>")), None);
    }
}
