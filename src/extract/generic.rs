//! Best-effort extraction for pages no site strategy understands.
//!
//! Never fails: every field it cannot find is simply left empty.

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::structured;
use crate::models::ExtractedFields;
use crate::text::{block_text, inline_text, select_meta, select_text};

static BOARD_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[-|–·]\s*(Indeed(\.com)?|LinkedIn|Glassdoor|Jobs?|Careers?)\b.*$").expect("valid regex")
});
static HIRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?) hiring (.+?)(?: in (.+))?$").expect("valid regex"));

/// Blocks shorter than this are navigation, cookie banners and the like.
const MIN_BLOCK_CHARS: usize = 80;

const TITLE_META: &[&str] = &["meta[property='og:title']", "meta[name='twitter:title']"];
const DESCRIPTION_META: &[&str] = &[
    "meta[name='description']",
    "meta[property='og:description']",
    "meta[name='twitter:description']",
];
const COMPANY_HINTS: &[&str] = &[
    "[data-testid*='company']",
    "[class*='company-name']",
    "[class*='employer']",
];
const LOCATION_HINTS: &[&str] = &["[data-testid*='location']", "[class*='job-location']"];

const CANDIDATE_BLOCKS: &str = "article, main, section, div, td";
const CHROME: &[&str] = &["nav", "header", "footer", "aside", "form"];
const TEXT_CARRIERS: &[&str] = &[
    "p", "ul", "ol", "blockquote", "pre", "h2", "h3", "h4", "h5", "h6", "span", "strong", "b",
    "em", "i", "a",
];

pub fn extract(document: &Html) -> ExtractedFields {
    let mut fields = structured::job_posting(document)
        .map(structured::JobPostingData::into_fields)
        .unwrap_or_default();

    if let Some(heading) = page_title(document) {
        let (title, company, location) = split_heading(&heading);
        fields.fill_missing(ExtractedFields {
            job_title: Some(title),
            company_name: company,
            location,
            ..Default::default()
        });
    }

    fields.fill_missing(ExtractedFields {
        company_name: select_text(document, COMPANY_HINTS),
        location: select_text(document, LOCATION_HINTS),
        description: largest_text_block(document).or_else(|| select_meta(document, DESCRIPTION_META)),
        ..Default::default()
    });
    fields
}

fn page_title(document: &Html) -> Option<String> {
    [
        select_meta(document, TITLE_META),
        select_text(document, &["head title", "title"]),
        select_text(document, &["h1"]),
    ]
    .into_iter()
    .flatten()
    .map(|raw| BOARD_SUFFIX.replace(&raw, "").trim().to_string())
    .find(|title| !title.is_empty())
}

/// Splits headings like "Title at Company", "Title - Company" or
/// "Company hiring Title in Place" into their parts.
fn split_heading(text: &str) -> (String, Option<String>, Option<String>) {
    let text = text.trim();

    if let Some(caps) = HIRING.captures(text) {
        let location = caps.get(3).map(|m| m.as_str().trim().to_string());
        return (caps[2].trim().to_string(), Some(caps[1].trim().to_string()), location);
    }

    // ASCII folding keeps byte offsets valid for slicing `text`.
    if let Some(idx) = text.to_ascii_lowercase().find(" at ") {
        let title = text[..idx].trim();
        let employer = text[idx + 4..].trim();
        if !title.is_empty() && looks_like_employer(employer) {
            return (title.to_string(), Some(employer.to_string()), None);
        }
    }

    for separator in [" - ", " – ", " | "] {
        if let Some(idx) = text.rfind(separator) {
            let title = text[..idx].trim();
            let employer = text[idx + separator.len()..].trim();
            if !title.is_empty() && looks_like_employer(employer) {
                return (title.to_string(), Some(employer.to_string()), None);
            }
        }
    }

    (text.to_string(), None, None)
}

fn looks_like_employer(text: &str) -> bool {
    let lower = text.to_lowercase();
    !text.is_empty()
        && text.chars().count() < 60
        && !["engineer", "developer", "remote", "hybrid", "manager"]
            .iter()
            .any(|word| lower.contains(word))
}

/// The element whose own paragraphs carry the most text.
fn largest_text_block(document: &Html) -> Option<String> {
    let selector = Selector::parse(CANDIDATE_BLOCKS).ok()?;
    document
        .select(&selector)
        .filter(|el| !inside_chrome(*el))
        .map(|el| (own_text_weight(el), el))
        .filter(|(weight, _)| *weight >= MIN_BLOCK_CHARS)
        .max_by_key(|(weight, _)| *weight)
        .map(|(_, el)| block_text(el))
}

fn inside_chrome(element: ElementRef) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|el| CHROME.contains(&el.name()))
    })
}

fn own_text_weight(element: ElementRef) -> usize {
    element
        .children()
        .map(|child| match child.value() {
            Node::Text(text) => text.trim().chars().count(),
            Node::Element(el) if TEXT_CARRIERS.contains(&el.name()) => ElementRef::wrap(child)
                .map(|child| inline_text(child).chars().count())
                .unwrap_or(0),
            _ => 0,
        })
        .sum()
}
