//! Maps posting URLs to the job board they belong to.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::models::PostingSource;

static LINKEDIN_JOB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/jobs/view/(?:[^/?#]*?-)?(\d{5,})").expect("valid regex"));
static GLASSDOOR_LISTING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)JV_(?:[A-Z]+)?(\d+)").expect("valid regex"));
static GLASSDOOR_OFFSETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_KO(\d+),(\d+)(?:_KE(\d+),(\d+))?").expect("valid regex"));

/// Classifies a raw URL. Never fails: anything unparsable or unmatched is `Unknown`.
pub fn classify(url: &str) -> PostingSource {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return PostingSource::Unknown;
    };
    classify_url(&parsed)
}

pub fn classify_url(url: &Url) -> PostingSource {
    let Some(host) = url.host_str() else {
        return PostingSource::Unknown;
    };
    let host = host.to_ascii_lowercase();
    let path = url.path().to_ascii_lowercase();
    let has_param = |names: &[&str]| {
        url.query_pairs()
            .any(|(k, v)| !v.is_empty() && names.iter().any(|n| k.eq_ignore_ascii_case(n)))
    };

    if host_has_label(&host, "linkedin") {
        if path.contains("/jobs/view/") || (path.starts_with("/jobs") && has_param(&["currentJobId"])) {
            return PostingSource::LinkedIn;
        }
    } else if host_has_label(&host, "indeed") {
        let job_path = ["/viewjob", "/m/viewjob", "/rc/clk", "/pagead/clk"]
            .iter()
            .any(|p| path.starts_with(p));
        if job_path || has_param(&["jk", "vjk"]) {
            return PostingSource::Indeed;
        }
    } else if host_has_label(&host, "glassdoor") {
        let job_path = path.contains("/job-listing/")
            || path.starts_with("/job/")
            || path.starts_with("/partner/joblisting.htm");
        if job_path || has_param(&["jl", "jobListingId"]) {
            return PostingSource::Glassdoor;
        }
    }

    PostingSource::Unknown
}

/// True when `label` is one of the dot-separated parts of `host`, so that
/// `ca.indeed.com` and `glassdoor.co.uk` match but `notindeed.com` does not.
fn host_has_label(host: &str, label: &str) -> bool {
    host.split('.').any(|part| part == label)
}

/// Fields that can be read off the URL alone, used to fill gaps the page left.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlHints {
    pub job_id: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub location: Option<String>,
}

pub fn url_hints(url: &Url, source: PostingSource) -> UrlHints {
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, v)| k.eq_ignore_ascii_case(name) && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_string())
    };

    match source {
        PostingSource::LinkedIn => UrlHints {
            job_id: LINKEDIN_JOB_ID
                .captures(url.path())
                .map(|c| c[1].to_string())
                .or_else(|| param("currentJobId")),
            ..Default::default()
        },
        PostingSource::Indeed => UrlHints {
            job_id: param("jk").or_else(|| param("vjk")),
            location: param("l"),
            ..Default::default()
        },
        PostingSource::Glassdoor => {
            let slug = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_default();
            let (job_title, company_name) = glassdoor_slug_fields(slug);
            UrlHints {
                job_id: param("jl")
                    .or_else(|| param("jobListingId"))
                    .or_else(|| GLASSDOOR_LISTING_ID.captures(slug).map(|c| c[1].to_string())),
                job_title,
                company_name,
                location: None,
            }
        }
        PostingSource::Unknown => UrlHints::default(),
    }
}

/// Glassdoor listing slugs look like `senior-engineer-acme-corp-JV_IC1_KO0,15_KE16,25.htm`:
/// `KO` gives the title's character range in the slug text, `KE` the employer's.
fn glassdoor_slug_fields(slug: &str) -> (Option<String>, Option<String>) {
    let Some(marker) = slug.find("-JV_") else {
        return (None, None);
    };
    let Some(caps) = GLASSDOOR_OFFSETS.captures(slug) else {
        return (None, None);
    };
    let text = &slug[..marker];
    let span = |start: Option<regex::Match>, end: Option<regex::Match>| -> Option<String> {
        let start: usize = start?.as_str().parse().ok()?;
        let end: usize = end?.as_str().parse().ok()?;
        let piece = text.get(start.min(end)..end.min(text.len()))?;
        let words: Vec<String> = piece
            .split('-')
            .filter(|w| !w.is_empty())
            .map(title_case)
            .collect();
        (!words.is_empty()).then(|| words.join(" "))
    };
    (
        span(caps.get(1), caps.get(2)),
        span(caps.get(3), caps.get(4)),
    )
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
