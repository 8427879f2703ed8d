//! Site-specific field extraction with a generic fallback.
//!
//! The strategy set is closed: one variant per job board plus `Generic`,
//! chosen from the URL classification. A site strategy that does not
//! recognise the page hands over to `Generic`, which never fails.

pub mod generic;
pub mod glassdoor;
pub mod indeed;
pub mod linkedin;
pub mod structured;

use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::classifier::classify;
use crate::error::ExtractionError;
use crate::fetcher::RawFetchResult;
use crate::models::{ExtractedFields, PostingSource};
use crate::text::{any_match, select_block, select_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    LinkedIn,
    Glassdoor,
    Indeed,
    Generic,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::LinkedIn => "linkedin",
            Strategy::Glassdoor => "glassdoor",
            Strategy::Indeed => "indeed",
            Strategy::Generic => "generic",
        })
    }
}

/// Selector knowledge for one job board.
pub struct SiteRules {
    pub source: PostingSource,
    /// At least one must be present for the page to count as a posting.
    pub markers: &'static [&'static str],
    /// Presence of any of these means the rendered page has settled.
    pub ready: &'static [&'static str],
    /// "Show more" controls to click before capturing the page.
    pub expand: &'static [&'static str],
    pub title: &'static [&'static str],
    pub company: &'static [&'static str],
    pub location: &'static [&'static str],
    pub description: &'static [&'static str],
    /// Site-specific touch-ups applied after selection.
    pub tidy: fn(&mut ExtractedFields),
}

const GENERIC_READY: &[&str] = &["body"];

impl Strategy {
    pub fn for_source(source: PostingSource) -> Self {
        match source {
            PostingSource::LinkedIn => Strategy::LinkedIn,
            PostingSource::Glassdoor => Strategy::Glassdoor,
            PostingSource::Indeed => Strategy::Indeed,
            PostingSource::Unknown => Strategy::Generic,
        }
    }

    fn rules(self) -> Option<&'static SiteRules> {
        match self {
            Strategy::LinkedIn => Some(&linkedin::RULES),
            Strategy::Glassdoor => Some(&glassdoor::RULES),
            Strategy::Indeed => Some(&indeed::RULES),
            Strategy::Generic => None,
        }
    }

    pub fn ready_selectors(self) -> &'static [&'static str] {
        self.rules().map_or(GENERIC_READY, |rules| rules.ready)
    }

    pub fn expand_selectors(self) -> &'static [&'static str] {
        self.rules().map_or(&[], |rules| rules.expand)
    }

    /// Runs this strategy alone. Only site strategies can fail.
    pub fn extract(self, page: &RawFetchResult) -> Result<ExtractedFields, ExtractionError> {
        let document = Html::parse_document(&page.html);
        match self.rules() {
            Some(rules) => extract_site(rules, &document),
            None => Ok(generic::extract(&document)),
        }
    }
}

/// Outcome of extraction, including which strategy produced the fields.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub fields: ExtractedFields,
    pub strategy: Strategy,
    pub fallback: Option<ExtractionError>,
}

/// Picks the strategy for `source` and falls back to `Generic` on any site failure.
pub fn extract(source: PostingSource, page: &RawFetchResult) -> Extraction {
    let strategy = Strategy::for_source(source);
    let document = Html::parse_document(&page.html);

    let outcome = match strategy.rules() {
        None => {
            return Extraction {
                fields: generic::extract(&document),
                strategy,
                fallback: None,
            };
        }
        Some(_) if classify(page.final_url.as_str()) != source => Err(ExtractionError::Unsupported {
            site: source,
            url: page.final_url.to_string(),
        }),
        Some(rules) => extract_site(rules, &document),
    };

    match outcome {
        Ok(fields) => Extraction {
            fields,
            strategy,
            fallback: None,
        },
        Err(err) => {
            warn!(url = %page.final_url, error = %err, "site extractor gave up, using generic fallback");
            Extraction {
                fields: generic::extract(&document),
                strategy: Strategy::Generic,
                fallback: Some(err),
            }
        }
    }
}

fn extract_site(rules: &SiteRules, document: &Html) -> Result<ExtractedFields, ExtractionError> {
    if !looks_like_html(document) {
        return Err(ExtractionError::UnrecognizedLayout {
            site: rules.source,
            reason: "content is not an HTML page".to_string(),
        });
    }

    let structured = structured::job_posting(document);
    if structured.is_none() && !any_match(document, rules.markers) {
        return Err(ExtractionError::UnrecognizedLayout {
            site: rules.source,
            reason: "no posting markers found".to_string(),
        });
    }

    let mut fields = ExtractedFields {
        company_name: select_text(document, rules.company),
        job_title: select_text(document, rules.title),
        location: select_text(document, rules.location),
        description: select_block(document, rules.description),
        description_preview: None,
    };
    (rules.tidy)(&mut fields);
    if let Some(data) = structured {
        fields.fill_missing(data.into_fields());
    }

    debug!(
        source = %rules.source,
        title = fields.job_title.is_some(),
        company = fields.company_name.is_some(),
        description = fields.description.is_some(),
        "site extraction finished"
    );
    Ok(fields)
}

fn looks_like_html(document: &Html) -> bool {
    Selector::parse("body *, head title")
        .map(|selector| document.select(&selector).next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use url::Url;

    use crate::fetcher::RawFetchResult;

    pub fn page(url: &str, html: &str) -> RawFetchResult {
        RawFetchResult {
            html: html.to_string(),
            final_url: Url::parse(url).unwrap(),
            fetched_at: Utc::now(),
            status: Some(200),
            rendered: false,
        }
    }

    pub const LINKEDIN_URL: &str = "https://www.linkedin.com/jobs/view/123456789/";

    pub const LINKEDIN_GUEST: &str = r#"<!DOCTYPE html>
<html><head><title>Acme Corp hiring Senior Backend Engineer in Toronto | LinkedIn</title></head>
<body>
  <section class="top-card-layout">
    <h1 class="top-card-layout__title topcard__title">Senior Backend Engineer</h1>
    <h4 class="top-card-layout__second-subline">
      <span class="topcard__flavor"><a class="topcard__org-name-link" href="/company/acme">  Acme Corp </a></span>
      <span class="topcard__flavor topcard__flavor--bullet">Toronto, Ontario, Canada</span>
    </h4>
  </section>
  <div class="show-more-less-html__markup">
    <p>We are hiring a backend engineer.</p>
    <ul><li>Rust</li><li>PostgreSQL</li></ul>
  </div>
</body></html>"#;

    pub const CAPTCHA_PAGE: &str = r#"<html><head><title>Just a moment...</title></head>
<body><div id="challenge-form"><p>Please verify you are a human.</p></div></body></html>"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_linkedin_page_uses_site_strategy() {
        let outcome = extract(PostingSource::LinkedIn, &page(LINKEDIN_URL, LINKEDIN_GUEST));
        assert_eq!(outcome.strategy, Strategy::LinkedIn);
        assert!(outcome.fallback.is_none());
        assert_eq!(outcome.fields.job_title.as_deref(), Some("Senior Backend Engineer"));
        assert_eq!(outcome.fields.company_name.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn test_restructured_page_falls_back_to_generic() {
        let outcome = extract(PostingSource::Indeed, &page("https://www.indeed.com/viewjob?jk=1", CAPTCHA_PAGE));
        assert_eq!(outcome.strategy, Strategy::Generic);
        assert!(matches!(
            outcome.fallback,
            Some(ExtractionError::UnrecognizedLayout { site: PostingSource::Indeed, .. })
        ));
        assert_eq!(outcome.fields.job_title.as_deref(), Some("Just a moment..."));
    }

    #[test]
    fn test_redirect_off_site_is_unsupported() {
        let outcome = extract(
            PostingSource::LinkedIn,
            &page("https://www.linkedin.com/authwall?trk=qf", LINKEDIN_GUEST),
        );
        assert_eq!(outcome.strategy, Strategy::Generic);
        assert!(matches!(outcome.fallback, Some(ExtractionError::Unsupported { .. })));
    }

    #[test]
    fn test_non_html_content_never_fails() {
        for body in ["", "{\"error\":\"rate limited\"}", "plain text body"] {
            let raw = page(LINKEDIN_URL, body);
            assert!(matches!(
                Strategy::LinkedIn.extract(&raw),
                Err(ExtractionError::UnrecognizedLayout { .. })
            ));
            let outcome = extract(PostingSource::LinkedIn, &raw);
            assert_eq!(outcome.strategy, Strategy::Generic);
        }
    }

    #[test]
    fn test_every_source_maps_to_a_strategy() {
        assert_eq!(Strategy::for_source(PostingSource::Unknown), Strategy::Generic);
        assert_eq!(Strategy::Generic.ready_selectors(), &["body"]);
        assert!(Strategy::Generic.expand_selectors().is_empty());
        for source in [PostingSource::LinkedIn, PostingSource::Glassdoor, PostingSource::Indeed] {
            let strategy = Strategy::for_source(source);
            assert!(!strategy.ready_selectors().is_empty());
        }
    }
}
