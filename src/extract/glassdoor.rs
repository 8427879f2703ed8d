use regex::Regex;
use std::sync::LazyLock;

use super::SiteRules;
use crate::models::{ExtractedFields, PostingSource};

static EMPLOYER_RATING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\d\.\d\s*★?\s*$").expect("valid regex"));

const TITLE: &[&str] = &[
    "h1[data-test='job-title']",
    "[data-test='job-title']",
    "[data-testid='job-title']",
    "h1[id^='jd-job-title']",
    ".jobview-header-job-title",
    "h1.job-title",
];

const COMPANY: &[&str] = &[
    "[data-test='employer-name']",
    "[data-testid='employer-name']",
    ".EmployerProfile_employerName__Xemli",
    ".jobview-header-employer-name",
    ".employer-name",
];

const LOCATION: &[&str] = &[
    "[data-test='location']",
    "[data-testid='location']",
    ".jobview-header-location",
    ".location",
];

const DESCRIPTION: &[&str] = &[
    "[data-test='job-description-content']",
    "[data-testid='job-description-content']",
    ".jobDescriptionContent",
    "#JobDescriptionContainer",
    ".job-description-content",
];

const MARKERS: &[&str] = &[
    "[data-test='job-title']",
    "[data-test='employer-name']",
    "[data-test='job-description-content']",
    ".jobDescriptionContent",
    "#JobDescriptionContainer",
];

pub static RULES: SiteRules = SiteRules {
    source: PostingSource::Glassdoor,
    markers: MARKERS,
    ready: MARKERS,
    expand: &[
        "button[data-test='show-more-cta']",
        "button[data-test='show-more']",
    ],
    title: TITLE,
    company: COMPANY,
    location: LOCATION,
    description: DESCRIPTION,
    tidy,
};

fn tidy(fields: &mut ExtractedFields) {
    if let Some(company) = fields.company_name.as_mut() {
        *company = EMPLOYER_RATING.replace(company, "").into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fixtures::page;
    use crate::extract::Strategy;

    const LISTING_URL: &str =
        "https://www.glassdoor.com/job-listing/senior-engineer-acme-corp-JV_IC1147401_KO0,15_KE16,25.htm?jl=1009";

    #[test]
    fn test_listing_page_with_rating() {
        let html = r#"<html><body>
          <div data-test="employer-name">Acme Corp 4.2 ★</div>
          <h1 data-test="job-title">Senior Engineer</h1>
          <div data-test="location">Chicago, IL</div>
          <div class="jobDescriptionContent"><div>Own the backend.</div></div>
        </body></html>"#;
        let fields = Strategy::Glassdoor.extract(&page(LISTING_URL, html)).unwrap();
        assert_eq!(fields.company_name.as_deref(), Some("Acme Corp"));
        assert_eq!(fields.job_title.as_deref(), Some("Senior Engineer"));
        assert_eq!(fields.location.as_deref(), Some("Chicago, IL"));
        assert!(fields.description.unwrap().contains("Own the backend."));
    }

    #[test]
    fn test_structured_data_fills_gaps() {
        let html = r#"<html><head><script type="application/ld+json">
          {"@type":"JobPosting","title":"Senior Engineer","hiringOrganization":{"name":"Acme Corp"},
           "jobLocation":{"address":{"addressLocality":"Chicago","addressRegion":"IL"}},
           "description":"&lt;p&gt;Own the backend.&lt;/p&gt;"}
        </script></head><body><div id="app"></div></body></html>"#;
        let fields = Strategy::Glassdoor.extract(&page(LISTING_URL, html)).unwrap();
        assert_eq!(fields.company_name.as_deref(), Some("Acme Corp"));
        assert_eq!(fields.location.as_deref(), Some("Chicago, IL"));
        assert!(fields.description.is_some());
    }
}
