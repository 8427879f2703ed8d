use regex::Regex;
use std::sync::LazyLock;

use super::SiteRules;
use crate::models::{ExtractedFields, PostingSource};

static TITLE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*-\s*job post$").expect("valid regex"));
static COMPANY_RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(\d(\.\d)?\s*out of 5 stars.*|\d\.\d\s*★?)$").expect("valid regex")
});

const TITLE: &[&str] = &[
    "h1[data-testid='jobsearch-JobInfoHeader-title']",
    "[data-testid='jobsearch-JobInfoHeader-title']",
    "h1.jobsearch-JobInfoHeader-title",
    ".jobsearch-JobInfoHeader-title",
    "[data-testid='job-title']",
    "h1",
];

const COMPANY: &[&str] = &[
    "[data-testid='inlineHeader-companyName'] a",
    "[data-testid='inlineHeader-companyName']",
    "[data-company-name='true']",
    "[data-testid='company-name']",
    "[data-testid='jobsearch-CompanyInfoContainer'] a",
    ".jobsearch-CompanyInfoWithoutHeaderImage a",
];

const LOCATION: &[&str] = &[
    "[data-testid='inlineHeader-companyLocation']",
    "[data-testid='job-location']",
    "[data-testid='jobsearch-JobInfoHeader-companyLocation']",
    ".jobsearch-JobInfoHeader-subtitle > div:last-child",
];

const DESCRIPTION: &[&str] = &[
    "#jobDescriptionText",
    "[data-testid='jobsearch-JobComponent-description']",
    ".jobsearch-JobComponent-description",
    "[data-testid='job-description']",
];

const MARKERS: &[&str] = &[
    "#jobDescriptionText",
    "[data-testid='jobsearch-JobInfoHeader-title']",
    ".jobsearch-JobInfoHeader-title",
    ".jobsearch-JobComponent",
];

pub static RULES: SiteRules = SiteRules {
    source: PostingSource::Indeed,
    markers: MARKERS,
    ready: &["#jobDescriptionText", "[data-testid='jobsearch-JobInfoHeader-title']"],
    expand: &[],
    title: TITLE,
    company: COMPANY,
    location: LOCATION,
    description: DESCRIPTION,
    tidy,
};

fn tidy(fields: &mut ExtractedFields) {
    if let Some(title) = fields.job_title.as_mut() {
        *title = TITLE_SUFFIX.replace(title, "").into_owned();
    }
    if let Some(company) = fields.company_name.as_mut() {
        *company = COMPANY_RATING.replace(company, "").into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fixtures::page;
    use crate::extract::Strategy;

    const VIEWJOB: &str = r#"<html><head><title>Rust Developer - Toronto, ON - Indeed.com</title></head><body>
      <div class="jobsearch-JobComponent">
        <h1 class="jobsearch-JobInfoHeader-title" data-testid="jobsearch-JobInfoHeader-title">
          <span>Rust Developer</span><span> - job post</span>
        </h1>
        <div data-testid="inlineHeader-companyName"><a href="/cmp/hooli">Hooli</a> 4.1 out of 5 stars</div>
        <div data-testid="inlineHeader-companyLocation">Toronto, ON</div>
        <div id="jobDescriptionText"><p>Write Rust.</p><p>Ship it.</p></div>
      </div>
    </body></html>"#;

    #[test]
    fn test_viewjob_page() {
        let fields = Strategy::Indeed
            .extract(&page("https://ca.indeed.com/viewjob?jk=abc", VIEWJOB))
            .unwrap();
        assert_eq!(fields.job_title.as_deref(), Some("Rust Developer"));
        assert_eq!(fields.company_name.as_deref(), Some("Hooli"));
        assert_eq!(fields.location.as_deref(), Some("Toronto, ON"));
        let description = fields.description.unwrap();
        assert!(description.contains("Write Rust."));
        assert!(description.contains("Ship it."));
    }

    #[test]
    fn test_rating_is_trimmed_from_company() {
        let mut fields = ExtractedFields {
            company_name: Some("Hooli 3.8 ★".into()),
            ..Default::default()
        };
        tidy(&mut fields);
        assert_eq!(fields.company_name.as_deref(), Some("Hooli"));
    }
}
