use regex::Regex;
use std::sync::LazyLock;

use super::SiteRules;
use crate::models::{ExtractedFields, PostingSource};

static TRAILING_TOGGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\s*show (more|less)\s*)+$").expect("valid regex"));

// Guest view first, then the signed-in two-pane layout.
const TITLE: &[&str] = &[
    "h1.top-card-layout__title",
    ".topcard__title",
    ".job-details-jobs-unified-top-card__job-title",
    ".jobs-unified-top-card__job-title",
    "h1[data-testid='job-details-job-title']",
    "h1",
];

const COMPANY: &[&str] = &[
    "a.topcard__org-name-link",
    ".topcard__flavor a",
    ".job-details-jobs-unified-top-card__company-name a",
    ".job-details-jobs-unified-top-card__company-name",
    ".jobs-unified-top-card__company-name a",
    ".jobs-unified-top-card__company-name",
    "a[data-control-name='job_details_topcard_company_url']",
];

const LOCATION: &[&str] = &[
    ".topcard__flavor--bullet",
    ".job-details-jobs-unified-top-card__primary-description-container .tvm__text",
    ".job-details-jobs-unified-top-card__bullet",
    ".jobs-unified-top-card__bullet",
];

const DESCRIPTION: &[&str] = &[
    ".show-more-less-html__markup",
    ".description__text",
    ".jobs-description-content__text",
    ".jobs-box__html-content",
    "[data-testid='job-details-job-description']",
    ".jobs-description__content",
];

const MARKERS: &[&str] = &[
    ".top-card-layout__title",
    ".topcard__title",
    ".job-details-jobs-unified-top-card__job-title",
    ".jobs-unified-top-card__job-title",
    ".show-more-less-html__markup",
    ".jobs-description__content",
];

const EXPAND: &[&str] = &[
    "button.show-more-less-html__button--more",
    "button.jobs-description__footer-button",
];

pub static RULES: SiteRules = SiteRules {
    source: PostingSource::LinkedIn,
    markers: MARKERS,
    ready: MARKERS,
    expand: EXPAND,
    title: TITLE,
    company: COMPANY,
    location: LOCATION,
    description: DESCRIPTION,
    tidy,
};

fn tidy(fields: &mut ExtractedFields) {
    // "Toronto, ON · 3 weeks ago · 40 applicants"
    if let Some(location) = fields.location.as_mut() {
        if let Some((place, _)) = location.split_once('·') {
            *location = place.trim().to_string();
        }
    }
    if let Some(description) = fields.description.as_mut() {
        *description = TRAILING_TOGGLE.replace(description, "").into_owned();
    }
}
