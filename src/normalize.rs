//! Cleans extracted fields and derives the description preview.

use crate::models::ExtractedFields;
use crate::text::{collapse_whitespace, strip_markup};

pub const DEFAULT_PREVIEW_CHARS: usize = 500;

const ELLIPSIS: &str = "...";
/// Upper bound on decode passes; each pass that changes the text shortens it.
const MAX_DECODE_PASSES: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    preview_chars: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

impl Normalizer {
    pub fn new(preview_chars: usize) -> Self {
        Self {
            preview_chars: preview_chars.max(ELLIPSIS.len() + 1),
        }
    }

    pub fn preview_chars(&self) -> usize {
        self.preview_chars
    }

    pub fn normalize(&self, fields: ExtractedFields) -> ExtractedFields {
        let description = fields.description.as_deref().and_then(clean_paragraphs);
        let preview_source = match &description {
            Some(text) => Some(collapse_whitespace(text)),
            None => fields.description_preview.as_deref().and_then(clean_line),
        };

        ExtractedFields {
            company_name: fields.company_name.as_deref().and_then(clean_line),
            job_title: fields.job_title.as_deref().and_then(clean_line),
            location: fields.location.as_deref().and_then(clean_line),
            description_preview: preview_source.map(|text| truncate_words(&text, self.preview_chars)),
            description,
        }
    }
}

/// Normalizes with the default preview cutoff.
pub fn normalize(fields: ExtractedFields) -> ExtractedFields {
    Normalizer::default().normalize(fields)
}

/// Single-line clean: markup stripped, whitespace collapsed, empty → `None`.
pub fn clean_line(text: &str) -> Option<String> {
    let cleaned = collapse_whitespace(&decode_until_stable(text));
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Multi-line clean: keeps paragraph breaks, at most one blank line between paragraphs.
pub fn clean_paragraphs(text: &str) -> Option<String> {
    let decoded = decode_until_stable(text);
    let mut out = String::new();
    let mut blank_run = false;

    for line in decoded.lines() {
        let line = collapse_whitespace(line);
        if line.is_empty() {
            blank_run = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = false;
    }

    (!out.is_empty()).then_some(out)
}

fn decode_until_stable(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        let next = strip_markup(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Cuts `text` to at most `max_chars` characters, ending on a word boundary
/// followed by an ellipsis. Text that already fits is returned unchanged.
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let budget = max_chars.saturating_sub(ELLIPSIS.len());
    let head: String = text.chars().take(budget).collect();
    let next_is_break = text
        .chars()
        .nth(budget)
        .is_some_and(char::is_whitespace);

    let cut = if next_is_break {
        head.trim_end().to_string()
    } else {
        match head.rfind(char::is_whitespace) {
            Some(idx) => head[..idx].trim_end().to_string(),
            // One word longer than the whole budget.
            None => head,
        }
    };
    format!("{}{}", cut, ELLIPSIS)
}
