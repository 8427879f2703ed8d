//! Text helpers shared by the extractors and the normalizer.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "footer", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section",
    "table", "tr", "ul",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Text of an element with whitespace runs collapsed to single spaces.
pub fn inline_text(element: ElementRef) -> String {
    collapse_whitespace(&block_text(element))
}

/// Text of an element with line breaks at block boundaries and `<br>`.
pub fn block_text(element: ElementRef) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    out
}

fn push_text(element: ElementRef, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }
    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_text(child, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-empty inline text among `selectors`, tried in order.
pub fn select_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .map(inline_text)
            .find(|text| !text.is_empty())
    })
}

/// First non-empty block text among `selectors`, tried in order.
pub fn select_block(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .map(block_text)
            .find(|text| !text.trim().is_empty())
    })
}

/// First non-empty `content` attribute among meta `selectors`.
pub fn select_meta(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .find(|text| !text.is_empty())
    })
}

pub fn any_match(document: &Html, selectors: &[&str]) -> bool {
    selectors.iter().any(|raw| {
        Selector::parse(raw)
            .map(|selector| document.select(&selector).next().is_some())
            .unwrap_or(false)
    })
}

/// Decodes entities and drops tags from a string that may carry stray markup,
/// keeping block boundaries as line breaks.
pub fn strip_markup(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.to_string();
    }
    let fragment = Html::parse_fragment(text);
    block_text(fragment.root_element())
}
