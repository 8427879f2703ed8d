//! Autocomplete over confirmed company names and job titles.
//!
//! Prefix lookups walk an ordered map keyed by the case-folded value;
//! substring lookups intersect through a character-bigram posting list.
//! Neither touches entries that cannot match, so query cost does not grow
//! with a full corpus scan. Writers take the lock only to insert, readers see
//! the state as of their read.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::models::{FieldKind, SuggestionEntry};

pub const MIN_QUERY_CHARS: usize = 2;
pub const DEFAULT_LIMIT: usize = 10;

/// Values written when the user never supplied one; not worth suggesting.
pub const PLACEHOLDER_COMPANY: &str = "Unknown Company";
pub const PLACEHOLDER_TITLE: &str = "Unknown Position";

#[derive(Debug)]
pub struct SuggestionIndex {
    limit: usize,
    state: RwLock<IndexState>,
}

#[derive(Debug, Default)]
struct IndexState {
    titles: KindIndex,
    companies: KindIndex,
}

impl IndexState {
    fn kind(&self, kind: FieldKind) -> &KindIndex {
        match kind {
            FieldKind::Title => &self.titles,
            FieldKind::Company => &self.companies,
        }
    }

    fn kind_mut(&mut self, kind: FieldKind) -> &mut KindIndex {
        match kind {
            FieldKind::Title => &mut self.titles,
            FieldKind::Company => &mut self.companies,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    folded: String,
    last_used: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct KindIndex {
    entries: Vec<Entry>,
    by_folded: BTreeMap<String, usize>,
    bigrams: HashMap<(char, char), Vec<usize>>,
}

impl KindIndex {
    fn insert(&mut self, value: &str, used_at: DateTime<Utc>) {
        let folded = fold(value);
        if let Some(&id) = self.by_folded.get(&folded) {
            let entry = &mut self.entries[id];
            if used_at >= entry.last_used {
                entry.last_used = used_at;
                entry.value = value.to_string();
            }
            return;
        }

        let id = self.entries.len();
        let grams: HashSet<(char, char)> = bigrams(&folded).collect();
        for gram in grams {
            self.bigrams.entry(gram).or_default().push(id);
        }
        self.by_folded.insert(folded.clone(), id);
        self.entries.push(Entry {
            value: value.to_string(),
            folded,
            last_used: used_at,
        });
    }

    fn prefix_matches(&self, query: &str) -> Vec<usize> {
        self.by_folded
            .range(query.to_string()..)
            .take_while(|(key, _)| key.starts_with(query))
            .map(|(_, id)| *id)
            .collect()
    }

    fn substring_matches(&self, query: &str) -> Vec<usize> {
        // The rarest bigram of the query bounds the candidate set.
        let candidates = bigrams(query)
            .map(|gram| self.bigrams.get(&gram).map(Vec::as_slice).unwrap_or(&[]))
            .min_by_key(|ids| ids.len())
            .unwrap_or(&[]);
        candidates
            .iter()
            .copied()
            .filter(|&id| {
                let folded = &self.entries[id].folded;
                folded.contains(query) && !folded.starts_with(query)
            })
            .collect()
    }

    fn rank(&self, mut ids: Vec<usize>) -> Vec<usize> {
        ids.sort_by(|&a, &b| {
            let (a, b) = (&self.entries[a], &self.entries[b]);
            b.last_used.cmp(&a.last_used).then_with(|| a.folded.cmp(&b.folded))
        });
        ids
    }
}

fn fold(value: &str) -> String {
    value.to_lowercase()
}

fn bigrams(text: &str) -> impl Iterator<Item = (char, char)> + '_ {
    text.chars().zip(text.chars().skip(1))
}

fn clean_value(value: &str) -> Option<String> {
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if value.is_empty()
        || value.eq_ignore_ascii_case(PLACEHOLDER_COMPANY)
        || value.eq_ignore_ascii_case(PLACEHOLDER_TITLE)
    {
        return None;
    }
    Some(value)
}

impl Default for SuggestionIndex {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl SuggestionIndex {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn from_corpus(entries: impl IntoIterator<Item = SuggestionEntry>, limit: usize) -> Self {
        let index = Self::new(limit);
        index.rebuild(entries);
        index
    }

    /// Replaces the whole index with `entries`, e.g. the storage corpus at startup.
    pub fn rebuild(&self, entries: impl IntoIterator<Item = SuggestionEntry>) {
        let mut fresh = IndexState::default();
        let mut count = 0usize;
        for entry in entries {
            if let Some(value) = clean_value(&entry.value) {
                fresh.kind_mut(entry.kind).insert(&value, entry.used_at);
                count += 1;
            }
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = fresh;
        debug!(entries = count, "suggestion index rebuilt");
    }

    /// Records a confirmed value; visible to every query that starts afterwards.
    pub fn insert(&self, kind: FieldKind, value: &str, used_at: DateTime<Utc>) {
        let Some(value) = clean_value(value) else {
            return;
        };
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.kind_mut(kind).insert(&value, used_at);
    }

    pub fn len(&self, kind: FieldKind) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.kind(kind).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len(FieldKind::Title) == 0 && self.len(FieldKind::Company) == 0
    }

    pub fn query(&self, text: &str, kind: FieldKind) -> Vec<String> {
        self.query_limited(text, kind, self.limit)
    }

    /// Prefix matches first, then substring matches, each most-recent first.
    pub fn query_limited(&self, text: &str, kind: FieldKind, limit: usize) -> Vec<String> {
        let query = fold(text.trim());
        if query.chars().count() < MIN_QUERY_CHARS || limit == 0 {
            return Vec::new();
        }

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let index = state.kind(kind);
        let mut ranked = index.rank(index.prefix_matches(&query));
        if ranked.len() < limit {
            ranked.extend(index.rank(index.substring_matches(&query)));
        }
        ranked
            .into_iter()
            .take(limit)
            .map(|id| index.entries[id].value.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn entry(kind: FieldKind, value: &str, minutes: i64) -> SuggestionEntry {
        SuggestionEntry {
            kind,
            value: value.to_string(),
            used_at: at(minutes),
        }
    }

    fn title_index() -> SuggestionIndex {
        SuggestionIndex::from_corpus(
            vec![
                entry(FieldKind::Title, "Software Engineer", 1),
                entry(FieldKind::Title, "Go Developer", 2),
                entry(FieldKind::Title, "Mongo Specialist", 3),
                entry(FieldKind::Title, "Golang Engineer", 4),
                entry(FieldKind::Company, "Google", 5),
            ],
            DEFAULT_LIMIT,
        )
    }

    #[test]
    fn test_prefix_ranks_before_substring() {
        let index = title_index();
        let results = index.query("go", FieldKind::Title);
        assert_eq!(results, vec!["Golang Engineer", "Go Developer", "Mongo Specialist"]);
        assert!(!results.contains(&"Software Engineer".to_string()));
    }

    #[test]
    fn test_query_is_case_insensitive_and_kind_scoped() {
        let index = title_index();
        assert_eq!(index.query("GOO", FieldKind::Company), vec!["Google"]);
        assert!(index.query("goo", FieldKind::Title).is_empty());
    }

    #[test]
    fn test_short_queries_return_nothing() {
        let index = title_index();
        assert!(index.query("g", FieldKind::Title).is_empty());
        assert!(index.query("  ", FieldKind::Title).is_empty());
        assert!(index.query("", FieldKind::Company).is_empty());
    }

    #[test]
    fn test_limit_caps_results() {
        let index = SuggestionIndex::new(2);
        for (i, title) in ["Data Analyst", "Data Engineer", "Data Scientist"].iter().enumerate() {
            index.insert(FieldKind::Title, title, at(i as i64));
        }
        assert_eq!(index.query("data", FieldKind::Title), vec!["Data Scientist", "Data Engineer"]);
        assert_eq!(index.query_limited("data", FieldKind::Title, 1), vec!["Data Scientist"]);
    }

    #[test]
    fn test_reinsert_bumps_recency_and_keeps_one_entry() {
        let index = title_index();
        index.insert(FieldKind::Title, "go developer", at(10));
        assert_eq!(index.len(FieldKind::Title), 4);
        assert_eq!(index.query("go", FieldKind::Title)[0], "go developer");
    }

    #[test]
    fn test_placeholders_are_not_indexed() {
        let index = SuggestionIndex::default();
        index.insert(FieldKind::Company, "Unknown Company", at(0));
        index.insert(FieldKind::Title, "  unknown position ", at(0));
        index.insert(FieldKind::Title, "   ", at(0));
        assert!(index.is_empty());
    }

    #[test]
    fn test_rebuild_replaces_previous_state() {
        let index = title_index();
        index.rebuild(vec![entry(FieldKind::Title, "Rust Engineer", 0)]);
        assert!(index.query("go", FieldKind::Title).is_empty());
        assert_eq!(index.query("ru", FieldKind::Title), vec!["Rust Engineer"]);
    }

    #[test]
    fn test_unicode_values_match() {
        let index = SuggestionIndex::default();
        index.insert(FieldKind::Company, "Zürich Insurance", at(0));
        assert_eq!(index.query("zü", FieldKind::Company), vec!["Zürich Insurance"]);
        assert_eq!(index.query("RICH", FieldKind::Company), vec!["Zürich Insurance"]);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let index = Arc::new(title_index());
        let writer = {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                for i in 0..200 {
                    index.insert(FieldKind::Title, &format!("Gopher {}", i), at(100 + i));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let results = index.query("go", FieldKind::Title);
                        assert!(results.len() <= DEFAULT_LIMIT);
                        assert!(results.iter().all(|r| r.to_lowercase().contains("go")));
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(index.len(FieldKind::Title), 204);
    }
}
