use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::store::{FeedRecord, RecordId, UNCATEGORIZED};

/// Fixed by what backends reliably return within their output limits.
pub const TAG_BATCH_SIZE: usize = 25;
pub const CATEGORIZE_EXCERPT_CHARS: usize = 300;
pub const TAG_EXCERPT_CHARS: usize = 200;

/// What a backend gets to see about one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub id: RecordId,
    pub title: String,
    pub description: String,
}

impl RecordSummary {
    pub fn of(record: &FeedRecord, max_chars: usize) -> Self {
        Self {
            id: record.id,
            title: record.display_title().to_string(),
            description: excerpt(record.description().unwrap_or("No description available"), max_chars),
        }
    }
}

pub fn excerpt(s: &str, max_chars: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max_chars { return s.to_string(); }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

/// Raw pass-1 answer: category name to ids, as the backend returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap(pub BTreeMap<String, Vec<RecordId>>);

/// Validated pass-1 result. Every input id sits in exactly one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryAssignment {
    by_category: BTreeMap<String, Vec<RecordId>>,
    fell_back: bool,
}

impl CategoryAssignment {
    /// Unknown ids are dropped, an id claimed twice stays with the first
    /// category in name order, ids nobody claimed go to `Uncategorized`.
    pub fn resolve(map: &CategoryMap, ids: &[RecordId]) -> Self {
        let known: HashSet<RecordId> = ids.iter().copied().collect();
        let mut owner: HashMap<RecordId, &str> = HashMap::new();
        for (name, members) in &map.0 {
            for id in members.iter().filter(|id| known.contains(id)) {
                owner.entry(*id).or_insert(name.as_str());
            }
        }
        if owner.is_empty() { return Self::uncategorized(ids); }

        let mut by_category: BTreeMap<String, Vec<RecordId>> = BTreeMap::new();
        for id in ids {
            let name = owner.get(id).copied().unwrap_or(UNCATEGORIZED);
            by_category.entry(name.to_string()).or_default().push(*id);
        }
        Self { by_category, fell_back: false }
    }

    pub fn uncategorized(ids: &[RecordId]) -> Self {
        let mut by_category = BTreeMap::new();
        if !ids.is_empty() { by_category.insert(UNCATEGORIZED.to_string(), ids.to_vec()); }
        Self { by_category, fell_back: true }
    }

    pub fn fell_back(&self) -> bool { self.fell_back }

    pub fn len(&self) -> usize { self.by_category.len() }

    pub fn members(&self, category: &str) -> Option<&[RecordId]> {
        self.by_category.get(category).map(Vec::as_slice)
    }

    #[cfg(test)]
    pub fn category_of(&self, id: RecordId) -> Option<&str> {
        self.by_category.iter().find(|(_, ids)| ids.contains(&id)).map(|(name, _)| name.as_str())
    }

    /// Pass-2 work units: one category per batch, at most `size` ids each.
    pub fn batches(&self, size: usize) -> Vec<TagBatch> {
        let size = size.max(1);
        self.by_category
            .iter()
            .flat_map(|(category, ids)| {
                ids.chunks(size).map(move |chunk| TagBatch { category: category.clone(), ids: chunk.to_vec() })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBatch {
    pub category: String,
    pub ids: Vec<RecordId>,
}

/// Raw pass-2 answer for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagBatchResponse(pub HashMap<RecordId, Vec<String>>);

impl TagBatchResponse {
    pub fn tags_for(&self, id: RecordId) -> &[String] {
        self.0.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    pub categorized: usize,
    pub categories: usize,
    pub tagged_by_ai: usize,
    pub tagged_by_fallback: usize,
    pub categorization_fell_back: bool,
    pub failed_batches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &[RecordId])]) -> CategoryMap {
        CategoryMap(entries.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect())
    }

    #[test]
    fn missing_id_goes_to_uncategorized() {
        let a = CategoryAssignment::resolve(&map(&[("Tech", &[0, 1]), ("News", &[2])]), &[0, 1, 2, 3]);
        assert!(!a.fell_back());
        assert_eq!(a.category_of(3), Some(UNCATEGORIZED));
        assert_eq!(a.members("Tech"), Some(&[0, 1][..]));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn duplicates_and_unknown_ids_are_ignored() {
        let a = CategoryAssignment::resolve(&map(&[("Arts", &[1, 99]), ("Tech", &[1, 0])]), &[0, 1]);
        assert_eq!(a.category_of(1), Some("Arts"));
        assert_eq!(a.category_of(0), Some("Tech"));
        assert_eq!(a.category_of(99), None);
    }

    #[test]
    fn no_known_ids_is_a_fallback() {
        let a = CategoryAssignment::resolve(&map(&[("Tech", &[42])]), &[0, 1]);
        assert!(a.fell_back());
        assert_eq!(a.members(UNCATEGORIZED), Some(&[0, 1][..]));
    }

    #[test]
    fn batches_never_mix_categories() {
        let ids: Vec<RecordId> = (0..60).collect();
        let tech: Vec<RecordId> = (0..52).collect();
        let a = CategoryAssignment::resolve(&CategoryMap([("Tech".to_string(), tech)].into()), &ids);
        let batches = a.batches(TAG_BATCH_SIZE);
        let sizes: Vec<(String, usize)> = batches.iter().map(|b| (b.category.clone(), b.ids.len())).collect();
        assert_eq!(sizes, vec![
            ("Tech".to_string(), 25),
            ("Tech".to_string(), 25),
            ("Tech".to_string(), 2),
            (UNCATEGORIZED.to_string(), 8),
        ]);
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("  short  ", 10), "short");
        assert_eq!(excerpt("héllo wörld", 5), "héllo…");
    }
}
