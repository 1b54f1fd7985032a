use std::collections::BTreeMap;

use serde::Serialize;

pub type RecordId = usize;

pub const UNCATEGORIZED: &str = "Uncategorized";

/// One subscription entry as read from the OPML export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedReference {
    pub name: String,
    pub title: Option<String>,
    pub url: String,
}

impl FeedReference {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), title: None, url: url.into() }
    }
}

/// Channel-level metadata pulled out of a feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedMetadata {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Transport,
    HttpStatus,
    Malformed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport",
            FailureKind::HttpStatus => "http status",
            FailureKind::Malformed => "malformed feed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FetchStatus {
    Pending,
    Success(FeedMetadata),
    Failed(FetchFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrichment {
    pub category: String,
    pub tags: Vec<String>,
    pub tag_source: TagSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedRecord {
    pub id: RecordId,
    pub reference: FeedReference,
    pub status: FetchStatus,
    pub enrichment: Option<Enrichment>,
}

impl FeedRecord {
    pub fn pending(id: RecordId, reference: FeedReference) -> Self {
        Self { id, reference, status: FetchStatus::Pending, enrichment: None }
    }

    pub fn succeeded(id: RecordId, reference: FeedReference, meta: FeedMetadata) -> Self {
        Self { id, reference, status: FetchStatus::Success(meta), enrichment: None }
    }

    pub fn failed(id: RecordId, reference: FeedReference, failure: FetchFailure) -> Self {
        Self { id, reference, status: FetchStatus::Failed(failure), enrichment: None }
    }

    pub fn is_success(&self) -> bool { matches!(self.status, FetchStatus::Success(_)) }

    pub fn metadata(&self) -> Option<&FeedMetadata> {
        match &self.status { FetchStatus::Success(m) => Some(m), _ => None }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match &self.status { FetchStatus::Failed(f) => Some(f), _ => None }
    }

    /// Best available title: fetched channel title, then OPML title, then OPML name.
    pub fn display_title(&self) -> &str {
        self.metadata()
            .and_then(|m| m.title.as_deref())
            .or(self.reference.title.as_deref())
            .unwrap_or(&self.reference.name)
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata().and_then(|m| m.description.as_deref())
    }

    pub fn category(&self) -> Option<&str> {
        self.enrichment.as_ref().map(|e| e.category.as_str())
    }

    /// Replaces any previous enrichment. Returns false (and leaves the record
    /// untouched) when the fetch did not succeed.
    pub fn assign(&mut self, category: impl Into<String>, tags: Vec<String>, tag_source: TagSource) -> bool {
        if !self.is_success() { return false; }
        self.enrichment = Some(Enrichment { category: category.into(), tags, tag_source });
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Owns every record of a run, in subscription order.
#[derive(Debug, Default)]
pub struct FeedRecordStore {
    records: Vec<FeedRecord>,
}

impl FeedRecordStore {
    pub fn new(records: Vec<FeedRecord>) -> Self { Self { records } }

    pub fn records(&self) -> &[FeedRecord] { &self.records }

    pub fn records_mut(&mut self) -> &mut [FeedRecord] { &mut self.records }

    pub fn successful(&self) -> impl Iterator<Item = &FeedRecord> {
        self.records.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FeedRecord> {
        self.records.iter().filter(|r| r.failure().is_some())
    }

    pub fn counts(&self) -> StoreCounts {
        let succeeded = self.successful().count();
        let failed = self.failed().count();
        StoreCounts { total: self.records.len(), succeeded, failed }
    }

    /// Successful records keyed by category; records without enrichment land
    /// under `Uncategorized`. Input order is kept inside each group.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&FeedRecord>> {
        let mut groups: BTreeMap<&str, Vec<&FeedRecord>> = BTreeMap::new();
        for r in self.successful() {
            groups.entry(r.category().unwrap_or(UNCATEGORIZED)).or_default().push(r);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(id: usize, title: &str) -> FeedRecord {
        FeedRecord::succeeded(
            id,
            FeedReference::new(format!("ref-{id}"), format!("https://example.com/{id}.xml")),
            FeedMetadata { title: Some(title.into()), ..Default::default() },
        )
    }

    fn bad(id: usize) -> FeedRecord {
        FeedRecord::failed(
            id,
            FeedReference::new(format!("ref-{id}"), "http://invalid"),
            FetchFailure { kind: FailureKind::Transport, message: "transport: refused".into() },
        )
    }

    #[test]
    fn assign_refuses_failed_records() {
        let mut r = bad(0);
        assert!(!r.assign("News", vec!["news".into()], TagSource::Ai));
        assert!(r.enrichment.is_none());
    }

    #[test]
    fn assign_replaces_previous_enrichment() {
        let mut r = ok(0, "Acquired");
        assert!(r.assign("Business", vec!["business".into()], TagSource::Ai));
        assert!(r.assign("Technology", vec!["tech".into()], TagSource::Fallback));
        let e = r.enrichment.as_ref().unwrap();
        assert_eq!(e.category, "Technology");
        assert_eq!(e.tags, vec!["tech".to_string()]);
    }

    #[test]
    fn display_title_prefers_fetched_title() {
        let mut reference = FeedReference::new("Name", "https://x");
        reference.title = Some("Opml Title".into());
        let fetched = FeedRecord::succeeded(0, reference.clone(), FeedMetadata { title: Some("Feed".into()), ..Default::default() });
        assert_eq!(fetched.display_title(), "Feed");
        let failed = FeedRecord::failed(1, reference, FetchFailure { kind: FailureKind::Timeout, message: "timeout".into() });
        assert_eq!(failed.display_title(), "Opml Title");
    }

    #[test]
    fn counts_and_groups() {
        let mut a = ok(0, "A");
        a.assign("Tech", vec!["tech".into()], TagSource::Ai);
        let b = ok(1, "B");
        let store = FeedRecordStore::new(vec![a, b, bad(2)]);
        assert_eq!(store.counts(), StoreCounts { total: 3, succeeded: 2, failed: 1 });
        let groups = store.by_category();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["Tech", UNCATEGORIZED]);
        assert_eq!(groups[UNCATEGORIZED][0].id, 1);
    }
}
