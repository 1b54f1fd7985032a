use serde::Serialize;

use crate::store::{FailureKind, FeedRecordStore};

#[derive(Serialize)]
pub struct FailedFeed { pub id: usize, pub name: String, pub url: String, pub kind: FailureKind, pub message: String }

#[derive(Serialize)]
pub struct FetchReport { pub total: usize, pub succeeded: usize, pub failed: usize, pub failures: Vec<FailedFeed> }

impl FetchReport {
    pub fn from_store(store: &FeedRecordStore) -> Self {
        let counts = store.counts();
        let failures = store
            .failed()
            .filter_map(|r| r.failure().map(|f| FailedFeed {
                id: r.id,
                name: r.reference.name.clone(),
                url: r.reference.url.clone(),
                kind: f.kind,
                message: f.message.clone(),
            }))
            .collect();
        FetchReport { total: counts.total, succeeded: counts.succeeded, failed: counts.failed, failures }
    }
}
