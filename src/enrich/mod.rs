use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tracing::Instrument;

use crate::config::AiConfig;
use crate::store::{FeedRecord, RecordId, TagSource};
use crate::telemetry::{self};
use crate::telemetry::ops::enrich::Phase as EnrichPhase;

mod backend;
mod fallback;
mod prompt;
pub mod types;

pub use backend::{build_backend, BackendError, LlmBackend, OfflineBackend, ReasoningBackend};
pub use fallback::{normalize_tags, synthesize_tags};
pub use types::{
    CategoryAssignment, CategoryMap, EnrichSummary, RecordSummary, TagBatchResponse,
    CATEGORIZE_EXCERPT_CHARS, TAG_BATCH_SIZE, TAG_EXCERPT_CHARS,
};

#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub backend_timeout: Duration,
}

impl From<&AiConfig> for EnrichOptions {
    fn from(ai: &AiConfig) -> Self {
        Self { backend_timeout: Duration::from_secs(ai.timeout_secs) }
    }
}

/// Categorize and tag every successfully fetched record in place.
///
/// Pass one asks the backend for a category map over all records; any
/// failure there sends everything to `Uncategorized`. Pass two tags each
/// category in batches of `TAG_BATCH_SIZE`, concurrently; a failed batch
/// gets synthesized tags for its own records only. Failed records are
/// never touched, and nothing here returns an error.
pub async fn enrich(
    records: &mut [FeedRecord],
    backend: &dyn ReasoningBackend,
    opts: &EnrichOptions,
) -> EnrichSummary {
    let log = telemetry::enrich();
    let ids: Vec<RecordId> = records.iter().filter(|r| r.is_success()).map(|r| r.id).collect();
    let _g = log.root_span_kv([
        ("backend", backend.name().to_string()),
        ("records", ids.len().to_string()),
    ]).entered();

    if ids.is_empty() {
        log.info("ℹ️  No fetched feeds to enrich");
        return EnrichSummary::default();
    }

    let overview: Vec<RecordSummary> = records
        .iter()
        .filter(|r| r.is_success())
        .map(|r| RecordSummary::of(r, CATEGORIZE_EXCERPT_CHARS))
        .collect();
    let assignment = categorize(backend, &overview, &ids, opts.backend_timeout)
        .instrument(log.span(&EnrichPhase::Categorize))
        .await;

    let details: HashMap<RecordId, RecordSummary> = records
        .iter()
        .filter(|r| r.is_success())
        .map(|r| (r.id, RecordSummary::of(r, TAG_EXCERPT_CHARS)))
        .collect();
    let batches = assignment.batches(TAG_BATCH_SIZE);
    log.info(format!(
        "🗂️  {} feeds in {} categories, tagging in {} batches",
        ids.len(), assignment.len(), batches.len()
    ));

    let timeout = opts.backend_timeout;
    let calls = batches.iter().map(|batch| {
        let items: Vec<RecordSummary> = batch.ids.iter().filter_map(|id| details.get(id).cloned()).collect();
        let span = log.span_kv(&EnrichPhase::TagBatch, [
            ("category", batch.category.clone()),
            ("size", items.len().to_string()),
        ]);
        async move { bounded(timeout, backend.tag_batch(&batch.category, &items)).await }.instrument(span)
    });
    let outcomes = join_all(calls).await;

    let _m = log.span(&EnrichPhase::Merge).entered();
    let mut summary = EnrichSummary {
        categorized: ids.len(),
        categories: assignment.len(),
        categorization_fell_back: assignment.fell_back(),
        ..EnrichSummary::default()
    };
    let mut assigned: HashMap<RecordId, (String, Vec<String>, TagSource)> = HashMap::new();
    for (batch, outcome) in batches.iter().zip(outcomes) {
        let response = match outcome {
            Ok(response) => Some(response),
            Err(e) => {
                summary.failed_batches += 1;
                let _f = log.span(&EnrichPhase::Fallback).entered();
                log.warn_kv(
                    &format!("⚠️  Tagging failed for '{}', using local tags: {}", batch.category, e),
                    [("category", batch.category.clone()), ("size", batch.ids.len().to_string())],
                );
                None
            }
        };
        for id in &batch.ids {
            let ai_tags = response
                .as_ref()
                .map(|r| normalize_tags(r.tags_for(*id)))
                .filter(|tags| !tags.is_empty());
            let (tags, source) = match ai_tags {
                Some(tags) => {
                    summary.tagged_by_ai += 1;
                    (tags, TagSource::Ai)
                }
                None => {
                    summary.tagged_by_fallback += 1;
                    let title = details.get(id).map(|s| s.title.as_str()).unwrap_or_default();
                    (synthesize_tags(&batch.category, title), TagSource::Fallback)
                }
            };
            assigned.insert(*id, (batch.category.clone(), tags, source));
        }
    }

    for record in records.iter_mut() {
        if let Some((category, tags, source)) = assigned.remove(&record.id) {
            record.assign(category, tags, source);
        }
    }

    log.summary(&summary);
    summary
}

async fn categorize(
    backend: &dyn ReasoningBackend,
    overview: &[RecordSummary],
    ids: &[RecordId],
    timeout: Duration,
) -> CategoryAssignment {
    let log = telemetry::enrich();
    match bounded(timeout, backend.categorize(overview)).await {
        Ok(map) => {
            let assignment = CategoryAssignment::resolve(&map, ids);
            if assignment.fell_back() {
                log.warn("⚠️  Category map named none of our feeds, all feeds go to Uncategorized");
            } else if let Some(missing) = assignment.members(crate::store::UNCATEGORIZED) {
                log.debug(format!("{} feeds left out of the category map", missing.len()));
            }
            assignment
        }
        Err(e) => {
            log.warn(format!("⚠️  Categorization failed, all feeds go to Uncategorized: {e}"));
            CategoryAssignment::uncategorized(ids)
        }
    }
}

async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout)),
    }
}
