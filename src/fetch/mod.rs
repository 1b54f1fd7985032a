use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::FetchingConfig;
use crate::store::{FeedMetadata, FeedRecord, FeedReference, FetchStatus};
use crate::telemetry::{self};
use crate::telemetry::ops::fetch::Phase as FetchPhase;

mod error;
mod parse;
mod source;
pub mod types;

pub use error::FetchError;
pub use source::{FeedSource, HttpFeedSource};

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl From<&FetchingConfig> for FetchOptions {
    fn from(cfg: &FetchingConfig) -> Self {
        Self { timeout: Duration::from_secs(cfg.timeout_secs), max_concurrent: cfg.max_concurrent }
    }
}

/// Fetch every reference concurrently, at most `max_concurrent` in flight.
/// Returns one record per reference in input order; failures are recorded
/// on the record, never returned as errors.
pub async fn fetch_all(
    source: Arc<dyn FeedSource>,
    references: &[FeedReference],
    opts: FetchOptions,
) -> Vec<FeedRecord> {
    let log = telemetry::fetch();
    let _g = log.root_span_kv([
        ("feeds", references.len().to_string()),
        ("max_concurrent", opts.max_concurrent.to_string()),
        ("timeout_ms", opts.timeout.as_millis().to_string()),
    ]).entered();

    if references.is_empty() { return Vec::new(); }

    let permits = Arc::new(Semaphore::new(opts.max_concurrent.clamp(1, Semaphore::MAX_PERMITS)));
    let mut tasks: JoinSet<(usize, FeedRecord)> = JoinSet::new();

    {
        let _d = log.span(&FetchPhase::Dispatch).entered();
        for (id, reference) in references.iter().cloned().enumerate() {
            let source = Arc::clone(&source);
            let permits = Arc::clone(&permits);
            let span = log.span(&FetchPhase::Retrieve);
            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => retrieve(source.as_ref(), &reference.url, opts.timeout).await,
                    Err(_) => Err(FetchError::Transport("fetch scheduler closed".into())),
                };
                let record = match outcome {
                    Ok(meta) => FeedRecord::succeeded(id, reference, meta),
                    Err(err) => FeedRecord::failed(id, reference, err.into_failure()),
                };
                (id, record)
            }.instrument(span));
        }
    }

    let _c = log.span(&FetchPhase::Collect).entered();
    let mut records: Vec<FeedRecord> = references
        .iter()
        .cloned()
        .enumerate()
        .map(|(id, reference)| FeedRecord::pending(id, reference))
        .collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, record)) => records[id] = record,
            Err(e) => log.warn(format!("⚠️  fetch task ended abnormally: {e}")),
        }
    }
    // a task that died never reported back; its record must not stay pending
    for r in records.iter_mut().filter(|r| matches!(r.status, FetchStatus::Pending)) {
        r.status = FetchStatus::Failed(FetchError::Transport("fetch task aborted".into()).into_failure());
    }

    let mut succeeded = 0usize;
    for r in &records {
        match r.failure() {
            None => { succeeded += 1; log.debug_kv("✅ fetched", [("id", r.id.to_string()), ("title", r.display_title().to_string())]); }
            Some(f) => log.warn_kv(&format!("❌ {} — {}", r.reference.name, f.message), [("id", r.id.to_string()), ("url", r.reference.url.clone())]),
        }
    }
    log.totals(succeeded, records.len() - succeeded);
    records
}

async fn retrieve(source: &dyn FeedSource, url: &str, timeout: Duration) -> Result<FeedMetadata, FetchError> {
    // bound the whole retrieval, not only what the source enforces itself
    let body = match tokio::time::timeout(timeout, source.get(url, timeout)).await {
        Ok(res) => res?,
        Err(_) => return Err(FetchError::Timeout(timeout)),
    };
    parse::parse_feed(&body)
}
