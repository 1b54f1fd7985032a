use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use tracing::Instrument;

use crate::config::{AppConfig, Overrides, Provider};
use crate::enrich::{self, EnrichOptions, EnrichSummary, ReasoningBackend};
use crate::fetch::types::FetchReport;
use crate::fetch::{self, FeedSource, FetchOptions, HttpFeedSource};
use crate::render;
use crate::store::{FeedRecordStore, FeedReference};
use crate::subscription;
use crate::telemetry::{self};
use crate::telemetry::ops::organize::Phase as OrganizePhase;

#[derive(Args, Debug)]
pub struct OrganizeCmd {
    /// OPML export from your podcast app
    pub input: PathBuf,
    /// Markdown file to write (default from config, else podcasts.md)
    #[arg(short, long)] pub output: Option<PathBuf>,
    /// Only process the first N feeds (0 = all)
    #[arg(long, default_value_t = 0)] pub limit: usize,
    /// Per-feed fetch timeout in seconds
    #[arg(long)] pub timeout: Option<u64>,
    #[arg(long)] pub max_concurrent: Option<usize>,
    #[arg(long, value_enum)] pub provider: Option<Provider>,
    #[arg(long)] pub model: Option<String>,
    #[arg(long)] pub config: Option<PathBuf>,
    /// Skip categorization and tagging; write the flat document
    #[arg(long, default_value_t = false)] pub no_ai: bool,
    /// Fetch, enrich and render, but do not write the output file
    #[arg(long, default_value_t = false)] pub dry_run: bool,
}

#[derive(Serialize)]
struct OrganizePlan {
    input: String,
    would_write: String,
    config_file: Option<String>,
    provider: Option<&'static str>,
    fetch: FetchReport,
    enrich: Option<EnrichSummary>,
}

#[derive(Serialize)]
pub struct OrganizeResult {
    pub output: String,
    pub fetch: FetchReport,
    pub enrich: Option<EnrichSummary>,
}

pub struct Outcome {
    pub store: FeedRecordStore,
    pub document: String,
    pub enrich: Option<EnrichSummary>,
}

pub async fn run(args: OrganizeCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::organize();
    let _g = log.root_span_kv([
        ("input", args.input.display().to_string()),
        ("limit", args.limit.to_string()),
        ("no_ai", args.no_ai.to_string()),
        ("dry_run", args.dry_run.to_string()),
    ]).entered();

    let (cfg, config_file) = {
        let _s = log.span(&OrganizePhase::Config).entered();
        let (mut cfg, path) = AppConfig::resolve(args.config.as_deref(), |k| std::env::var(k).ok())?;
        cfg.apply_overrides(&Overrides {
            provider: args.provider,
            model: args.model.clone(),
            timeout_secs: args.timeout,
            max_concurrent: args.max_concurrent,
            output: args.output.clone(),
        });
        let problems = cfg.validate(!args.no_ai);
        if !problems.is_empty() {
            bail!("invalid configuration:\n  - {}", problems.join("\n  - "));
        }
        (cfg, path)
    };
    if let Some(path) = &config_file {
        log.debug(format!("config file {}", path.display()));
    }

    let references = {
        let _s = log.span(&OrganizePhase::Parse).entered();
        subscription::load(&args.input, args.limit)?
    };

    let source: Arc<dyn FeedSource> = Arc::new(HttpFeedSource::new()?);
    let backend = if args.no_ai { None } else { Some(enrich::build_backend(&cfg.ai)?) };
    let outcome = execute(&cfg, &references, source, backend.as_deref()).await;

    if args.dry_run {
        let plan = OrganizePlan {
            input: args.input.display().to_string(),
            would_write: cfg.output.default_file.display().to_string(),
            config_file: config_file.map(|p| p.display().to_string()),
            provider: backend.as_ref().map(|b| b.name()),
            fetch: FetchReport::from_store(&outcome.store),
            enrich: outcome.enrich,
        };
        log.info(format!(
            "📝 Dry run: {} of {} feeds fetched, {} not written",
            plan.fetch.succeeded, plan.fetch.total, plan.would_write
        ));
        if telemetry::config::json_mode() { log.plan(&plan)?; }
        return Ok(());
    }

    {
        let _s = log.span(&OrganizePhase::Render).entered();
        render::write_document(&cfg.output.default_file, &outcome.document)?;
    }

    let result = OrganizeResult {
        output: cfg.output.default_file.display().to_string(),
        fetch: FetchReport::from_store(&outcome.store),
        enrich: outcome.enrich,
    };
    log.info(format!(
        "✅ Done — {} of {} feeds fetched, written to {}",
        result.fetch.succeeded, result.fetch.total, result.output
    ));
    if telemetry::config::json_mode() { log.result_timed(&result, started)?; }
    Ok(())
}

/// Fetch, optionally enrich, and render. Never fails: per-feed and
/// per-batch problems end up in the returned store and summary.
pub async fn execute(
    cfg: &AppConfig,
    references: &[FeedReference],
    source: Arc<dyn FeedSource>,
    backend: Option<&dyn ReasoningBackend>,
) -> Outcome {
    let log = telemetry::organize();

    let records = fetch::fetch_all(source, references, FetchOptions::from(&cfg.fetching))
        .instrument(log.span(&OrganizePhase::Fetch))
        .await;
    let mut store = FeedRecordStore::new(records);

    let counts = store.counts();
    if counts.failed > 0 {
        log.warn(format!("⚠️  {} of {} feeds failed to fetch", counts.failed, counts.total));
    }

    let enrich = match backend {
        Some(backend) => {
            let opts = EnrichOptions::from(&cfg.ai);
            Some(
                enrich::enrich(store.records_mut(), backend, &opts)
                    .instrument(log.span(&OrganizePhase::Enrich))
                    .await,
            )
        }
        None => None,
    };

    let document = {
        let _s = log.span(&OrganizePhase::Render).entered();
        if enrich.is_some() { render::render_enriched(&store) } else { render::render_basic(&store) }
    };
    Outcome { store, document, enrich }
}
