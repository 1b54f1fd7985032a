use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::store::{FeedRecord, FeedRecordStore, UNCATEGORIZED};
use crate::telemetry::{self};
use crate::telemetry::ops::render::Phase as RenderPhase;

const TITLE: &str = "# My Podcasts";

/// Flat document: every fetched feed under one heading, then failures.
pub fn render_basic(store: &FeedRecordStore) -> String {
    let log = telemetry::render();
    let _g = log.span(&RenderPhase::Build).entered();

    let mut out = header(store);
    let successful: Vec<&FeedRecord> = store.successful().collect();
    if !successful.is_empty() {
        out.push_str("## Podcasts\n\n");
        for record in successful {
            podcast_block(&mut out, record, false);
        }
    }
    failure_report(&mut out, store);
    out
}

/// Grouped document: a table of contents, one section per category in
/// name order (`Uncategorized` last), tags under each feed, then failures.
pub fn render_enriched(store: &FeedRecordStore) -> String {
    let log = telemetry::render();
    let _g = log.span(&RenderPhase::Build).entered();

    let mut out = header(store);
    let mut groups: Vec<(&str, Vec<&FeedRecord>)> = store.by_category().into_iter().collect();
    groups.sort_by_key(|(name, _)| (*name == UNCATEGORIZED, name.to_lowercase()));

    if !groups.is_empty() {
        out.push_str("## Categories\n\n");
        for (name, records) in &groups {
            let _ = writeln!(out, "- [{}](#{}) ({})", name, anchor(name), records.len());
        }
        out.push('\n');
    }
    for (name, records) in &groups {
        let _ = writeln!(out, "## {name}\n");
        for record in records {
            podcast_block(&mut out, record, true);
        }
    }
    failure_report(&mut out, store);
    out
}

pub fn write_document(path: &Path, content: &str) -> Result<()> {
    let log = telemetry::render();
    let _g = log.span_kv(&RenderPhase::Write, [("path", path.display().to_string())]).entered();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("write {}", path.display()))?;
    log.info(format!("📝 Wrote {}", path.display()));
    Ok(())
}

fn header(store: &FeedRecordStore) -> String {
    let counts = store.counts();
    format!(
        "{TITLE}\n\nTotal podcasts: {}\nSuccessfully fetched: {}\nFailed: {}\n\n",
        counts.total, counts.succeeded, counts.failed
    )
}

fn podcast_block(out: &mut String, record: &FeedRecord, with_tags: bool) {
    let _ = writeln!(out, "### {}\n", record.display_title());
    if with_tags {
        if let Some(e) = record.enrichment.as_ref().filter(|e| !e.tags.is_empty()) {
            let tags: Vec<String> = e.tags.iter().map(|t| format!("#{t}")).collect();
            let _ = writeln!(out, "**Tags:** {}\n", tags.join(" "));
        }
    }
    let meta = record.metadata();
    if let Some(link) = meta.and_then(|m| m.link.as_deref()) {
        let _ = writeln!(out, "**Link:** {link}\n");
    }
    let _ = writeln!(out, "**RSS Feed:** {}\n", record.reference.url);
    if let Some(description) = record.description() {
        let _ = writeln!(out, "**Description:** {description}\n");
    }
    if let Some(image) = meta.and_then(|m| m.image_url.as_deref()) {
        let _ = writeln!(out, "**Image:** {image}\n");
    }
}

fn failure_report(out: &mut String, store: &FeedRecordStore) {
    let failed: Vec<&FeedRecord> = store.failed().collect();
    if failed.is_empty() { return; }
    out.push_str("## Failed to Fetch\n\nThe following podcasts could not be fetched:\n\n");
    for record in failed {
        let error = record.failure().map(|f| f.message.as_str()).unwrap_or("Unknown error");
        let _ = writeln!(out, "- **{}**", record.reference.name);
        let _ = writeln!(out, "  - URL: {}", record.reference.url);
        let _ = writeln!(out, "  - Error: {error}");
    }
    out.push('\n');
}

/// GitHub-style heading anchor.
fn anchor(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailureKind, FeedMetadata, FeedReference, FetchFailure, TagSource};

    fn store() -> FeedRecordStore {
        let mut acquired = FeedRecord::succeeded(
            0,
            FeedReference::new("Acquired", "https://feeds.example.com/acquired"),
            FeedMetadata {
                title: Some("Acquired".into()),
                link: Some("https://acquired.fm".into()),
                description: Some("Stories of great companies".into()),
                image_url: Some("https://acquired.fm/cover.jpg".into()),
            },
        );
        acquired.assign("Business", vec!["companies".into(), "history".into()], TagSource::Ai);
        let mut radiolab = FeedRecord::succeeded(
            1,
            FeedReference::new("Radiolab", "https://feeds.example.com/radiolab"),
            FeedMetadata { title: Some("Radiolab".into()), ..FeedMetadata::default() },
        );
        radiolab.assign(UNCATEGORIZED, vec!["radiolab".into()], TagSource::Fallback);
        let mut ai = FeedRecord::succeeded(
            2,
            FeedReference::new("Latent Space", "https://feeds.example.com/latent"),
            FeedMetadata { title: Some("Latent Space".into()), ..FeedMetadata::default() },
        );
        ai.assign("Technology & AI", vec!["ai".into()], TagSource::Ai);
        let dead = FeedRecord::failed(
            3,
            FeedReference::new("Dead Feed", "https://gone.example.com/rss"),
            FetchFailure { kind: FailureKind::HttpStatus, message: "http status: 404 Not Found".into() },
        );
        FeedRecordStore::new(vec![acquired, radiolab, ai, dead])
    }

    #[test]
    fn basic_document_layout() {
        let doc = render_basic(&store());
        assert!(doc.starts_with("# My Podcasts\n\nTotal podcasts: 4\nSuccessfully fetched: 3\nFailed: 1\n"));
        assert!(doc.contains("## Podcasts\n\n### Acquired\n\n**Link:** https://acquired.fm\n"));
        assert!(doc.contains("**RSS Feed:** https://feeds.example.com/radiolab"));
        assert!(doc.contains("**Image:** https://acquired.fm/cover.jpg"));
        assert!(!doc.contains("**Tags:**"));
        assert!(doc.contains("## Failed to Fetch"));
        assert!(doc.contains("- **Dead Feed**\n  - URL: https://gone.example.com/rss\n  - Error: http status: 404 Not Found"));
    }

    #[test]
    fn enriched_document_groups_by_category() {
        let doc = render_enriched(&store());
        let business = doc.find("## Business").unwrap();
        let tech = doc.find("## Technology & AI").unwrap();
        let uncategorized = doc.find("## Uncategorized").unwrap();
        let failed = doc.find("## Failed to Fetch").unwrap();
        assert!(business < tech && tech < uncategorized && uncategorized < failed);

        assert!(doc.contains("- [Technology & AI](#technology--ai) (1)"));
        assert!(doc.contains("**Tags:** #companies #history"));
        assert_eq!(doc.matches("### ").count(), 3);
    }

    #[test]
    fn nothing_fetched() {
        let dead = FeedRecord::failed(
            0,
            FeedReference::new("Dead", "https://gone.example.com"),
            FetchFailure { kind: FailureKind::Timeout, message: "timeout: no response within 30.0s".into() },
        );
        let doc = render_enriched(&FeedRecordStore::new(vec![dead]));
        assert!(!doc.contains("## Categories"));
        assert!(doc.contains("Successfully fetched: 0"));
        assert!(doc.contains("Error: timeout"));
    }

    #[test]
    fn writes_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("podcasts.md");
        write_document(&path, "# My Podcasts\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# My Podcasts\n");
    }
}
