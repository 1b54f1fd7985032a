use std::path::Path;

use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::store::FeedReference;
use crate::telemetry::{self};
use crate::telemetry::ops::subscription::Phase as SubscriptionPhase;

/// Read an OPML export and return its feed entries in document order.
/// `limit > 0` keeps only the first `limit` entries.
pub fn load(path: &Path, limit: usize) -> Result<Vec<FeedReference>> {
    let log = telemetry::subscription();
    let _g = log.root_span_kv([("path", path.display().to_string())]).entered();

    let xml = {
        let _s = log.span(&SubscriptionPhase::Read).entered();
        std::fs::read_to_string(path).with_context(|| format!("read OPML {}", path.display()))?
    };
    let mut feeds = {
        let _s = log.span(&SubscriptionPhase::Parse).entered();
        parse_opml(&xml).with_context(|| format!("parse OPML {}", path.display()))?
    };

    let found = feeds.len();
    if limit > 0 && feeds.len() > limit {
        feeds.truncate(limit);
    }
    log.info(format!("📻 Found {} feeds, using {}", found, feeds.len()));
    Ok(feeds)
}

pub fn parse_opml(xml: &str) -> Result<Vec<FeedReference>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    let mut saw_root = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                saw_root = true;
                if e.local_name().as_ref() == b"outline" {
                    if let Some(feed) = outline_feed(&e)? {
                        feeds.push(feed);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                anyhow::bail!("malformed XML at byte {}: {}", reader.error_position(), e)
            }
        }
    }
    if !saw_root {
        anyhow::bail!("document has no elements");
    }
    Ok(feeds)
}

fn outline_feed(e: &BytesStart<'_>) -> Result<Option<FeedReference>> {
    let mut text = String::new();
    let mut title = String::new();
    let mut url = String::new();
    for attr in e.attributes() {
        let attr = attr.context("bad outline attribute")?;
        let value = attr.unescape_value().context("bad outline attribute value")?;
        match attr.key.as_ref() {
            b"text" => text = decode(&value),
            b"title" => title = decode(&value),
            b"xmlUrl" => url = value.trim().to_string(),
            _ => {}
        }
    }
    if url.is_empty() { return Ok(None); }

    if text.is_empty() { text = title.clone(); }
    if title.is_empty() { title = text.clone(); }
    let name = if text.is_empty() { url.clone() } else { text };
    Ok(Some(FeedReference {
        title: (title != name && !title.is_empty()).then_some(title),
        name,
        url,
    }))
}

fn decode(value: &str) -> String {
    percent_decode_str(value.trim()).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="1.0">
  <head><title>Podcast subscriptions</title></head>
  <body>
    <outline text="feeds">
      <outline type="rss" text="Acquired" xmlUrl="https://feeds.example.com/acquired" />
      <outline type="rss" title="Hardcore%20History" xmlUrl="https://feeds.example.com/dchh"></outline>
      <outline type="rss" text="Lex" title="Lex Fridman Podcast" xmlUrl="https://lexfridman.com/feed/podcast/" />
      <outline type="rss" text="No URL" />
      <outline type="rss" text="Tom &amp; Jerry" xmlUrl="https://example.com/feed?a=1&amp;b=2" />
    </outline>
  </body>
</opml>"#;

    #[test]
    fn parses_outlines_in_order() {
        let feeds = parse_opml(SAMPLE).unwrap();
        let names: Vec<&str> = feeds.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Acquired", "Hardcore History", "Lex", "Tom & Jerry"]);
        assert_eq!(feeds[0].title, None);
        assert_eq!(feeds[2].title.as_deref(), Some("Lex Fridman Podcast"));
        assert_eq!(feeds[3].url, "https://example.com/feed?a=1&b=2");
    }

    #[test]
    fn nameless_outline_uses_url() {
        let feeds = parse_opml(r#"<opml><body><outline xmlUrl="https://x.test/rss"/></body></opml>"#).unwrap();
        assert_eq!(feeds[0].name, "https://x.test/rss");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_opml("<opml><body><outline text=\"a\"></body>").is_err());
        assert!(parse_opml("").is_err());
    }

    #[test]
    fn empty_body_is_fine() {
        assert!(parse_opml("<opml><body/></opml>").unwrap().is_empty());
    }

    #[test]
    fn load_applies_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        assert_eq!(load(file.path(), 2).unwrap().len(), 2);
        assert_eq!(load(file.path(), 0).unwrap().len(), 4);
        assert_eq!(load(file.path(), 50).unwrap().len(), 4);
    }

    #[test]
    fn missing_file_has_context() {
        let err = load(Path::new("/definitely/not/here.opml"), 0).unwrap_err();
        assert!(err.to_string().contains("read OPML"));
    }
}
