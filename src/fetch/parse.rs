use atom_syndication::Feed as AtomFeed;
use rss::Channel;
use scraper::Html;

use crate::store::FeedMetadata;

use super::error::FetchError;

/// Parse a feed body as RSS, falling back to Atom. Only channel-level
/// fields are read; items are ignored.
pub fn parse_feed(xml: &[u8]) -> Result<FeedMetadata, FetchError> {
    match Channel::read_from(xml) {
        Ok(ch) => Ok(from_channel(&ch)),
        Err(rss_err) => match AtomFeed::read_from(xml) {
            Ok(feed) => Ok(from_atom(&feed)),
            Err(_) => Err(FetchError::Malformed(rss_err.to_string())),
        },
    }
}

fn from_channel(ch: &Channel) -> FeedMetadata {
    let itunes = ch.itunes_ext();
    let description = non_empty(&clean_text(ch.description()))
        .or_else(|| itunes.and_then(|i| i.summary()).and_then(|s| non_empty(&clean_text(s))))
        .or_else(|| itunes.and_then(|i| i.subtitle()).and_then(|s| non_empty(&clean_text(s))));
    let image_url = ch.image()
        .and_then(|img| non_empty(img.url()))
        .or_else(|| itunes.and_then(|i| i.image()).and_then(non_empty));
    FeedMetadata {
        title: non_empty(ch.title()),
        link: non_empty(ch.link()),
        description,
        image_url,
    }
}

fn from_atom(feed: &AtomFeed) -> FeedMetadata {
    let link = feed.links().iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| feed.links().first())
        .and_then(|l| non_empty(l.href()));
    FeedMetadata {
        title: non_empty(&feed.title().value),
        link,
        description: feed.subtitle().and_then(|t| non_empty(&clean_text(&t.value))),
        image_url: feed.logo().or(feed.icon()).and_then(non_empty),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

/// Text content of an HTML-ish description, entities decoded and whitespace
/// collapsed. Plain text passes through unchanged.
pub fn clean_text(s: &str) -> String {
    let doc = Html::parse_fragment(s);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITUNES_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title> Acquired </title>
    <link>https://acquired.fm</link>
    <itunes:summary>Every company has a story.</itunes:summary>
    <itunes:image href="https://img.example/acq.jpg"/>
    <item><title>Episode 1</title></item>
  </channel>
</rss>"#;

    #[test]
    fn rss_falls_back_to_itunes_fields() {
        let meta = parse_feed(ITUNES_FEED.as_bytes()).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Acquired"));
        assert_eq!(meta.link.as_deref(), Some("https://acquired.fm"));
        assert_eq!(meta.description.as_deref(), Some("Every company has a story."));
        assert_eq!(meta.image_url.as_deref(), Some("https://img.example/acq.jpg"));
    }

    #[test]
    fn missing_description_is_not_an_error() {
        let xml = r#"<rss version="2.0"><channel><title>Quiet</title><link>https://q.example</link></channel></rss>"#;
        let meta = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Quiet"));
        assert_eq!(meta.description, None);
        assert_eq!(meta.image_url, None);
    }

    #[test]
    fn primary_image_and_html_description() {
        let xml = r#"<rss version="2.0"><channel>
            <title>T</title><link>https://t.example</link>
            <description><![CDATA[<p>Deep   dives &amp; <b>interviews</b></p>]]></description>
            <image><url>https://img.example/t.png</url><title>T</title><link>https://t.example</link></image>
        </channel></rss>"#;
        let meta = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(meta.description.as_deref(), Some("Deep dives & interviews"));
        assert_eq!(meta.image_url.as_deref(), Some("https://img.example/t.png"));
    }

    #[test]
    fn plain_text_comparisons_survive() {
        let xml = r#"<rss version="2.0"><channel><title>Rates</title><link>https://r.example</link>
            <description>Rates &lt; 5% and growth &gt; 3% explained</description>
        </channel></rss>"#;
        let meta = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(meta.description.as_deref(), Some("Rates < 5% and growth > 3% explained"));
    }

    #[test]
    fn named_and_numeric_entities_are_decoded() {
        let xml = r#"<rss version="2.0"><channel><title>Tech</title><link>https://t.example</link>
            <description><![CDATA[<p>It&#8217;s a show &mdash; about &ldquo;tech&rdquo;</p>]]></description>
        </channel></rss>"#;
        let meta = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(meta.description.as_deref(), Some("It\u{2019}s a show \u{2014} about \u{201c}tech\u{201d}"));
    }

    #[test]
    fn block_elements_do_not_glue_words() {
        assert_eq!(clean_text("<p>One</p><p>Two</p><br>Three"), "One Two Three");
    }

    #[test]
    fn atom_feed_is_accepted() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Cast</title>
  <subtitle>Talk about feeds</subtitle>
  <link rel="self" href="https://a.example/feed"/>
  <link rel="alternate" href="https://a.example/"/>
  <logo>https://a.example/logo.png</logo>
  <id>urn:uuid:1</id>
  <updated>2024-01-01T00:00:00Z</updated>
</feed>"#;
        let meta = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Atom Cast"));
        assert_eq!(meta.link.as_deref(), Some("https://a.example/"));
        assert_eq!(meta.description.as_deref(), Some("Talk about feeds"));
        assert_eq!(meta.image_url.as_deref(), Some("https://a.example/logo.png"));
    }

    #[test]
    fn html_page_is_malformed() {
        let err = parse_feed(b"<html><body>not a feed</body></html>").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(err.to_string().starts_with("malformed feed"));
    }
}
