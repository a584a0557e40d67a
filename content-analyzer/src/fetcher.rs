use crate::types::{FetchConfig, FetchError};
use backoff::backoff::{Backoff, Constant};
use interfaces::defs::RawContentItem;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches RSS/Atom feeds with bounded retries and turns entries into raw
/// content items. Parsing is all-or-nothing per feed document: a body that
/// fails to parse never yields a partial item list.
pub struct FeedFetcher {
    client: Client,
    config: FetchConfig,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("failed to create HTTP client");
        Self { client, config }
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<RawContentItem>, FetchError> {
        debug!(url, "fetching feed");
        let body = self.fetch_body(url).await?;
        let items = parse_feed_body(url, &body)?;
        info!(url, items = items.len(), "fetched feed");
        Ok(items)
    }

    /// Retrieve the feed body. Connection failures, timeouts, and 5xx
    /// responses are retried with a fixed delay up to `max_retries` times;
    /// a 4xx surfaces immediately as a permanent client error.
    async fn fetch_body(&self, url: &str) -> Result<String, FetchError> {
        let mut backoff = Constant::new(Duration::from_millis(self.config.retry_delay_ms));
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = backoff.next_backoff().unwrap_or_default();
                warn!(url, attempt, ?delay, "retrying feed fetch");
                tokio::time::sleep(delay).await;
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_client_error() {
                        return Err(FetchError::Client {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    if !status.is_success() {
                        last_error = format!("HTTP {}", status.as_u16());
                        continue;
                    }
                    match response.text().await {
                        Ok(text) => return Ok(text),
                        Err(e) => {
                            last_error = e.to_string();
                            continue;
                        }
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
        }

        Err(FetchError::Network {
            url: url.to_string(),
            attempts: self.config.max_retries + 1,
            reason: last_error,
        })
    }
}

/// Parse a feed document into raw items. Exposed for tests; the fetcher is
/// the only production caller.
pub(crate) fn parse_feed_body(url: &str, body: &str) -> Result<Vec<RawContentItem>, FetchError> {
    let feed = feed_rs::parser::parse(body.as_bytes()).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| entry_to_item(url, entry))
        .collect())
}

fn entry_to_item(feed_url: &str, entry: feed_rs::model::Entry) -> RawContentItem {
    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();

    // Prefer full content over the summary, like any feed reader would.
    let body = entry
        .content
        .and_then(|c| c.body)
        .or_else(|| entry.summary.map(|s| s.content))
        .unwrap_or_default();

    RawContentItem {
        source_sender_id: feed_url.to_string(),
        title,
        body,
        link: absolute_or_empty(link),
        section: None,
    }
}

fn absolute_or_empty(link: String) -> String {
    match url::Url::parse(&link) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => link,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>Example Feed</title>
  <item>
    <title>First story</title>
    <link>https://example.com/first</link>
    <description>Body of the first story</description>
  </item>
  <item>
    <title>Second story</title>
    <link>/relative-only</link>
    <description>Body of the second story</description>
  </item>
</channel></rss>"#;

    #[test]
    fn parses_entries_with_link_normalization() {
        let items = parse_feed_body("https://example.com/feed.xml", FEED).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "First story");
        assert_eq!(items[0].link, "https://example.com/first");
        assert!(items[0].body.contains("first story"));
        assert_eq!(items[1].link, "", "relative links are rejected");
    }

    #[test]
    fn malformed_body_is_a_parse_error_with_no_items() {
        let err = parse_feed_body("https://example.com/feed.xml", "this is not xml").unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }
}
