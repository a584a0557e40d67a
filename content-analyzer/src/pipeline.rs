//! End-to-end orchestration for one ingestion run: raw mail and feed URLs
//! in, a merged analysis map out.
//!
//! Per-source and per-batch failures degrade to log entries so one bad
//! newsletter or feed never aborts the run; a duplicate content id during
//! the final merge does, because it means an upstream invariant broke.

use crate::aggregator::merge_batch_results;
use crate::analysis::RateLimitedAnalysisClient;
use crate::batcher::ContentBatcher;
use crate::fetcher::FeedFetcher;
use crate::types::Result;
use interfaces::defs::{AggregatedAnalysis, CleanContentItem, RawContentItem, SourceMetadata};
use newsletter_ingestion::parsers::strip_tags;
use newsletter_ingestion::{sanitize, NewsletterMessage, ParserRegistry};
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct ContentPipeline {
    registry: ParserRegistry,
    fetcher: FeedFetcher,
    batcher: ContentBatcher,
    client: RateLimitedAnalysisClient,
}

impl ContentPipeline {
    pub fn new(
        registry: ParserRegistry,
        fetcher: FeedFetcher,
        batcher: ContentBatcher,
        client: RateLimitedAnalysisClient,
    ) -> Self {
        Self {
            registry,
            fetcher,
            batcher,
            client,
        }
    }

    /// Parse one raw mail payload into clean items. Unparsable payloads and
    /// unknown senders yield an empty list, not an error.
    pub fn ingest_mail(&self, raw: &[u8]) -> Vec<CleanContentItem> {
        let msg = match NewsletterMessage::parse(raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "skipping unparsable mail payload");
                return Vec::new();
            }
        };
        let Some(parser) = self.registry.find_parser(&msg.sender) else {
            info!(sender = %msg.sender, "no parser claims sender, skipping");
            return Vec::new();
        };
        let items = parser.parse(&msg.body);
        info!(
            sender = %msg.sender,
            parser = parser.name(),
            items = items.len(),
            "parsed newsletter"
        );
        items.into_iter().map(clean_item).collect()
    }

    /// Fetch one feed into clean items. Fetch and parse failures are
    /// reported per feed and the run continues.
    pub async fn ingest_feed(&self, url: &str) -> Vec<CleanContentItem> {
        match self.fetcher.fetch(url).await {
            Ok(items) => items.into_iter().map(clean_item).collect(),
            Err(e) => {
                warn!(url, error = %e, "feed ingestion failed, continuing run");
                Vec::new()
            }
        }
    }

    /// Batch the items, analyze every batch, and merge the results. Failed
    /// batches are logged and skipped so the rest of the run still lands.
    pub async fn analyze(&self, items: Vec<CleanContentItem>) -> Result<AggregatedAnalysis> {
        let batches = self.batcher.batch(items);
        info!(batches = batches.len(), "built content batches");

        let mut partials = Vec::with_capacity(batches.len());
        for (index, batch) in batches.iter().enumerate() {
            match self.client.analyze_batch(batch).await {
                Ok(result) => partials.push(result),
                Err(e) => {
                    error!(batch = index, items = batch.len(), error = %e, "batch analysis failed");
                }
            }
        }

        Ok(merge_batch_results(partials)?)
    }
}

/// Assign an id and produce the sanitized text the model will see: decoded
/// entities and escapes, markup stripped, title ahead of the body.
fn clean_item(raw: RawContentItem) -> CleanContentItem {
    let title = strip_tags(&sanitize(&raw.title));
    let body = strip_tags(&sanitize(&raw.body));
    let sanitized_text = if title.is_empty() {
        body
    } else if body.is_empty() {
        title.clone()
    } else {
        format!("{title}\n\n{body}")
    };

    CleanContentItem {
        content_id: Uuid::new_v4().to_string(),
        sanitized_text,
        source: SourceMetadata {
            sender_id: raw.source_sender_id,
            title,
            link: raw.link,
            section: raw.section,
        },
    }
}
