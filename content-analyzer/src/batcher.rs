use crate::types::{BatchLimits, ContentBatch};
use interfaces::defs::CleanContentItem;
use tracing::{debug, warn};

/// Greedy first-fit-in-order packing of clean items into size-bounded
/// batches.
pub struct ContentBatcher {
    limits: BatchLimits,
}

impl ContentBatcher {
    pub fn new(limits: BatchLimits) -> Self {
        Self { limits }
    }

    /// Pack items in input order. Items longer than the per-item cap are
    /// truncated once at this boundary, keeping as much leading content as
    /// fits; nothing is dropped or reordered. Every returned batch stays
    /// within the cumulative cap, and the item-level cap guarantees every
    /// item fits into some batch.
    pub fn batch(&self, items: Vec<CleanContentItem>) -> Vec<ContentBatch> {
        let mut batches = Vec::new();
        let mut current: Vec<CleanContentItem> = Vec::new();
        let mut running = 0usize;

        for mut item in items {
            let len = item.text_len();
            if len > self.limits.max_content_length {
                warn!(
                    content_id = %item.content_id,
                    len,
                    cap = self.limits.max_content_length,
                    "truncating oversized item"
                );
                item.sanitized_text = truncate_chars(
                    &item.sanitized_text,
                    self.limits.max_content_length,
                );
            }
            let len = item.text_len();

            if !current.is_empty() && running + len > self.limits.max_total_batch_length {
                batches.push(ContentBatch::new(std::mem::take(&mut current), running));
                running = 0;
            }
            running += len;
            current.push(item);
        }

        if !current.is_empty() {
            batches.push(ContentBatch::new(current, running));
        }
        debug!(batches = batches.len(), "packed content batches");
        batches
    }
}

impl Default for ContentBatcher {
    fn default() -> Self {
        Self::new(BatchLimits::default())
    }
}

/// Truncate to at most `cap` Unicode scalar values. Never splits a code
/// point, unlike a byte-index slice.
fn truncate_chars(s: &str, cap: usize) -> String {
    s.chars().take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use interfaces::defs::SourceMetadata;

    fn item(id: &str, len: usize) -> CleanContentItem {
        CleanContentItem {
            content_id: id.to_string(),
            sanitized_text: "x".repeat(len),
            source: SourceMetadata {
                sender_id: "test".into(),
                title: String::new(),
                link: String::new(),
                section: None,
            },
        }
    }

    fn limits(per_item: usize, per_batch: usize) -> BatchLimits {
        BatchLimits {
            max_content_length: per_item,
            max_total_batch_length: per_batch,
        }
    }

    #[test]
    fn empty_input_produces_no_batches() {
        let batches = ContentBatcher::default().batch(vec![]);
        assert!(batches.is_empty());
    }

    #[test]
    fn packs_in_order_without_loss_or_duplication() {
        let batcher = ContentBatcher::new(limits(10, 25));
        let items: Vec<_> = (0..7).map(|i| item(&format!("id-{i}"), 10)).collect();
        let batches = batcher.batch(items);

        // 10+10 fits, a third 10 would exceed 25: two items per batch.
        assert_eq!(batches.len(), 4);
        for batch in &batches {
            assert!(batch.total_length() <= 25);
            assert_eq!(
                batch.total_length(),
                batch.items().iter().map(|i| i.text_len()).sum::<usize>()
            );
        }

        let ids: Vec<_> = batches
            .iter()
            .flat_map(|b| b.items().iter().map(|i| i.content_id.clone()))
            .collect();
        let expected: Vec<_> = (0..7).map(|i| format!("id-{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn oversized_item_truncates_to_exactly_the_cap() {
        let batcher = ContentBatcher::new(limits(10, 100));
        let batches = batcher.batch(vec![item("big", 20)]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].items()[0].text_len(), 10);
    }

    #[test]
    fn truncation_is_char_safe() {
        let mut it = item("multibyte", 0);
        it.sanitized_text = "ééééé".to_string();
        let batcher = ContentBatcher::new(limits(3, 100));
        let batches = batcher.batch(vec![it]);
        assert_eq!(batches[0].items()[0].sanitized_text, "ééé");
    }

    #[test]
    fn item_filling_a_whole_batch_gets_its_own() {
        let batcher = ContentBatcher::new(limits(10, 10));
        let batches = batcher.batch(vec![item("a", 4), item("b", 10), item("c", 4)]);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].items()[0].content_id, "a");
        assert_eq!(batches[1].items()[0].content_id, "b");
        assert_eq!(batches[2].items()[0].content_id, "c");
    }

    #[test]
    fn zero_length_items_are_kept() {
        let batcher = ContentBatcher::new(limits(10, 10));
        let batches = batcher.batch(vec![item("empty", 0)]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0].total_length(), 0);
    }
}
