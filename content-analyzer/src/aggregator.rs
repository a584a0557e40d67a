use crate::types::MergeError;
use interfaces::defs::{AggregatedAnalysis, BatchAnalysisResult};
use tracing::debug;

/// Merge per-batch results into one map keyed by content id, tracking the
/// set of models that served the run. Content ids are disjoint across
/// batches by construction (each item lands in exactly one batch), so a
/// collision means the batching invariant broke upstream: it is reported,
/// never papered over by overwriting.
pub fn merge_batch_results(
    partials: impl IntoIterator<Item = BatchAnalysisResult>,
) -> Result<AggregatedAnalysis, MergeError> {
    let mut merged = AggregatedAnalysis::default();
    for partial in partials {
        merged.models_used.insert(partial.used_model);
        for (content_id, item) in partial.results {
            if merged.results.contains_key(&content_id) {
                return Err(MergeError::DuplicateContentId(content_id));
            }
            merged.results.insert(content_id, item);
        }
    }
    debug!(
        items = merged.results.len(),
        models = merged.models_used.len(),
        "merged batch results"
    );
    Ok(merged)
}
