use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One structured item extracted from a newsletter body or feed document.
/// `body` is the raw source markup; sanitization happens downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContentItem {
    pub source_sender_id: String,
    pub title: String,
    pub body: String,
    /// Absolute URL, or empty when the source markup carried none.
    pub link: String,
    pub section: Option<String>,
}

/// Where a clean item came from. Carried along so downstream consumers can
/// attribute results without re-resolving the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub sender_id: String,
    pub title: String,
    pub link: String,
    pub section: Option<String>,
}

/// A sanitized content item ready for batching. `sanitized_text` contains no
/// quoted-printable escapes, raw HTML entities, or zero-width characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanContentItem {
    /// Stable, caller-assigned identifier. Unique across one ingestion run.
    pub content_id: String,
    pub sanitized_text: String,
    pub source: SourceMetadata,
}

impl CleanContentItem {
    /// Length in Unicode scalar values, the unit all batch limits use.
    pub fn text_len(&self) -> usize {
        self.sanitized_text.chars().count()
    }
}

/// Per-item output of one analysis call. Fields not requested by a given
/// request kind stay empty until the pipeline combines both kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisItemResult {
    pub content_id: String,
    pub summary: String,
    pub provocative_headlines: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub suggested_keywords: Vec<String>,
    pub provocative_keywords: Vec<String>,
}

/// Terminal output of one batch call: results keyed by content id plus the
/// model that served the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnalysisResult {
    pub results: HashMap<String, AnalysisItemResult>,
    pub used_model: String,
}

/// The merged view over all batches of a run. This is the sole artifact
/// handed to persistence/notification collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedAnalysis {
    pub results: HashMap<String, AnalysisItemResult>,
    pub models_used: BTreeSet<String>,
}
