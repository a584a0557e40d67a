use interfaces::defs::CleanContentItem;
use serde::{Deserialize, Serialize};

/// Per-item and per-batch size caps, in Unicode scalar values.
#[derive(Debug, Clone)]
pub struct BatchLimits {
    pub max_content_length: usize,
    pub max_total_batch_length: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_content_length: 10_000,
            max_total_batch_length: 50_000,
        }
    }
}

/// One entry in the model fallback order with its request ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    /// Requests per minute.
    pub rpm: u32,
    /// Requests per day.
    pub rpd: u32,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "content-analyzer/0.1".to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 2_000,
        }
    }
}

/// Generation parameters shared by every analysis request.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 8_192,
            top_p: 0.95,
            top_k: 40,
        }
    }
}

/// An ordered, size-bounded group of items submitted in one model request.
/// Immutable once built: `total_length` always equals the sum of item text
/// lengths and never exceeds the batch cap it was built under.
#[derive(Debug, Clone)]
pub struct ContentBatch {
    items: Vec<CleanContentItem>,
    total_length: usize,
}

impl ContentBatch {
    pub(crate) fn new(items: Vec<CleanContentItem>, total_length: usize) -> Self {
        debug_assert_eq!(
            total_length,
            items.iter().map(|i| i.text_len()).sum::<usize>()
        );
        Self {
            items,
            total_length,
        }
    }

    pub fn items(&self) -> &[CleanContentItem] {
        &self.items
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network failure fetching {url} after {attempts} attempts: {reason}")]
    Network {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("client error fetching {url}: HTTP {status}")]
    Client { url: String, status: u16 },

    #[error("feed parse error for {url}: {reason}")]
    Parse { url: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("all configured models exhausted or failed for this batch")]
    AllModelsExhausted,
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("duplicate content id {0} across batches; the batching invariant is broken")]
    DuplicateContentId(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
