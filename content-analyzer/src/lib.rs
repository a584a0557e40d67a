pub mod aggregator;
pub mod analysis;
pub mod batcher;
pub mod fetcher;
pub mod gemini;
pub mod pipeline;
pub mod quota;
pub mod types;

pub use aggregator::merge_batch_results;
pub use analysis::{RateLimitedAnalysisClient, RequestKind};
pub use batcher::ContentBatcher;
pub use fetcher::FeedFetcher;
pub use gemini::{GeminiBackend, ModelBackend};
pub use pipeline::ContentPipeline;
pub use quota::{Clock, QuotaLedger, SystemClock};
pub use types::*;
