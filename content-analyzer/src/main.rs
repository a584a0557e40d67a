use anyhow::Context;
use clap::Parser;
use content_analyzer::{
    BatchLimits, ContentBatcher, ContentPipeline, FeedFetcher, FetchConfig, GeminiBackend,
    GenerationOptions, ModelSpec, QuotaLedger, RateLimitedAnalysisClient,
};
use newsletter_ingestion::ParserRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "content-analyzer", about = "Batch newsletter/RSS analysis runner")]
struct Args {
    /// RSS feed URLs to ingest
    #[arg(long = "feed")]
    feeds: Vec<String>,

    /// Raw RFC822 newsletter files to ingest
    #[arg(long = "mail")]
    mails: Vec<PathBuf>,

    /// Models in fallback order, as name:rpm:rpd triples
    #[arg(long = "model", default_values_t = [
        "gemini-2.5-flash:10:250".to_string(),
        "gemini-2.5-flash-lite:15:1000".to_string(),
    ])]
    models: Vec<String>,
}

fn parse_model_spec(value: &str) -> anyhow::Result<ModelSpec> {
    let mut parts = value.split(':');
    let name = parts
        .next()
        .filter(|n| !n.is_empty())
        .context("model spec needs a name")?;
    let rpm = parts
        .next()
        .context("model spec needs an rpm")?
        .parse()
        .context("rpm must be a number")?;
    let rpd = parts
        .next()
        .context("model spec needs an rpd")?
        .parse()
        .context("rpd must be a number")?;
    Ok(ModelSpec {
        name: name.to_string(),
        rpm,
        rpd,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let models = args
        .models
        .iter()
        .map(|m| parse_model_spec(m))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set; analysis calls will fail");
    }

    let pipeline = ContentPipeline::new(
        ParserRegistry::default(),
        FeedFetcher::new(FetchConfig::default()),
        ContentBatcher::new(BatchLimits::default()),
        RateLimitedAnalysisClient::new(
            Arc::new(GeminiBackend::new(api_key)),
            Arc::new(QuotaLedger::with_system_clock()),
            models,
            GenerationOptions::default(),
        ),
    );

    let mut items = Vec::new();
    for path in &args.mails {
        match std::fs::read(path) {
            Ok(raw) => items.extend(pipeline.ingest_mail(&raw)),
            Err(e) => error!(path = %path.display(), error = %e, "failed to read mail file"),
        }
    }
    for url in &args.feeds {
        items.extend(pipeline.ingest_feed(url).await);
    }

    info!(items = items.len(), "ingestion complete");
    if items.is_empty() {
        info!("nothing to analyze");
        return Ok(());
    }

    let analysis = pipeline.analyze(items).await?;
    info!(
        results = analysis.results.len(),
        models = ?analysis.models_used,
        "analysis complete"
    );
    for (content_id, item) in &analysis.results {
        info!(
            %content_id,
            headlines = item.provocative_headlines.len(),
            keywords = item.matched_keywords.len() + item.suggested_keywords.len(),
            summary = %item.summary,
        );
    }

    Ok(())
}
