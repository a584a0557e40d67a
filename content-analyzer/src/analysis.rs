//! Rate-limited, multi-model analysis client.
//!
//! Models are tried strictly in the configured fallback order. A model
//! whose quota is already exhausted is skipped before any network traffic;
//! a model that is called has its quota charged whether or not the call
//! succeeds. The first parsed reply wins.

use crate::gemini::{
    Content, GenerateRequest, GenerateResponse, GenerationConfig, ModelBackend, Part,
};
use crate::quota::QuotaLedger;
use crate::types::{AnalysisError, ContentBatch, GenerationOptions, ModelSpec};
use interfaces::defs::{AnalysisItemResult, BatchAnalysisResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_MATCHED_KEYWORDS: usize = 5;
const MAX_SUGGESTED_KEYWORDS: usize = 5;
const MAX_PROVOCATIVE_KEYWORDS_EXTRACT: usize = 3;
const MAX_PROVOCATIVE_KEYWORDS_SUMMARY: usize = 5;
const MAX_PROVOCATIVE_HEADLINES: usize = 3;

/// The two prompt/schema shapes issued against the same quota and fallback
/// machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    ExtractKeywords,
    Summarize,
}

pub struct RateLimitedAnalysisClient {
    backend: Arc<dyn ModelBackend>,
    ledger: Arc<QuotaLedger>,
    models: Vec<ModelSpec>,
    options: GenerationOptions,
}

impl RateLimitedAnalysisClient {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        ledger: Arc<QuotaLedger>,
        models: Vec<ModelSpec>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            backend,
            ledger,
            models,
            options,
        }
    }

    /// Run one request shape over a batch, falling back through the model
    /// order. Returns the per-item results keyed by content id and the
    /// model that served them, or `AllModelsExhausted` when every model was
    /// quota-blocked or failed. Never returns partial results.
    pub async fn analyze(
        &self,
        batch: &ContentBatch,
        kind: RequestKind,
    ) -> Result<BatchAnalysisResult, AnalysisError> {
        let request = build_request(batch, kind, &self.options);

        for model in &self.models {
            if !self.ledger.try_acquire(model) {
                debug!(model = %model.name, "quota exhausted, skipping without a call");
                continue;
            }
            // The reservation above stands from here on: a failed call
            // still consumed quota on the provider side.
            match self.backend.generate(&model.name, &request).await {
                Ok(response) => match parse_reply(batch, kind, &response) {
                    Ok(results) => {
                        info!(
                            model = %model.name,
                            kind = ?kind,
                            items = results.len(),
                            "batch analyzed"
                        );
                        return Ok(BatchAnalysisResult {
                            results,
                            used_model: model.name.clone(),
                        });
                    }
                    Err(reason) => {
                        warn!(model = %model.name, %reason, "malformed reply, trying next model");
                    }
                },
                Err(error) => {
                    warn!(model = %model.name, %error, "model call failed, trying next model");
                }
            }
        }

        Err(AnalysisError::AllModelsExhausted)
    }

    /// Run both request shapes over a batch and combine the per-item fields
    /// into complete results. The keyword call owns the keyword fields; the
    /// summarize call's provocative keywords only survive when the keyword
    /// call returned none for that item. `used_model` reports the model of
    /// the later (keyword) call.
    pub async fn analyze_batch(
        &self,
        batch: &ContentBatch,
    ) -> Result<BatchAnalysisResult, AnalysisError> {
        let summaries = self.analyze(batch, RequestKind::Summarize).await?;
        let keywords = self.analyze(batch, RequestKind::ExtractKeywords).await?;

        let mut results = summaries.results;
        for (id, kw) in keywords.results {
            if let Some(entry) = results.get_mut(&id) {
                entry.matched_keywords = kw.matched_keywords;
                entry.suggested_keywords = kw.suggested_keywords;
                if !kw.provocative_keywords.is_empty() {
                    entry.provocative_keywords = kw.provocative_keywords;
                }
            }
        }

        Ok(BatchAnalysisResult {
            results,
            used_model: keywords.used_model,
        })
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }
}

fn build_request(
    batch: &ContentBatch,
    kind: RequestKind,
    options: &GenerationOptions,
) -> GenerateRequest {
    let items: Vec<Value> = batch
        .items()
        .iter()
        .map(|item| {
            json!({
                "contentId": item.content_id,
                "text": item.sanitized_text,
            })
        })
        .collect();

    let instructions = match kind {
        RequestKind::ExtractKeywords => format!(
            "You label newsletter content. For every item in the input, return \
             up to {MAX_MATCHED_KEYWORDS} matchedKeywords (terms that appear in the text), \
             up to {MAX_SUGGESTED_KEYWORDS} suggestedKeywords (related terms a reader would \
             search for), and up to {MAX_PROVOCATIVE_KEYWORDS_EXTRACT} provocativeKeywords \
             (attention-grabbing labels). Return a result for every contentId in the input."
        ),
        RequestKind::Summarize => format!(
            "You summarize newsletter content. For every item in the input, write a \
             summary of 2 to 3 sentences, up to {MAX_PROVOCATIVE_HEADLINES} \
             provocativeHeadlines (attention-grabbing but accurate), and up to \
             {MAX_PROVOCATIVE_KEYWORDS_SUMMARY} provocativeKeywords. Return a result \
             for every contentId in the input."
        ),
    };

    let prompt = format!(
        "{instructions}\n\nInput items:\n{}",
        serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
    );

    GenerateRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![Part { text: prompt }],
        }],
        generation_config: Some(GenerationConfig {
            temperature: Some(options.temperature),
            max_output_tokens: Some(options.max_output_tokens),
            top_p: Some(options.top_p),
            top_k: Some(options.top_k),
            candidate_count: Some(1),
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(response_schema(kind)),
        }),
    }
}

fn string_array() -> Value {
    json!({"type": "ARRAY", "items": {"type": "STRING"}})
}

fn response_schema(kind: RequestKind) -> Value {
    let item_schema = match kind {
        RequestKind::ExtractKeywords => json!({
            "type": "OBJECT",
            "required": ["contentId", "matchedKeywords", "suggestedKeywords", "provocativeKeywords"],
            "properties": {
                "contentId": {"type": "STRING"},
                "matchedKeywords": string_array(),
                "suggestedKeywords": string_array(),
                "provocativeKeywords": string_array(),
            }
        }),
        RequestKind::Summarize => json!({
            "type": "OBJECT",
            "required": ["contentId", "summary", "provocativeKeywords"],
            "properties": {
                "contentId": {"type": "STRING"},
                "summary": {"type": "STRING"},
                "provocativeHeadlines": string_array(),
                "provocativeKeywords": string_array(),
            }
        }),
    };

    json!({
        "type": "OBJECT",
        "required": ["results"],
        "properties": {"results": {"type": "ARRAY", "items": item_schema}}
    })
}

#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    results: Vec<ReplyItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyItem {
    content_id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    provocative_headlines: Vec<String>,
    #[serde(default)]
    matched_keywords: Vec<String>,
    #[serde(default)]
    suggested_keywords: Vec<String>,
    #[serde(default)]
    provocative_keywords: Vec<String>,
}

/// Turn a raw model reply into per-item results. A reply that is not pure
/// JSON, or that misses any batch item, is malformed; ids the batch never
/// contained are dropped with a warning.
fn parse_reply(
    batch: &ContentBatch,
    kind: RequestKind,
    response: &GenerateResponse,
) -> Result<HashMap<String, AnalysisItemResult>, String> {
    let text = response.first_text().map_err(|e| e.to_string())?;
    let envelope: ReplyEnvelope =
        serde_json::from_str(text).map_err(|e| format!("reply is not valid JSON: {e}"))?;

    let expected: HashSet<&str> = batch
        .items()
        .iter()
        .map(|i| i.content_id.as_str())
        .collect();

    let mut results = HashMap::with_capacity(batch.len());
    for reply in envelope.results {
        if !expected.contains(reply.content_id.as_str()) {
            warn!(content_id = %reply.content_id, "reply contains unknown content id, ignoring");
            continue;
        }
        let mut item = AnalysisItemResult {
            content_id: reply.content_id.clone(),
            summary: reply.summary,
            provocative_headlines: reply.provocative_headlines,
            matched_keywords: reply.matched_keywords,
            suggested_keywords: reply.suggested_keywords,
            provocative_keywords: reply.provocative_keywords,
        };
        clamp_to_caps(&mut item, kind);
        results.insert(reply.content_id, item);
    }

    if results.len() != batch.len() {
        return Err(format!(
            "reply covered {} of {} batch items",
            results.len(),
            batch.len()
        ));
    }
    Ok(results)
}

/// The schema asks the model for bounded lists; a reply that overflows them
/// anyway is trimmed rather than rejected.
fn clamp_to_caps(item: &mut AnalysisItemResult, kind: RequestKind) {
    item.provocative_headlines.truncate(MAX_PROVOCATIVE_HEADLINES);
    item.matched_keywords.truncate(MAX_MATCHED_KEYWORDS);
    item.suggested_keywords.truncate(MAX_SUGGESTED_KEYWORDS);
    let provocative_cap = match kind {
        RequestKind::ExtractKeywords => MAX_PROVOCATIVE_KEYWORDS_EXTRACT,
        RequestKind::Summarize => MAX_PROVOCATIVE_KEYWORDS_SUMMARY,
    };
    item.provocative_keywords.truncate(provocative_cap);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_required_fields_per_kind() {
        let schema = response_schema(RequestKind::ExtractKeywords);
        let required = &schema["properties"]["results"]["items"]["required"];
        assert!(required
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v == "matchedKeywords"));

        let schema = response_schema(RequestKind::Summarize);
        let required = &schema["properties"]["results"]["items"]["required"];
        assert!(required.as_array().unwrap().iter().any(|v| v == "summary"));
    }

    #[test]
    fn request_carries_json_mime_and_single_candidate() {
        let batch = crate::batcher::ContentBatcher::default().batch(vec![]);
        assert!(batch.is_empty());

        let items = vec![interfaces::defs::CleanContentItem {
            content_id: "a".into(),
            sanitized_text: "text".into(),
            source: interfaces::defs::SourceMetadata {
                sender_id: "s".into(),
                title: String::new(),
                link: String::new(),
                section: None,
            },
        }];
        let batch = crate::batcher::ContentBatcher::default()
            .batch(items)
            .remove(0);

        let request = build_request(&batch, RequestKind::Summarize, &Default::default());
        let config = request.generation_config.unwrap();
        assert_eq!(config.candidate_count, Some(1));
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
        assert!(config.response_schema.is_some());
        assert!(request.contents[0].parts[0].text.contains("\"contentId\":\"a\""));
    }
}
