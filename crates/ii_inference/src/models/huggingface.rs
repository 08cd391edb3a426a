use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ii_core::{CategoryClassifier, EntityRecognizer, EntitySpan, Error, LabelSet, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::Config;

#[derive(Serialize)]
struct NerRequest<'a> {
    inputs: &'a str,
}

#[derive(Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
    hypothesis_template: &'a str,
    multi_label: bool,
}

impl<'a> ZeroShotRequest<'a> {
    /// Each label is scored independently, so `multi_label` is always set.
    fn new(text: &'a str, labels: &'a LabelSet) -> Self {
        Self {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels: labels.labels(),
                hypothesis_template: labels.template(),
                multi_label: true,
            },
        }
    }
}

/// Either an aggregated span (`entity_group`) or a single token (`entity: "B-ORG"`).
#[derive(Deserialize)]
struct NerToken {
    entity_group: Option<String>,
    entity: Option<String>,
    word: String,
    start: Option<usize>,
    end: Option<usize>,
}

#[derive(Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

#[derive(Clone)]
struct HuggingFaceClient {
    client: Arc<Client>,
    api_token: String,
}

impl HuggingFaceClient {
    fn new(config: &Config) -> Result<Self> {
        let api_token = config.api_token.clone().ok_or_else(|| {
            Error::InvalidInput("Hugging Face API token is required".to_string())
        })?;
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client: Arc::new(client),
            api_token,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::InferenceUnavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::InferenceUnavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::InferenceUnavailable(format!("status {}: {}", status, text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::InferenceUnavailable(format!("malformed response: {}", e)))
    }
}

impl fmt::Debug for HuggingFaceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceClient")
            .field("client", &"<reqwest::Client>")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Token classification through the hosted NER pipeline.
#[derive(Debug, Clone)]
pub struct HuggingFaceRecognizer {
    client: HuggingFaceClient,
    model_url: String,
}

impl HuggingFaceRecognizer {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: HuggingFaceClient::new(config)?,
            model_url: config.ner_model_url.clone(),
        })
    }
}

#[async_trait]
impl EntityRecognizer for HuggingFaceRecognizer {
    fn name(&self) -> &str {
        "HuggingFace NER"
    }

    #[instrument(level = "debug", skip_all, fields(chars = text.chars().count()))]
    async fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>> {
        let value = self
            .client
            .post(&self.model_url, &NerRequest { inputs: text })
            .await?;
        let spans = parse_ner_response(text, value)?;
        debug!(spans = spans.len(), "Recognized entity spans");
        Ok(spans)
    }
}

/// Zero-shot entailment scoring with independent per-label scores.
#[derive(Debug, Clone)]
pub struct HuggingFaceClassifier {
    client: HuggingFaceClient,
    model_url: String,
}

impl HuggingFaceClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: HuggingFaceClient::new(config)?,
            model_url: config.zero_shot_model_url.clone(),
        })
    }
}

#[async_trait]
impl CategoryClassifier for HuggingFaceClassifier {
    fn name(&self) -> &str {
        "HuggingFace zero-shot"
    }

    #[instrument(level = "debug", skip_all, fields(labels = labels.len()))]
    async fn score(&self, text: &str, labels: &LabelSet) -> Result<HashMap<String, f64>> {
        let request = ZeroShotRequest::new(text, labels);
        let value = self.client.post(&self.model_url, &request).await?;
        parse_zero_shot_response(value)
    }
}

fn error_message(value: &Value) -> String {
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("unexpected response: {}", value))
}

/// Converts a character offset reported by the backend into a byte offset into `text`.
fn char_to_byte(text: &str, char_idx: usize) -> Option<usize> {
    if char_idx == text.chars().count() {
        return Some(text.len());
    }
    text.char_indices().nth(char_idx).map(|(byte, _)| byte)
}

pub(crate) fn parse_ner_response(text: &str, value: Value) -> Result<Vec<EntitySpan>> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(Error::InferenceUnavailable(error_message(&other))),
    };
    // Batched responses come wrapped in one more array.
    let items = match items.first() {
        Some(Value::Array(_)) => items
            .into_iter()
            .flat_map(|inner| match inner {
                Value::Array(inner) => inner,
                _ => Vec::new(),
            })
            .collect(),
        _ => items,
    };

    let mut spans = Vec::with_capacity(items.len());
    for item in items {
        let token: NerToken = serde_json::from_value(item)
            .map_err(|e| Error::InferenceUnavailable(format!("malformed entity: {}", e)))?;
        let label = token
            .entity_group
            .or(token.entity)
            .ok_or_else(|| Error::InferenceUnavailable("entity without a label".to_string()))?;
        let (tag, entity_type) = EntitySpan::parse_label(&label);
        let mut span = EntitySpan::new(token.word, entity_type, tag);
        if let (Some(start), Some(end)) = (token.start, token.end) {
            if let (Some(start), Some(end)) = (char_to_byte(text, start), char_to_byte(text, end)) {
                span = span.with_offsets(start, end);
            }
        }
        spans.push(span);
    }
    Ok(spans)
}

pub(crate) fn parse_zero_shot_response(value: Value) -> Result<HashMap<String, f64>> {
    let value = match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    if value.get("labels").is_none() {
        return Err(Error::InferenceUnavailable(error_message(&value)));
    }
    let response: ZeroShotResponse = serde_json::from_value(value)
        .map_err(|e| Error::InferenceUnavailable(format!("malformed classification: {}", e)))?;
    if response.labels.len() != response.scores.len() {
        return Err(Error::InferenceUnavailable(format!(
            "{} labels but {} scores",
            response.labels.len(),
            response.scores.len()
        )));
    }
    Ok(response.labels.into_iter().zip(response.scores).collect())
}
