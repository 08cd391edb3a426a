use std::sync::Arc;

use ii_core::{CategoryClassifier, EntityRecognizer, Result};
use tracing::{info, warn};

use crate::{BackendKind, Config};

pub mod huggingface;
pub mod keyword;

pub use huggingface::{HuggingFaceClassifier, HuggingFaceRecognizer};
pub use keyword::{KeywordClassifier, KeywordRecognizer};

/// Resolves the configured backend, falling back to keyword matching without an API token.
fn effective_backend(kind: BackendKind, config: &Config, role: &str) -> BackendKind {
    if kind == BackendKind::HuggingFace && config.api_token.is_none() {
        warn!(role, "No Hugging Face API token configured, using keyword backend");
        return BackendKind::Keyword;
    }
    kind
}

pub fn create_recognizer(config: &Config) -> Result<Arc<dyn EntityRecognizer>> {
    let recognizer: Arc<dyn EntityRecognizer> =
        match effective_backend(config.recognizer, config, "recognizer") {
            BackendKind::HuggingFace => Arc::new(HuggingFaceRecognizer::new(config)?),
            BackendKind::Keyword => Arc::new(KeywordRecognizer::new(config.gazetteer.clone())),
        };
    info!(backend = recognizer.name(), "Entity recognizer ready");
    Ok(recognizer)
}

pub fn create_classifier(config: &Config) -> Result<Arc<dyn CategoryClassifier>> {
    let classifier: Arc<dyn CategoryClassifier> =
        match effective_backend(config.classifier, config, "classifier") {
            BackendKind::HuggingFace => Arc::new(HuggingFaceClassifier::new(config)?),
            BackendKind::Keyword => Arc::new(KeywordClassifier::new()),
        };
    info!(backend = classifier.name(), "Category classifier ready");
    Ok(classifier)
}
