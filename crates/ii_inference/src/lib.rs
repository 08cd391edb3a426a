use std::time::Duration;

use ii_core::catalog::{COMPANIES, DEFAULT_HYPOTHESIS_TEMPLATE};

pub mod classification;
pub mod entities;
pub mod models;

pub const DEFAULT_NER_MODEL_URL: &str = concat!(
    "https://api-inference.huggingface.co/models/",
    "FacebookAI/xlm-roberta-large-finetuned-conll03-english"
);
pub const DEFAULT_ZERO_SHOT_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-mnli";

/// Default decision boundary for a label match.
pub const DEFAULT_THRESHOLD: f64 = 0.5;
/// Characters of input text submitted to the classifier.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 512;

/// Which implementation answers recognizer or classifier calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackendKind {
    /// Hosted Hugging Face Inference API.
    #[default]
    #[value(name = "huggingface")]
    HuggingFace,
    /// Offline keyword matching.
    Keyword,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_token: Option<String>,
    pub ner_model_url: String,
    pub zero_shot_model_url: String,
    pub recognizer: BackendKind,
    pub classifier: BackendKind,
    /// HTTP timeout for a single backend request.
    pub request_timeout: Duration,
    /// Upper bound on one recognizer or classifier call, enforced by the adapters.
    pub inference_timeout: Duration,
    pub threshold: f64,
    pub max_input_chars: usize,
    pub hypothesis_template: String,
    /// Classification calls in flight at once while filtering a corpus.
    pub concurrency: usize,
    /// Organization names known to the keyword recognizer.
    pub gazetteer: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            ner_model_url: DEFAULT_NER_MODEL_URL.to_string(),
            zero_shot_model_url: DEFAULT_ZERO_SHOT_MODEL_URL.to_string(),
            recognizer: BackendKind::default(),
            classifier: BackendKind::default(),
            request_timeout: Duration::from_secs(30),
            inference_timeout: Duration::from_secs(30),
            threshold: DEFAULT_THRESHOLD,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            hypothesis_template: DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
            concurrency: 4,
            gazetteer: COMPANIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

pub use classification::ClassificationEngine;
pub use entities::EntityExtractor;
pub use ii_core::OrganizationSpan;
pub use models::{create_classifier, create_recognizer};
