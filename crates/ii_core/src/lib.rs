pub mod catalog;
pub mod error;
pub mod models;
pub mod types;

pub use error::{Error, Result};
pub use models::{CategoryClassifier, EntityRecognizer, EntitySpan, EntityType, SpanTag};
pub use types::{
    ArticleRecord, ClassificationResult, Corpus, FilterMode, FilterSelection, LabelSet,
    OrganizationSpan, TextField,
};
