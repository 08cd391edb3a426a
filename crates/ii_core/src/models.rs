use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::LabelSet;
use crate::Result;

/// Entity category reported by a recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Organization,
    Person,
    Location,
    Miscellaneous,
    Other(String),
}

impl EntityType {
    /// Parses CoNLL-style group names (`ORG`, `PER`, ...).
    pub fn from_group(group: &str) -> Self {
        match group.to_ascii_uppercase().as_str() {
            "ORG" => EntityType::Organization,
            "PER" => EntityType::Person,
            "LOC" => EntityType::Location,
            "MISC" => EntityType::Miscellaneous,
            _ => EntityType::Other(group.to_string()),
        }
    }
}

/// Position of a token inside a multi-token span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanTag {
    Begin,
    Inside,
}

/// One tagged span as returned by an entity recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    pub entity_type: EntityType,
    pub tag: SpanTag,
    /// Byte offsets into the submitted text, when the backend reports them.
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl EntitySpan {
    pub fn new(text: impl Into<String>, entity_type: EntityType, tag: SpanTag) -> Self {
        Self {
            text: text.into(),
            entity_type,
            tag,
            start: None,
            end: None,
        }
    }

    pub fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Parses `B-ORG` / `I-ORG` style token labels, or a bare group name.
    pub fn parse_label(label: &str) -> (SpanTag, EntityType) {
        match label.split_once('-') {
            Some(("B", group)) => (SpanTag::Begin, EntityType::from_group(group)),
            Some(("I", group)) => (SpanTag::Inside, EntityType::from_group(group)),
            _ => (SpanTag::Begin, EntityType::from_group(label)),
        }
    }
}

#[async_trait]
pub trait EntityRecognizer: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Tags spans in `text`, in text order.
    async fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>>;
}

#[async_trait]
pub trait CategoryClassifier: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Scores every label of `labels` against `text` independently. The map is keyed by label;
    /// callers must not rely on any ordering.
    async fn score(&self, text: &str, labels: &LabelSet) -> Result<HashMap<String, f64>>;
}
