use std::sync::Arc;
use std::time::Duration;

use ii_core::{EntityRecognizer, EntitySpan, EntityType, Error, OrganizationSpan, SpanTag};
use tracing::{instrument, warn};

/// SentencePiece word-start marker.
const WORD_START: char = '\u{2581}';

/// Wraps an [`EntityRecognizer`] and normalizes its failures into "no organizations".
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    recognizer: Arc<dyn EntityRecognizer>,
    timeout: Duration,
}

impl EntityExtractor {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>, timeout: Duration) -> Self {
        Self {
            recognizer,
            timeout,
        }
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Organization names in text order. Never fails.
    pub async fn extract_organizations(&self, text: &str) -> Vec<String> {
        self.extract_organization_spans(text)
            .await
            .into_iter()
            .map(|span| span.text)
            .collect()
    }

    #[instrument(level = "debug", skip_all, fields(recognizer = self.recognizer.name()))]
    pub async fn extract_organization_spans(&self, text: &str) -> Vec<OrganizationSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let result = tokio::time::timeout(self.timeout, self.recognizer.recognize(text))
            .await
            .unwrap_or_else(|_| {
                Err(Error::InferenceUnavailable(format!(
                    "recognizer timed out after {:?}",
                    self.timeout
                )))
            });

        match result {
            Ok(spans) => merge_organization_spans(text, &spans),
            Err(e) => {
                warn!(error = %e, "Entity recognition failed, treating as no organizations");
                Vec::new()
            }
        }
    }
}

#[derive(Default)]
struct PendingSpan {
    text: String,
    start: Option<usize>,
    end: Option<usize>,
    has_offsets: bool,
    /// Pieces come from a SentencePiece vocabulary, where only marked pieces start a word.
    sentencepiece: bool,
}

impl PendingSpan {
    fn begin(span: &EntitySpan) -> Self {
        let mut pending = PendingSpan {
            has_offsets: true,
            sentencepiece: span.text.starts_with(WORD_START),
            ..PendingSpan::default()
        };
        pending.extend(span);
        pending
    }

    fn extend(&mut self, span: &EntitySpan) {
        let word = span.text.as_str();
        let (piece, starts_word) = if let Some(piece) = word.strip_prefix("##") {
            (piece, false)
        } else if let Some(piece) = word.strip_prefix(WORD_START) {
            (piece.trim(), true)
        } else {
            (word.trim(), !self.sentencepiece)
        };
        if starts_word && !self.text.is_empty() && !piece.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(piece);

        match (span.start, span.end) {
            (Some(start), Some(end)) => {
                self.start = Some(self.start.map_or(start, |s| s.min(start)));
                self.end = Some(self.end.map_or(end, |e| e.max(end)));
            }
            _ => self.has_offsets = false,
        }
    }

    fn finish(self, source: &str) -> Option<OrganizationSpan> {
        let (start, end) = if self.has_offsets {
            (self.start, self.end)
        } else {
            (None, None)
        };
        let text = match (start, end) {
            (Some(start), Some(end)) => source
                .get(start..end)
                .map(|slice| slice.trim().to_string())
                .unwrap_or(self.text),
            _ => self.text,
        };
        if text.is_empty() {
            return None;
        }
        Some(OrganizationSpan { text, start, end })
    }
}

/// Joins begin/continuation tokens of organization type into one span each, in input order.
/// A continuation with no open organization span starts a new one.
pub fn merge_organization_spans(source: &str, spans: &[EntitySpan]) -> Vec<OrganizationSpan> {
    let mut merged = Vec::new();
    let mut current: Option<PendingSpan> = None;

    for span in spans {
        if span.entity_type != EntityType::Organization {
            merged.extend(current.take().and_then(|p| p.finish(source)));
            continue;
        }
        match (span.tag, current.as_mut()) {
            (SpanTag::Inside, Some(pending)) => pending.extend(span),
            _ => {
                merged.extend(current.take().and_then(|p| p.finish(source)));
                current = Some(PendingSpan::begin(span));
            }
        }
    }
    merged.extend(current.and_then(|p| p.finish(source)));
    merged
}
