use std::collections::HashMap;

use async_trait::async_trait;
use ii_core::{
    CategoryClassifier, EntityRecognizer, EntitySpan, EntityType, LabelSet, Result, SpanTag,
};

/// Tags every occurrence of a known organization name. Longer names win on overlap.
#[derive(Debug, Clone)]
pub struct KeywordRecognizer {
    gazetteer: Vec<String>,
}

impl KeywordRecognizer {
    pub fn new(gazetteer: Vec<String>) -> Self {
        Self {
            gazetteer: gazetteer
                .into_iter()
                .filter(|name| !name.trim().is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl EntityRecognizer for KeywordRecognizer {
    fn name(&self) -> &str {
        "Keyword"
    }

    async fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>> {
        let mut hits: Vec<(usize, usize)> = self
            .gazetteer
            .iter()
            .flat_map(|name| {
                text.match_indices(name.as_str())
                    .map(|(start, m)| (start, start + m.len()))
            })
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut spans = Vec::new();
        let mut covered = 0;
        for (start, end) in hits {
            if start < covered {
                continue;
            }
            spans.push(
                EntitySpan::new(&text[start..end], EntityType::Organization, SpanTag::Begin)
                    .with_offsets(start, end),
            );
            covered = end;
        }
        Ok(spans)
    }
}

/// Scores 1.0 when the label occurs in the text (ignoring case), 0.0 otherwise.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CategoryClassifier for KeywordClassifier {
    fn name(&self) -> &str {
        "Keyword"
    }

    async fn score(&self, text: &str, labels: &LabelSet) -> Result<HashMap<String, f64>> {
        let haystack = text.to_lowercase();
        Ok(labels
            .labels()
            .iter()
            .map(|label| {
                let score = if haystack.contains(&label.to_lowercase()) { 1.0 } else { 0.0 };
                (label.clone(), score)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyword_recognizer_orders_and_resolves_overlap() {
        let recognizer = KeywordRecognizer::new(vec![
            "Keells".to_string(),
            "John Keells".to_string(),
            "Dialog".to_string(),
        ]);
        let spans = recognizer
            .recognize("Dialog and John Keells; Dialog again")
            .await
            .unwrap();
        let names: Vec<_> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(names, vec!["Dialog", "John Keells", "Dialog"]);
        assert_eq!((spans[1].start, spans[1].end), (Some(11), Some(22)));
    }

    #[tokio::test]
    async fn test_keyword_classifier() {
        let labels = LabelSet::new(["Business", "Sports"], "This text is about {}.").unwrap();
        let scores = KeywordClassifier::new()
            .score("Business news: profits up", &labels)
            .await
            .unwrap();
        assert_eq!(scores["Business"], 1.0);
        assert_eq!(scores["Sports"], 0.0);
    }
}
