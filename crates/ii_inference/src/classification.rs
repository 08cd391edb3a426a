use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, StreamExt};
use ii_core::{
    ArticleRecord, CategoryClassifier, ClassificationResult, Error, LabelSet, Result, TextField,
};
use tracing::{debug, instrument, warn};

use crate::Config;

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Zero-shot classification over a caller-chosen label set.
#[derive(Debug, Clone)]
pub struct ClassificationEngine {
    classifier: Arc<dyn CategoryClassifier>,
    timeout: Duration,
    max_input_chars: usize,
    threshold: f64,
    concurrency: usize,
}

impl ClassificationEngine {
    pub fn new(classifier: Arc<dyn CategoryClassifier>, config: &Config) -> Self {
        Self {
            classifier,
            timeout: config.inference_timeout,
            max_input_chars: config.max_input_chars,
            threshold: config.threshold,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Configured operating point.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scores every label against `text`. Long text is truncated, not rejected.
    pub async fn classify(&self, text: &str, labels: &LabelSet) -> Result<ClassificationResult> {
        if labels.is_empty() {
            return Ok(ClassificationResult::default());
        }
        let input = truncate_chars(text, self.max_input_chars);

        let scoring = self.classifier.score(input, labels);
        let raw = match tokio::time::timeout(self.timeout, scoring).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(Error::ClassificationUnavailable(e.to_string())),
            Err(_) => {
                return Err(Error::ClassificationUnavailable(format!(
                    "{} timed out after {:?}",
                    self.classifier.name(),
                    self.timeout
                )))
            }
        };
        Ok(ClassificationResult::from_scores(labels, &raw))
    }

    /// Labels whose score strictly exceeds `threshold`, in label-set order.
    pub async fn classify_with_threshold(
        &self,
        text: &str,
        labels: &LabelSet,
        threshold: f64,
    ) -> Result<Vec<String>> {
        Ok(self.classify(text, labels).await?.labels_above(threshold))
    }

    /// Scores labels one at a time in order and stops at the first one above `threshold`.
    /// Labels after the match are never submitted.
    pub async fn first_matching_label(
        &self,
        text: &str,
        labels: &LabelSet,
        threshold: f64,
    ) -> Result<Option<String>> {
        for label in labels.labels() {
            let result = self.classify(text, &labels.only(label)).await?;
            if result.score(label).is_some_and(|score| score > threshold) {
                return Ok(Some(label.clone()));
            }
        }
        Ok(None)
    }

    /// Keeps, in input order, every article for which at least one label exceeds `threshold`
    /// on the chosen field. An article whose classification fails is left out and logged.
    #[instrument(level = "info", skip_all, fields(labels = labels.len(), threshold = threshold))]
    pub async fn filter_by_any_label<'a, I>(
        &self,
        articles: I,
        labels: &LabelSet,
        threshold: f64,
        field: TextField,
    ) -> Vec<&'a ArticleRecord>
    where
        I: IntoIterator<Item = &'a ArticleRecord>,
    {
        stream::iter(articles)
            .map(move |article| async move {
                match self.first_matching_label(article.text(field), labels, threshold).await {
                    Ok(Some(label)) => {
                        debug!(url = %article.url, %label, "Article matched");
                        Some(article)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!(
                            url = %article.url,
                            error = %e,
                            "Classification failed, skipping article"
                        );
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .filter_map(future::ready)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scores labels from a fixed table and records every label it was asked about.
    #[derive(Debug, Default)]
    struct TableClassifier {
        scores: HashMap<String, f64>,
        failing_text: Option<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl TableClassifier {
        fn new(scores: &[(&str, f64)]) -> Self {
            Self {
                scores: scores.iter().map(|(l, s)| (l.to_string(), *s)).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CategoryClassifier for TableClassifier {
        fn name(&self) -> &str {
            "table"
        }

        async fn score(&self, text: &str, labels: &LabelSet) -> Result<HashMap<String, f64>> {
            if self.failing_text.as_deref() == Some(text) {
                return Err(Error::InferenceUnavailable("backend down".into()));
            }
            let mut out = HashMap::new();
            for label in labels.labels() {
                self.calls
                    .lock()
                    .unwrap()
                    .push((text.to_string(), labels.hypothesis(label)));
                let key = format!("{}|{}", text, label);
                if let Some(score) = self.scores.get(&key).or_else(|| self.scores.get(label)) {
                    out.insert(label.clone(), *score);
                }
            }
            Ok(out)
        }
    }

    #[derive(Debug)]
    struct SlowClassifier;

    #[async_trait]
    impl CategoryClassifier for SlowClassifier {
        fn name(&self) -> &str {
            "slow"
        }

        async fn score(&self, _text: &str, _labels: &LabelSet) -> Result<HashMap<String, f64>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(HashMap::new())
        }
    }

    fn labels(names: &[&str]) -> LabelSet {
        LabelSet::new(names.iter().copied(), "This text is about {}.").unwrap()
    }

    fn engine(classifier: Arc<dyn CategoryClassifier>) -> ClassificationEngine {
        ClassificationEngine::new(classifier, &Config::default())
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }

    #[tokio::test]
    async fn test_classify_with_threshold_returns_subset() {
        let classifier = Arc::new(TableClassifier::new(&[
            ("Business", 0.91),
            ("Sports", 0.5),
            ("Politics", 0.73),
        ]));
        let engine = engine(classifier.clone());
        let set = labels(&["Politics", "Sports", "Business", "Health"]);

        let selected = engine.classify_with_threshold("text", &set, 0.5).await.unwrap();
        assert_eq!(selected, vec!["Politics", "Business"]);

        let result = engine.classify("text", &set).await.unwrap();
        for label in &selected {
            assert!(result.score(label).unwrap() > 0.5);
        }
        assert_eq!(
            classifier.calls()[0].1,
            "This text is about Politics."
        );
    }

    #[tokio::test]
    async fn test_classify_truncates_input() {
        let classifier = Arc::new(TableClassifier::new(&[("Business", 0.9)]));
        let engine = engine(classifier.clone());
        let long = "x".repeat(2000);
        engine.classify(&long, &labels(&["Business"])).await.unwrap();
        assert_eq!(classifier.calls()[0].0.chars().count(), 512);
    }

    #[tokio::test]
    async fn test_classify_maps_backend_error() {
        let classifier = Arc::new(TableClassifier {
            failing_text: Some("text".to_string()),
            ..TableClassifier::default()
        });
        let err = engine(classifier).classify("text", &labels(&["Business"])).await.unwrap_err();
        assert!(matches!(err, Error::ClassificationUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_classify_times_out() {
        let err = engine(Arc::new(SlowClassifier))
            .classify("text", &labels(&["Business"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ClassificationUnavailable(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_first_match_short_circuits() {
        let classifier = Arc::new(TableClassifier::new(&[
            ("Energy", 0.1),
            ("Business", 0.8),
            ("Sports", 0.99),
        ]));
        let engine = engine(classifier.clone());
        let set = labels(&["Energy", "Business", "Sports"]);

        let hit = engine.first_matching_label("t", &set, 0.5).await.unwrap();
        assert_eq!(hit.as_deref(), Some("Business"));
        let asked: Vec<_> = classifier.calls().into_iter().map(|(_, h)| h).collect();
        assert_eq!(
            asked,
            vec!["This text is about Energy.", "This text is about Business."]
        );
    }

    #[tokio::test]
    async fn test_no_match_evaluates_every_label() {
        let classifier = Arc::new(TableClassifier::new(&[("Energy", 0.1), ("Business", 0.4)]));
        let engine = engine(classifier.clone());
        let set = labels(&["Energy", "Business", "Sports"]);

        assert_eq!(engine.first_matching_label("t", &set, 0.5).await.unwrap(), None);
        assert_eq!(classifier.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_filter_by_any_label_keeps_order_and_isolates_failures() {
        let articles = vec![
            ArticleRecord::new("https://x.lk/1", "Dialog profits", "b"),
            ArticleRecord::new("https://x.lk/2", "Cricket final", "b"),
            ArticleRecord::new("https://x.lk/3", "Broken", "b"),
            ArticleRecord::new("https://x.lk/4", "Hemas expands", "b"),
        ];
        let classifier = Arc::new(TableClassifier {
            failing_text: Some("Broken".to_string()),
            ..TableClassifier::new(&[
                ("Dialog profits|Business", 0.9),
                ("Hemas expands|Business", 0.7),
                ("Cricket final|Sports", 0.95),
            ])
        });
        let engine = engine(classifier);
        let kept = engine
            .filter_by_any_label(&articles, &labels(&["Business"]), 0.5, TextField::Title)
            .await;
        let urls: Vec<_> = kept.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.lk/1", "https://x.lk/4"]);
    }

    #[tokio::test]
    async fn test_filter_by_body_field() {
        let articles = vec![ArticleRecord::new("https://x.lk/1", "Untitled", "Business")];
        let engine = engine(Arc::new(TableClassifier::new(&[("Business|Business", 0.9)])));
        let set = labels(&["Business"]);
        assert!(engine
            .filter_by_any_label(&articles, &set, 0.5, TextField::Title)
            .await
            .is_empty());
        assert_eq!(
            engine
                .filter_by_any_label(&articles, &set, 0.5, TextField::Body)
                .await
                .len(),
            1
        );
    }
}
