use std::collections::{HashMap, HashSet};
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Substitution slot in a hypothesis template.
pub const TEMPLATE_SLOT: &str = "{}";

/// One successfully extracted article. Keyed by its canonical URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub body: String,
    /// Organization spans in extraction order. Duplicates are kept.
    pub detected_organizations: Vec<String>,
    /// Recognized organizations located in `title`. Empty unless entities were read from the title.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title_spans: Vec<OrganizationSpan>,
    pub fetched_at: DateTime<Utc>,
}

impl ArticleRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            title: title.into(),
            url,
            body: body.into(),
            detected_organizations: Vec::new(),
            title_spans: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_organizations(mut self, organizations: Vec<String>) -> Self {
        self.detected_organizations = organizations;
        self
    }

    pub fn with_title_spans(mut self, spans: Vec<OrganizationSpan>) -> Self {
        self.title_spans = spans;
        self
    }

    /// Returns the text of the requested field.
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Title => &self.title,
            TextField::Body => &self.body,
        }
    }
}

/// One organization name reconstructed from one or more tagged tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSpan {
    pub text: String,
    /// Byte offsets into the source text, when every merged token carried them.
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl OrganizationSpan {
    pub fn range(&self) -> Option<Range<usize>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start < end => Some(start..end),
            _ => None,
        }
    }
}

/// Which article field is handed to a classifier or recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextField {
    #[default]
    Title,
    Body,
}

/// Ordered articles from one crawl run, unique by id.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Corpus {
    articles: Vec<ArticleRecord>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a corpus, silently discarding records whose id was already seen.
    pub fn from_records(records: impl IntoIterator<Item = ArticleRecord>) -> Self {
        let mut corpus = Self::new();
        for record in records {
            corpus.push(record);
        }
        corpus
    }

    /// Appends a record. Returns false and drops it if the id is already present.
    pub fn push(&mut self, record: ArticleRecord) -> bool {
        if !self.seen.insert(record.id.clone()) {
            return false;
        }
        self.articles.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArticleRecord> {
        self.articles.iter()
    }

    pub fn articles(&self) -> &[ArticleRecord] {
        &self.articles
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a ArticleRecord;
    type IntoIter = std::slice::Iter<'a, ArticleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ordered distinct labels plus the template that turns each one into a hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSet {
    labels: Vec<String>,
    template: String,
}

impl LabelSet {
    pub fn new<I, S>(labels: I, template: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let template = template.into();
        let slots = template.matches(TEMPLATE_SLOT).count();
        if slots != 1 {
            return Err(Error::InvalidInput(format!(
                "hypothesis template must contain '{}' exactly once, found {} in {:?}",
                TEMPLATE_SLOT, slots, template
            )));
        }

        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for label in labels {
            let label = label.into();
            if label.trim().is_empty() {
                return Err(Error::InvalidInput("labels must be non-empty".to_string()));
            }
            if !seen.insert(label.clone()) {
                return Err(Error::InvalidInput(format!("duplicate label: {}", label)));
            }
            ordered.push(label);
        }

        Ok(Self {
            labels: ordered,
            template,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Renders the hypothesis for one label.
    pub fn hypothesis(&self, label: &str) -> String {
        self.template.replacen(TEMPLATE_SLOT, label, 1)
    }

    /// A one-label set sharing this set's template.
    pub fn only(&self, label: &str) -> LabelSet {
        LabelSet {
            labels: vec![label.to_string()],
            template: self.template.clone(),
        }
    }
}

/// Per-label scores for one (text, label set) pair. Scores are independent and need not sum to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationResult {
    scores: Vec<(String, f64)>,
}

impl ClassificationResult {
    /// Re-associates raw backend scores with the label set by name. Labels the backend
    /// did not score are left out, unknown labels and NaN scores are dropped.
    pub fn from_scores(labels: &LabelSet, raw: &HashMap<String, f64>) -> Self {
        let scores = labels
            .labels()
            .iter()
            .filter_map(|label| {
                raw.get(label)
                    .filter(|score| !score.is_nan())
                    .map(|score| (label.clone(), score.clamp(0.0, 1.0)))
            })
            .collect();
        Self { scores }
    }

    pub fn score(&self, label: &str) -> Option<f64> {
        self.scores.iter().find(|(l, _)| l == label).map(|(_, s)| *s)
    }

    /// Labels whose score strictly exceeds `threshold`, in label-set order.
    pub fn labels_above(&self, threshold: f64) -> Vec<String> {
        self.scores
            .iter()
            .filter(|(_, score)| *score > threshold)
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(l, s)| (l.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Evaluation mode derived from a [`FilterSelection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterMode<'a> {
    /// No facet and no focus: the whole corpus.
    All,
    /// Union of selected facet labels, deduplicated, in selection order.
    Facets(Vec<String>),
    Organization(&'a str),
}

/// Operator selections for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub companies: Vec<String>,
    pub industries: Vec<String>,
    pub news_categories: Vec<String>,
    pub focused_organization: Option<String>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changing a facet drops any organization focus.
    pub fn set_companies(&mut self, companies: Vec<String>) {
        self.companies = companies;
        self.focused_organization = None;
    }

    pub fn set_industries(&mut self, industries: Vec<String>) {
        self.industries = industries;
        self.focused_organization = None;
    }

    pub fn set_news_categories(&mut self, news_categories: Vec<String>) {
        self.news_categories = news_categories;
        self.focused_organization = None;
    }

    /// Focusing an organization overrides the facets until a facet changes.
    pub fn focus_organization(&mut self, organization: impl Into<String>) {
        self.focused_organization = Some(organization.into());
    }

    pub fn facet_labels(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.companies
            .iter()
            .chain(&self.industries)
            .chain(&self.news_categories)
            .filter(|label| seen.insert(label.as_str()))
            .cloned()
            .collect()
    }

    pub fn mode(&self) -> FilterMode<'_> {
        if let Some(org) = self.focused_organization.as_deref() {
            return FilterMode::Organization(org);
        }
        let labels = self.facet_labels();
        if labels.is_empty() {
            FilterMode::All
        } else {
            FilterMode::Facets(labels)
        }
    }
}
