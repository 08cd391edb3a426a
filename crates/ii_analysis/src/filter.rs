use ii_core::catalog::DEFAULT_HYPOTHESIS_TEMPLATE;
use ii_core::{ArticleRecord, Corpus, FilterMode, FilterSelection, LabelSet, Result, TextField};
use ii_inference::ClassificationEngine;
use tracing::{debug, instrument};

use crate::aggregator::articles_for_organization;

/// Knobs for facet evaluation.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub threshold: f64,
    pub field: TextField,
    pub hypothesis_template: String,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            threshold: ii_inference::DEFAULT_THRESHOLD,
            field: TextField::Title,
            hypothesis_template: DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
        }
    }
}

impl FilterOptions {
    /// Default options at the engine's configured operating point.
    pub fn for_engine(engine: &ClassificationEngine) -> Self {
        Self {
            threshold: engine.threshold(),
            ..Self::default()
        }
    }
}

/// Applies `selection` to `corpus`, classifying titles at the engine's threshold.
pub async fn evaluate<'a>(
    corpus: &'a Corpus,
    selection: &FilterSelection,
    engine: &ClassificationEngine,
) -> Result<Vec<&'a ArticleRecord>> {
    evaluate_with(corpus, selection, engine, &FilterOptions::for_engine(engine)).await
}

/// Organization focus wins over facets. With neither, the whole corpus is returned.
#[instrument(level = "info", skip_all, fields(articles = corpus.len()))]
pub async fn evaluate_with<'a>(
    corpus: &'a Corpus,
    selection: &FilterSelection,
    engine: &ClassificationEngine,
    options: &FilterOptions,
) -> Result<Vec<&'a ArticleRecord>> {
    let matched = match selection.mode() {
        FilterMode::All => corpus.iter().collect(),
        FilterMode::Organization(organization) => {
            debug!(%organization, "Organization focus");
            articles_for_organization(corpus, organization)
        }
        FilterMode::Facets(labels) => {
            let labels = LabelSet::new(labels, options.hypothesis_template.as_str())?;
            debug!(labels = ?labels.labels(), "Facet filter");
            engine
                .filter_by_any_label(corpus, &labels, options.threshold, options.field)
                .await
        }
    };
    debug!(matched = matched.len(), "Filter evaluated");
    Ok(matched)
}
