use ii_core::{ArticleRecord, Corpus, FilterSelection, Result};
use ii_inference::ClassificationEngine;

use crate::aggregator::{build_frequency_table, OrganizationFrequencyTable};
use crate::filter::{evaluate_with, FilterOptions};

/// State for one crawl: the corpus, its frequency table and the operator's current selection.
/// Built once per crawl and passed explicitly to every query.
#[derive(Debug, Clone)]
pub struct Session {
    corpus: Corpus,
    frequency_table: OrganizationFrequencyTable,
    selection: FilterSelection,
    options: FilterOptions,
}

impl Session {
    pub fn new(corpus: Corpus) -> Self {
        let frequency_table = build_frequency_table(&corpus);
        Self {
            corpus,
            frequency_table,
            selection: FilterSelection::default(),
            options: FilterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FilterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn frequency_table(&self) -> &OrganizationFrequencyTable {
        &self.frequency_table
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn top_organizations(&self, n: usize) -> Vec<(String, usize)> {
        self.frequency_table.top_n(n)
    }

    pub fn select_companies(&mut self, companies: Vec<String>) {
        self.selection.set_companies(companies);
    }

    pub fn select_industries(&mut self, industries: Vec<String>) {
        self.selection.set_industries(industries);
    }

    pub fn select_news_categories(&mut self, news_categories: Vec<String>) {
        self.selection.set_news_categories(news_categories);
    }

    pub fn focus_organization(&mut self, organization: impl Into<String>) {
        self.selection.focus_organization(organization);
    }

    /// Articles matching the current selection.
    pub async fn query(&self, engine: &ClassificationEngine) -> Result<Vec<&ArticleRecord>> {
        evaluate_with(&self.corpus, &self.selection, engine, &self.options).await
    }
}
