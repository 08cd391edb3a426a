use std::collections::{HashMap, HashSet};

use ii_core::{ArticleRecord, Corpus};
use serde::Serialize;

/// Mention counts per organization name, keyed by exact string.
/// Iteration follows the order in which names were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationFrequencyTable {
    entries: Vec<(String, usize)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl OrganizationFrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one more mention of `organization`.
    pub fn record(&mut self, organization: &str) {
        match self.index.get(organization) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(organization.to_string(), self.entries.len());
                self.entries.push((organization.to_string(), 1));
            }
        }
    }

    pub fn count(&self, organization: &str) -> usize {
        self.index
            .get(organization)
            .map_or(0, |&slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_mentions(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(org, count)| (org.as_str(), *count))
    }

    /// The `n` most mentioned organizations. Equal counts keep first-seen order.
    pub fn top_n(&self, n: usize) -> Vec<(String, usize)> {
        let mut ranked = self.entries.clone();
        // stable: ties stay in first-seen order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Sums every detected organization across the corpus, in article order.
pub fn build_frequency_table(corpus: &Corpus) -> OrganizationFrequencyTable {
    let mut table = OrganizationFrequencyTable::new();
    for organization in corpus.iter().flat_map(|a| &a.detected_organizations) {
        table.record(organization);
    }
    table
}

pub fn top_n(table: &OrganizationFrequencyTable, n: usize) -> Vec<(String, usize)> {
    table.top_n(n)
}

/// Articles whose title or body contains `organization` as a plain substring.
///
/// This is looser than the extracted entity spans: a name is matched wherever it occurs,
/// including inside unrelated words, and whether or not the recognizer tagged it. An empty
/// name matches nothing.
pub fn articles_for_organization<'a>(
    corpus: &'a Corpus,
    organization: &str,
) -> Vec<&'a ArticleRecord> {
    if organization.is_empty() {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    corpus
        .iter()
        .filter(|a| a.title.contains(organization) || a.body.contains(organization))
        .filter(|a| seen.insert(a.id.as_str()))
        .collect()
}
