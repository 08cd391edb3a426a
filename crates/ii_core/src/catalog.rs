//! Default facets offered to the operator.

pub const DEFAULT_HYPOTHESIS_TEMPLATE: &str = "This text is about {}.";

pub const COMPANIES: &[&str] = &["Hemas", "John Keells", "Dialog", "CSE"];

/// GICS sectors.
pub const INDUSTRIES: &[&str] = &[
    "Energy",
    "Materials",
    "Industrials",
    "Consumer Discretionary",
    "Consumer Staples",
    "Health Care",
    "Financials",
    "Information Technology",
    "Communication Services",
    "Utilities",
    "Real Estate",
];

pub const NEWS_CATEGORIES: &[&str] = &[
    "Politics",
    "Business",
    "Technology",
    "Health",
    "Entertainment",
    "Sports",
];

/// Facet group a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Company,
    Industry,
    NewsCategory,
}

impl Facet {
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Facet::Company => COMPANIES,
            Facet::Industry => INDUSTRIES,
            Facet::NewsCategory => NEWS_CATEGORIES,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Facet::Company => "Company",
            Facet::Industry => "Industry",
            Facet::NewsCategory => "News Classification",
        }
    }

    /// Finds the catalog spelling of `label`, ignoring case.
    pub fn lookup(&self, label: &str) -> Option<&'static str> {
        self.labels()
            .iter()
            .copied()
            .find(|known| known.eq_ignore_ascii_case(label.trim()))
    }
}
