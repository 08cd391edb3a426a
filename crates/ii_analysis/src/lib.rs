pub mod aggregator;
pub mod filter;
pub mod session;

pub use aggregator::{
    articles_for_organization, build_frequency_table, top_n, OrganizationFrequencyTable,
};
pub use filter::{evaluate, evaluate_with, FilterOptions};
pub use session::Session;
