use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ii_analysis::{FilterOptions, Session};
use ii_core::catalog::Facet;
use ii_core::{ArticleRecord, TextField};
use ii_inference::{
    create_classifier, create_recognizer, BackendKind, ClassificationEngine, Config,
    EntityExtractor, DEFAULT_NER_MODEL_URL, DEFAULT_ZERO_SHOT_MODEL_URL,
};
use ii_scrapers::{init_logging, CrawlConfig, CrawlStats, Crawler, EntitySource};
use serde::Serialize;
use tracing::{info, Level};

mod render;

#[derive(Debug, Clone, Copy)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                }
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // a bare number means seconds
        if !current_number.is_empty() {
            total_seconds += current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            has_unit = true;
        }

        if !has_unit || total_seconds == 0 {
            return Err(
                "Duration must be a positive number of seconds, minutes or hours".to_string(),
            );
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Crawl a news site, rank organizations and filter articles",
    long_about = None
)]
struct Cli {
    /// Hugging Face Inference API token. Without it the keyword backends are used.
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true, global = true)]
    api_token: Option<String>,
    #[arg(long, value_enum, default_value = "huggingface", global = true)]
    recognizer: BackendKind,
    #[arg(long, value_enum, default_value = "huggingface", global = true)]
    classifier: BackendKind,
    #[arg(long, default_value = DEFAULT_NER_MODEL_URL, global = true)]
    ner_model_url: String,
    #[arg(long, default_value = DEFAULT_ZERO_SHOT_MODEL_URL, global = true)]
    zero_shot_model_url: String,
    /// Timeout for each page fetch and each inference call (e.g. 30s, 1m)
    #[arg(long, default_value = "30s", global = true)]
    timeout: HumanDuration,
    /// Requests in flight at once
    #[arg(long, default_value_t = 8, global = true)]
    concurrency: usize,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl listing pages, then rank and filter the collected articles
    Crawl(CrawlArgs),
    /// List the selectable companies, industries and news categories
    Labels,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Listing base URL; page numbers are appended as a path segment
    base_url: String,
    #[arg(long, default_value_t = 30)]
    start_page: u32,
    /// Exclusive upper bound
    #[arg(long, default_value_t = 100)]
    end_page: u32,
    #[arg(long, default_value_t = 30)]
    step: u32,
    #[arg(long = "company")]
    companies: Vec<String>,
    #[arg(long = "industry")]
    industries: Vec<String>,
    #[arg(long = "category")]
    news_categories: Vec<String>,
    /// Show articles mentioning this organization instead of applying facets
    #[arg(long)]
    organization: Option<String>,
    /// Number of ranked organizations to show
    #[arg(long, default_value_t = 10)]
    top: usize,
    #[arg(long, default_value_t = ii_inference::DEFAULT_THRESHOLD)]
    threshold: f64,
    /// Article field handed to the classifier
    #[arg(long, value_enum, default_value = "title")]
    classify_field: FieldArg,
    /// Article text handed to the entity recognizer
    #[arg(long, value_enum, default_value = "title")]
    entities_from: EntitySourceArg,
    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FieldArg {
    Title,
    Body,
}

impl From<FieldArg> for TextField {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Title => TextField::Title,
            FieldArg::Body => TextField::Body,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EntitySourceArg {
    Title,
    Body,
    Both,
}

impl From<EntitySourceArg> for EntitySource {
    fn from(arg: EntitySourceArg) -> Self {
        match arg {
            EntitySourceArg::Title => EntitySource::Title,
            EntitySourceArg::Body => EntitySource::Body,
            EntitySourceArg::Both => EntitySource::TitleAndBody,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    articles_scraped: usize,
    pages_failed: usize,
    articles_failed: usize,
    top_organizations: Vec<(String, usize)>,
    results: Vec<&'a ArticleRecord>,
}

impl Cli {
    fn inference_config(&self) -> Config {
        Config {
            api_token: self.api_token.clone(),
            ner_model_url: self.ner_model_url.clone(),
            zero_shot_model_url: self.zero_shot_model_url.clone(),
            recognizer: self.recognizer,
            classifier: self.classifier,
            request_timeout: self.timeout.0,
            inference_timeout: self.timeout.0,
            concurrency: self.concurrency,
            ..Config::default()
        }
    }
}

/// Maps operator input onto catalog spellings, rejecting unknown values.
fn resolve_facet(facet: Facet, values: &[String]) -> anyhow::Result<Vec<String>> {
    values
        .iter()
        .map(|value| match facet.lookup(value) {
            Some(label) => Ok(label.to_string()),
            None => bail!(
                "unknown {} {:?}; run `ii labels` for the accepted values",
                facet.title().to_lowercase(),
                value
            ),
        })
        .collect()
}

fn print_labels() {
    for facet in [Facet::Company, Facet::Industry, Facet::NewsCategory] {
        println!("Filter by {}:", facet.title());
        for label in facet.labels() {
            println!("  - {}", label);
        }
    }
}

async fn run_crawl(cli: &Cli, args: &CrawlArgs) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&args.threshold) {
        bail!("threshold must be within [0, 1], got {}", args.threshold);
    }
    let companies = resolve_facet(Facet::Company, &args.companies)?;
    let industries = resolve_facet(Facet::Industry, &args.industries)?;
    let news_categories = resolve_facet(Facet::NewsCategory, &args.news_categories)?;

    let config = Config {
        threshold: args.threshold,
        ..cli.inference_config()
    };
    let extractor = EntityExtractor::new(create_recognizer(&config)?, config.inference_timeout);
    let crawl_config = CrawlConfig {
        concurrency: cli.concurrency,
        request_timeout: cli.timeout.0,
        entity_source: args.entities_from.into(),
        ..CrawlConfig::default()
    };
    let crawler = Crawler::with_http(extractor, crawl_config)?;

    info!(base_url = %args.base_url, "Scraping website");
    let (corpus, stats): (_, CrawlStats) = crawler
        .crawl_with_stats(&args.base_url, args.start_page, args.end_page, args.step)
        .await
        .with_context(|| format!("crawl of {} failed", args.base_url))?;

    let engine = ClassificationEngine::new(create_classifier(&config)?, &config);
    let mut session = Session::new(corpus).with_options(FilterOptions {
        field: args.classify_field.into(),
        ..FilterOptions::for_engine(&engine)
    });
    session.select_companies(companies);
    session.select_industries(industries);
    session.select_news_categories(news_categories);
    if let Some(organization) = &args.organization {
        session.focus_organization(organization.as_str());
    }

    let results = session.query(&engine).await?;

    if args.json {
        let report = Report {
            articles_scraped: session.corpus().len(),
            pages_failed: stats.pages_failed,
            articles_failed: stats.articles_failed,
            top_organizations: session.top_organizations(args.top),
            results,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if session.corpus().is_empty() {
        println!("No articles found.");
        return Ok(());
    }
    println!("Scraped {} articles!\n", session.corpus().len());
    println!("{}", render::render_organizations(session.frequency_table(), args.top));
    println!("### Filtered Articles:");
    if results.is_empty() {
        println!("(no article matches the selection)");
    }
    for article in results {
        println!("{}", render::render_article(article));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    init_logging(level);

    match &cli.command {
        Commands::Crawl(args) => run_crawl(&cli, args).await,
        Commands::Labels => {
            print_labels();
            Ok(())
        }
    }
}
