use clap::Parser;
use lead_aggregator::{
    AppConfig, Classifier, LeadService, RedditFetcher, Store, TokenCache,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "lead-aggregator",
    about = "Ingest subreddit posts and comments and surface commercial leads"
)]
struct Cli {
    /// Subreddits to ingest, comma separated (e.g. webdev,forhire)
    #[arg(long, value_delimiter = ',', required = true)]
    subreddits: Vec<String>,

    /// Posts fetched per subreddit
    #[arg(long, default_value_t = lead_aggregator::service::DEFAULT_POSTS_LIMIT)]
    limit: usize,

    /// Overrides DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let database_url = cli.database_url.unwrap_or_else(|| config.database_url.clone());

    info!("Starting lead aggregator (database: {})", database_url);

    let store = Arc::new(Store::connect(&database_url).await?);
    let tokens = Arc::new(TokenCache::new(
        config.reddit_client_id.clone(),
        config.reddit_client_secret.clone(),
    ));
    let fetcher = Arc::new(RedditFetcher::new(tokens));
    let classifier = Classifier::from_api_key(config.openai_api_key.clone());
    let service = LeadService::new(store, fetcher, classifier);

    let outcome = service.parse_and_analyze(&cli.subreddits, cli.limit).await?;

    for report in &outcome.parse_results {
        match &report.error {
            Some(message) => error!("r/{}: ingestion failed: {}", report.subreddit, message),
            None => info!(
                "r/{}: {} posts, {} comments",
                report.subreddit, report.posts_count, report.comments_count
            ),
        }
    }

    info!(
        "Classified {} posts ({} leads) and {} comments ({} leads)",
        outcome.analysis.posts.analyzed,
        outcome.analysis.posts.leads,
        outcome.analysis.comments.analyzed,
        outcome.analysis.comments.leads
    );

    for stats in &outcome.statistics {
        info!(
            "r/{}: posts {}/{} (coefficient {:.2}), comments {}/{} (coefficient {:.2})",
            stats.subreddit,
            stats.posts.leads,
            stats.posts.total,
            stats.posts.coefficient,
            stats.comments.leads,
            stats.comments.total,
            stats.comments.coefficient
        );
    }

    Ok(())
}
