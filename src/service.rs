use std::sync::Arc;
use tracing::info;

use crate::analysis::Analyzer;
use crate::classifier::Classifier;
use crate::fetcher::RedditFetcher;
use crate::ingestion::Ingestor;
use crate::stats::StatsAggregator;
use crate::store::Store;
use crate::types::{
    IngestReport, LeadError, LeadWithContext, PipelineOutcome, Result, SubredditStats,
};

pub const MAX_SUBREDDITS_PER_REQUEST: usize = 5;
pub const DEFAULT_POSTS_LIMIT: usize = 25;

const SUGGESTED_SUBREDDITS: [&str; 8] = [
    "webdev",
    "forhire",
    "startups",
    "entrepreneur",
    "smallbusiness",
    "freelance",
    "SideProject",
    "indiebiz",
];

/// Composed pipeline surface: everything an HTTP layer would call.
pub struct LeadService {
    store: Arc<Store>,
    ingestor: Ingestor,
    analyzer: Analyzer,
    stats: StatsAggregator,
}

impl LeadService {
    pub fn new(store: Arc<Store>, fetcher: Arc<RedditFetcher>, classifier: Classifier) -> Self {
        let ingestor = Ingestor::new(fetcher, store.clone());
        let analyzer = Analyzer::new(classifier, store.clone());
        let stats = StatsAggregator::new(store.clone());

        Self {
            store,
            ingestor,
            analyzer,
            stats,
        }
    }

    pub fn suggested_subreddits() -> Vec<String> {
        SUGGESTED_SUBREDDITS.iter().map(|s| s.to_string()).collect()
    }

    fn validate_request(subreddits: &[String], posts_limit: usize) -> Result<()> {
        if subreddits.is_empty() {
            return Err(LeadError::Validation(
                "at least one subreddit is required".to_string(),
            ));
        }
        if subreddits.len() > MAX_SUBREDDITS_PER_REQUEST {
            return Err(LeadError::Validation(format!(
                "maximum {} subreddits allowed",
                MAX_SUBREDDITS_PER_REQUEST
            )));
        }
        if !(1..=100).contains(&posts_limit) {
            return Err(LeadError::Validation(
                "posts limit must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }

    /// Ingestion only: fetch and persist posts and comments per subreddit.
    pub async fn parse_subreddits(
        &self,
        subreddits: &[String],
        posts_limit: usize,
    ) -> Result<Vec<IngestReport>> {
        Self::validate_request(subreddits, posts_limit)?;
        Ok(self.ingestor.ingest(subreddits, posts_limit).await)
    }

    /// Full pipeline: validate, ingest, classify everything pending for the
    /// requested subreddits, then aggregate fresh statistics. Validation
    /// runs before any network call.
    pub async fn parse_and_analyze(
        &self,
        subreddits: &[String],
        posts_limit: usize,
    ) -> Result<PipelineOutcome> {
        Self::validate_request(subreddits, posts_limit)?;

        info!(
            "Running pipeline for {} subreddits (limit {})",
            subreddits.len(),
            posts_limit
        );

        let parse_results = self.ingestor.ingest(subreddits, posts_limit).await;

        let subreddit_ids = self.store.subreddit_ids_by_names(subreddits).await?;
        let analysis = self.analyzer.classify_all(&subreddit_ids).await?;
        let statistics = self.stats.aggregate(Some(&subreddit_ids)).await?;

        Ok(PipelineOutcome {
            parse_results,
            analysis,
            statistics,
        })
    }

    /// Leads with their referenced records, ordered by confidence then
    /// recency.
    pub async fn get_leads(
        &self,
        subreddit_ids: Option<&[String]>,
    ) -> Result<Vec<LeadWithContext>> {
        self.store.list_leads(subreddit_ids).await
    }

    pub async fn get_statistics(
        &self,
        subreddit_ids: Option<&[String]>,
    ) -> Result<Vec<SubredditStats>> {
        self.stats.aggregate(subreddit_ids).await
    }
}
