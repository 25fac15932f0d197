use std::sync::Arc;
use tracing::{error, info};

use crate::fetcher::RedditFetcher;
use crate::store::Store;
use crate::types::{IngestReport, Result};

/// Drives ingestion subreddit by subreddit. One failing subreddit is
/// recorded in its report slot and never aborts the rest of the batch.
pub struct Ingestor {
    fetcher: Arc<RedditFetcher>,
    store: Arc<Store>,
}

impl Ingestor {
    pub fn new(fetcher: Arc<RedditFetcher>, store: Arc<Store>) -> Self {
        Self { fetcher, store }
    }

    pub async fn ingest(&self, subreddits: &[String], posts_limit: usize) -> Vec<IngestReport> {
        let mut reports = Vec::with_capacity(subreddits.len());

        for name in subreddits {
            match self.ingest_one(name, posts_limit).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Failed to ingest r/{}: {}", name, e);
                    reports.push(IngestReport {
                        subreddit: name.clone(),
                        posts_count: 0,
                        comments_count: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        reports
    }

    async fn ingest_one(&self, name: &str, posts_limit: usize) -> Result<IngestReport> {
        let subreddit = self.store.get_or_create_subreddit(name).await?;
        let posts = self.fetcher.fetch_posts(name, posts_limit).await?;
        let window_start = RedditFetcher::default_window_start();

        let mut comments_count = 0;
        for fetched in &posts {
            let post = self.store.upsert_post(fetched, &subreddit.id).await?;

            let comments = self
                .fetcher
                .fetch_comments(&fetched.id, name, window_start)
                .await;
            comments_count += comments.len();

            for comment in &comments {
                self.store.upsert_comment(comment, &post.id).await?;
            }
        }

        info!(
            "Ingested r/{}: {} posts, {} comments",
            name,
            posts.len(),
            comments_count
        );

        Ok(IngestReport {
            subreddit: name.to_string(),
            posts_count: posts.len(),
            comments_count,
            error: None,
        })
    }
}
