use std::sync::Arc;

use crate::store::Store;
use crate::types::{KindStats, Result, SubredditStats};

/// Computes per-subreddit lead coefficients from current persisted state on
/// every call; nothing is cached.
pub struct StatsAggregator {
    store: Arc<Store>,
}

impl StatsAggregator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn aggregate(&self, subreddit_ids: Option<&[String]>) -> Result<Vec<SubredditStats>> {
        let subreddits = self.store.subreddits(subreddit_ids).await?;
        let mut statistics = Vec::with_capacity(subreddits.len());

        for subreddit in subreddits {
            let (post_total, post_leads) = self.store.post_counts(&subreddit.id).await?;
            let (comment_total, comment_leads) = self.store.comment_counts(&subreddit.id).await?;

            statistics.push(SubredditStats {
                subreddit: subreddit.name,
                posts: KindStats::new(post_total, post_leads),
                comments: KindStats::new(comment_total, comment_leads),
            });
        }

        Ok(statistics)
    }
}
