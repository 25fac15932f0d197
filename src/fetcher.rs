use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use crate::auth::TokenCache;
use crate::types::{FetchedComment, FetchedPost, LeadError, Result};

const USER_AGENT: &str = "reddit-lead-aggregator/0.1";
const PUBLIC_BASE_URL: &str = "https://www.reddit.com";
const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
const COMMENTS_LIMIT: usize = 100;

/// Comments older than this many days are dropped during extraction.
pub const COMMENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: FetchedPost,
}

/// Fetches subreddit listings and comment trees, choosing the authenticated
/// endpoint whenever the token cache yields a non-empty credential.
pub struct RedditFetcher {
    http: reqwest::Client,
    tokens: Arc<TokenCache>,
    public_base: String,
    oauth_base: String,
}

impl RedditFetcher {
    pub fn new(tokens: Arc<TokenCache>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(StdDuration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            tokens,
            public_base: PUBLIC_BASE_URL.to_string(),
            oauth_base: OAUTH_BASE_URL.to_string(),
        }
    }

    pub fn with_base_urls(mut self, public: &str, oauth: &str) -> Self {
        self.public_base = public.to_string();
        self.oauth_base = oauth.to_string();
        self
    }

    pub fn default_window_start() -> DateTime<Utc> {
        Utc::now() - Duration::days(COMMENT_WINDOW_DAYS)
    }

    async fn base_and_token(&self) -> (String, String) {
        let token = self.tokens.token().await;
        if token.is_empty() {
            (self.public_base.clone(), token)
        } else {
            (self.oauth_base.clone(), token)
        }
    }

    /// Fetches one page of newest posts for a subreddit. Transport and
    /// decode failures surface as a per-source error so the caller decides
    /// whether to continue with other subreddits.
    pub async fn fetch_posts(&self, subreddit: &str, limit: usize) -> Result<Vec<FetchedPost>> {
        let (base, token) = self.base_and_token().await;
        let url = format!("{}/r/{}/new.json?limit={}", base, subreddit, limit);

        debug!("Fetching posts: {}", url);

        let mut request = self.http.get(&url);
        if !token.is_empty() {
            request = request.bearer_auth(&token);
        }

        let response = request.send().await.map_err(|e| LeadError::Fetch {
            subreddit: subreddit.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(LeadError::Fetch {
                subreddit: subreddit.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let listing: Listing = response.json().await.map_err(|e| LeadError::Fetch {
            subreddit: subreddit.to_string(),
            message: e.to_string(),
        })?;

        let posts: Vec<FetchedPost> = listing.data.children.into_iter().map(|c| c.data).collect();
        info!("Fetched {} posts from r/{}", posts.len(), subreddit);
        Ok(posts)
    }

    /// Fetches and flattens the reply tree of one post, keeping only
    /// comments created at or after `window_start`. Fails soft: a post with
    /// zero extractable comments is a valid outcome, so any error logs and
    /// yields an empty list instead of propagating.
    pub async fn fetch_comments(
        &self,
        post_reddit_id: &str,
        subreddit: &str,
        window_start: DateTime<Utc>,
    ) -> Vec<FetchedComment> {
        match self
            .try_fetch_comments(post_reddit_id, subreddit, window_start)
            .await
        {
            Ok(comments) => comments,
            Err(e) => {
                warn!("Failed to fetch comments for post {}: {}", post_reddit_id, e);
                Vec::new()
            }
        }
    }

    async fn try_fetch_comments(
        &self,
        post_reddit_id: &str,
        subreddit: &str,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<FetchedComment>> {
        let (base, token) = self.base_and_token().await;
        let url = format!(
            "{}/r/{}/comments/{}.json?limit={}",
            base, subreddit, post_reddit_id, COMMENTS_LIMIT
        );

        debug!("Fetching comments: {}", url);

        let mut request = self.http.get(&url);
        if !token.is_empty() {
            request = request.bearer_auth(&token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(LeadError::General(format!("HTTP {}", response.status())));
        }

        // The comment endpoint returns a two-element array: the post
        // listing, then the top-level comment listing.
        let payload: Value = response.json().await?;
        let children = payload
            .get(1)
            .and_then(|listing| listing.get("data"))
            .and_then(|data| data.get("children"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(extract_comment_tree(&children, window_start.timestamp()))
    }
}

/// Flattens a comment listing depth-first with an explicit work-list, so
/// arbitrarily deep threads cannot grow the call stack. Only `t1` nodes are
/// comments; `more` continuation stubs and malformed nodes are skipped. A
/// node outside the time window is still traversed, since nested replies
/// qualify on their own timestamps.
pub fn extract_comment_tree(children: &[Value], window_start: i64) -> Vec<FetchedComment> {
    let mut comments = Vec::new();
    let mut stack: Vec<Value> = children.iter().rev().cloned().collect();

    while let Some(node) = stack.pop() {
        if node.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = node.get("data") else {
            continue;
        };

        let created_utc = data
            .get("created_utc")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as i64;

        if created_utc >= window_start {
            comments.push(FetchedComment {
                id: data
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                body: data
                    .get("body")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                author: data
                    .get("author")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                score: data.get("score").and_then(Value::as_i64).unwrap_or(0),
                created_utc,
            });
        }

        // "replies" is an empty string when a comment has none.
        if let Some(replies) = data
            .get("replies")
            .and_then(|r| r.get("data"))
            .and_then(|d| d.get("children"))
            .and_then(Value::as_array)
        {
            for reply in replies.iter().rev() {
                stack.push(reply.clone());
            }
        }
    }

    comments
}

/// Converts an upstream epoch-seconds timestamp, clamping anything the
/// calendar cannot represent to the epoch floor.
pub fn epoch_to_utc(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
