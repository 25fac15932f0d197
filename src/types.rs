use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subreddit {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub reddit_id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub url: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_at: DateTime<Utc>,
    pub subreddit_id: String,
    pub is_lead: bool,
    pub lead_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub reddit_id: String,
    pub content: String,
    pub author: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
    pub post_id: String,
    pub is_lead: bool,
    pub lead_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadKind {
    Post,
    Comment,
}

impl LeadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadKind::Post => "post",
            LeadKind::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub kind: LeadKind,
    pub confidence: f64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
}

/// Reference to the single record a lead is materialized for. A lead points
/// at exactly one post or one comment, so the reference is a variant rather
/// than a pair of optional keys.
#[derive(Debug, Clone)]
pub enum LeadRef {
    Post(String),
    Comment(String),
}

impl LeadRef {
    pub fn kind(&self) -> LeadKind {
        match self {
            LeadRef::Post(_) => LeadKind::Post,
            LeadRef::Comment(_) => LeadKind::Comment,
        }
    }
}

/// A lead joined with the records it references, for listing endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct LeadWithContext {
    pub lead: Lead,
    pub subreddit: String,
    pub post: Option<Post>,
    pub comment: Option<Comment>,
}

/// One post as returned by the subreddit listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchedPost {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub permalink: String,
}

/// One comment flattened out of a post's reply tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedComment {
    pub id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub created_utc: i64,
}

/// Per-subreddit outcome of one ingestion request. A failed subreddit keeps
/// its slot with zero counts and the error message; the batch never aborts.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub subreddit: String,
    pub posts_count: usize,
    pub comments_count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnalysisReport {
    pub analyzed: usize,
    pub leads: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FullAnalysis {
    pub posts: AnalysisReport,
    pub comments: AnalysisReport,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct KindStats {
    pub total: i64,
    pub leads: i64,
    pub coefficient: f64,
}

impl KindStats {
    pub fn new(total: i64, leads: i64) -> Self {
        let coefficient = if total > 0 {
            leads as f64 / total as f64
        } else {
            0.0
        };
        Self {
            total,
            leads,
            coefficient,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubredditStats {
    pub subreddit: String,
    pub posts: KindStats,
    pub comments: KindStats,
}

/// Full pipeline result: ingestion reports, classification counts, and the
/// freshly aggregated statistics for the requested subreddits.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub parse_results: Vec<IngestReport>,
    pub analysis: FullAnalysis,
    pub statistics: Vec<SubredditStats>,
}

/// Typed scope for selection queries, instead of ad-hoc filter maps.
/// `None` means unscoped; an empty list scopes to nothing.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub subreddit_ids: Option<Vec<String>>,
    pub post_ids: Option<Vec<String>>,
}

impl ItemFilter {
    pub fn subreddits(ids: Vec<String>) -> Self {
        Self {
            subreddit_ids: Some(ids),
            ..Self::default()
        }
    }

    pub fn posts(ids: Vec<String>) -> Self {
        Self {
            post_ids: Some(ids),
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to fetch r/{subreddit}: {message}")]
    Fetch { subreddit: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, LeadError>;
