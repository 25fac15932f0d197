pub mod analysis;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod fetcher;
pub mod ingestion;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;

pub use analysis::Analyzer;
pub use auth::{CachedToken, TokenCache};
pub use classifier::{keyword_classify, Classifier, ModelClient, Verdict};
pub use config::AppConfig;
pub use fetcher::{extract_comment_tree, RedditFetcher};
pub use ingestion::Ingestor;
pub use service::LeadService;
pub use stats::StatsAggregator;
pub use store::Store;
pub use types::*;
