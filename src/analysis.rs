use std::sync::Arc;
use tracing::info;

use crate::classifier::Classifier;
use crate::store::Store;
use crate::types::{AnalysisReport, FullAnalysis, ItemFilter, LeadKind, LeadRef, Result};

/// Streams unclassified records through the classifier, persists each
/// verdict, and materializes a lead row per positive verdict. Records
/// already marked as leads are out of scope, so a re-run cannot duplicate
/// a lead.
pub struct Analyzer {
    classifier: Classifier,
    store: Arc<Store>,
}

impl Analyzer {
    pub fn new(classifier: Classifier, store: Arc<Store>) -> Self {
        Self { classifier, store }
    }

    pub async fn classify_posts(&self, filter: &ItemFilter) -> Result<AnalysisReport> {
        let posts = self.store.unclassified_posts(filter).await?;
        let mut leads = 0;

        for post in &posts {
            let text = format!("{}\n\n{}", post.title, post.content);
            let verdict = self.classifier.classify(&text, LeadKind::Post).await;

            self.store
                .mark_post_classified(&post.id, verdict.is_lead, verdict.confidence)
                .await?;

            if verdict.is_lead {
                leads += 1;
                self.store
                    .insert_lead(LeadRef::Post(post.id.clone()), verdict.confidence, &verdict.reason)
                    .await?;
            }
        }

        info!("Classified {} posts, {} leads", posts.len(), leads);
        Ok(AnalysisReport {
            analyzed: posts.len(),
            leads,
        })
    }

    pub async fn classify_comments(&self, filter: &ItemFilter) -> Result<AnalysisReport> {
        let comments = self.store.unclassified_comments(filter).await?;
        let mut leads = 0;

        for comment in &comments {
            let verdict = self
                .classifier
                .classify(&comment.content, LeadKind::Comment)
                .await;

            self.store
                .mark_comment_classified(&comment.id, verdict.is_lead, verdict.confidence)
                .await?;

            if verdict.is_lead {
                leads += 1;
                self.store
                    .insert_lead(
                        LeadRef::Comment(comment.id.clone()),
                        verdict.confidence,
                        &verdict.reason,
                    )
                    .await?;
            }
        }

        info!("Classified {} comments, {} leads", comments.len(), leads);
        Ok(AnalysisReport {
            analyzed: comments.len(),
            leads,
        })
    }

    /// Posts first, then the comments belonging to those subreddits' posts.
    /// The comment scope is always derived from the just-classified post
    /// set, never supplied independently.
    pub async fn classify_all(&self, subreddit_ids: &[String]) -> Result<FullAnalysis> {
        let posts = self
            .classify_posts(&ItemFilter::subreddits(subreddit_ids.to_vec()))
            .await?;

        let post_ids = self.store.post_ids_for_subreddits(subreddit_ids).await?;
        let comments = self
            .classify_comments(&ItemFilter::posts(post_ids))
            .await?;

        Ok(FullAnalysis { posts, comments })
    }
}
