use lead_aggregator::store::Store;
use lead_aggregator::types::{FetchedComment, FetchedPost, ItemFilter, LeadRef, Result};

fn fetched_post(reddit_id: &str, title: &str, created_utc: f64) -> FetchedPost {
    FetchedPost {
        id: reddit_id.to_string(),
        title: title.to_string(),
        selftext: "original body".to_string(),
        author: "original_author".to_string(),
        score: 10,
        num_comments: 2,
        created_utc,
        permalink: format!("/r/test/comments/{}/slug/", reddit_id),
    }
}

fn fetched_comment(reddit_id: &str, body: &str, created_utc: i64) -> FetchedComment {
    FetchedComment {
        id: reddit_id.to_string(),
        body: body.to_string(),
        author: "commenter".to_string(),
        score: 1,
        created_utc,
    }
}

#[tokio::test]
async fn subreddit_get_or_create_is_idempotent() -> Result<()> {
    let store = Store::connect("sqlite::memory:").await?;

    let first = store.get_or_create_subreddit("webdev").await?;
    let second = store.get_or_create_subreddit("webdev").await?;

    assert_eq!(first.id, second.id);
    assert_eq!(store.subreddits(None).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn post_upsert_refreshes_mutable_fields_only() -> Result<()> {
    let store = Store::connect("sqlite::memory:").await?;
    let subreddit = store.get_or_create_subreddit("webdev").await?;

    let first = store
        .upsert_post(&fetched_post("abc", "First title", 1_700_000_000.0), &subreddit.id)
        .await?;

    // Same reddit id seen again with new mutable fields, but also with a
    // different author and creation time that must not overwrite.
    let mut updated = fetched_post("abc", "Updated title", 1_800_000_000.0);
    updated.selftext = "updated body".to_string();
    updated.author = "impostor".to_string();
    updated.score = 99;
    updated.num_comments = 7;

    let second = store.upsert_post(&updated, &subreddit.id).await?;

    assert_eq!(second.id, first.id);
    assert_eq!(second.reddit_id, "abc");
    assert_eq!(second.title, "Updated title");
    assert_eq!(second.content, "updated body");
    assert_eq!(second.score, 99);
    assert_eq!(second.num_comments, 7);
    assert_eq!(second.author, "original_author");
    assert_eq!(second.created_at, first.created_at);
    assert!(!second.is_lead);

    let all = store.unclassified_posts(&ItemFilter::default()).await?;
    assert_eq!(all.len(), 1);
    Ok(())
}

#[tokio::test]
async fn comment_upsert_refreshes_mutable_fields_only() -> Result<()> {
    let store = Store::connect("sqlite::memory:").await?;
    let subreddit = store.get_or_create_subreddit("webdev").await?;
    let post = store
        .upsert_post(&fetched_post("p1", "A post", 1_700_000_000.0), &subreddit.id)
        .await?;

    let first = store
        .upsert_comment(&fetched_comment("c1", "hello", 1_700_000_100), &post.id)
        .await?;

    let mut updated = fetched_comment("c1", "hello, edited", 1_800_000_000);
    updated.score = 42;
    let second = store.upsert_comment(&updated, &post.id).await?;

    assert_eq!(second.id, first.id);
    assert_eq!(second.content, "hello, edited");
    assert_eq!(second.score, 42);
    assert_eq!(second.created_at, first.created_at);

    let all = store.unclassified_comments(&ItemFilter::default()).await?;
    assert_eq!(all.len(), 1);
    Ok(())
}

#[tokio::test]
async fn classified_records_leave_the_pending_set() -> Result<()> {
    let store = Store::connect("sqlite::memory:").await?;
    let subreddit = store.get_or_create_subreddit("webdev").await?;

    let lead_post = store
        .upsert_post(&fetched_post("p1", "Hiring", 1_700_000_000.0), &subreddit.id)
        .await?;
    let other_post = store
        .upsert_post(&fetched_post("p2", "Question", 1_700_000_001.0), &subreddit.id)
        .await?;

    store.mark_post_classified(&lead_post.id, true, 0.7).await?;
    store.mark_post_classified(&other_post.id, false, 0.3).await?;

    // A positive verdict is frozen; a negative one stays eligible.
    let pending = store.unclassified_posts(&ItemFilter::default()).await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, other_post.id);
    assert_eq!(pending[0].lead_score, Some(0.3));
    Ok(())
}

#[tokio::test]
async fn filters_scope_selection_and_empty_scope_selects_nothing() -> Result<()> {
    let store = Store::connect("sqlite::memory:").await?;
    let webdev = store.get_or_create_subreddit("webdev").await?;
    let forhire = store.get_or_create_subreddit("forhire").await?;

    store
        .upsert_post(&fetched_post("w1", "In webdev", 1_700_000_000.0), &webdev.id)
        .await?;
    store
        .upsert_post(&fetched_post("f1", "In forhire", 1_700_000_000.0), &forhire.id)
        .await?;

    let scoped = store
        .unclassified_posts(&ItemFilter::subreddits(vec![webdev.id.clone()]))
        .await?;
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].reddit_id, "w1");

    let none = store
        .unclassified_posts(&ItemFilter::subreddits(Vec::new()))
        .await?;
    assert!(none.is_empty());

    let ids = store.post_ids_for_subreddits(&[webdev.id.clone()]).await?;
    assert_eq!(ids.len(), 1);
    Ok(())
}

#[tokio::test]
async fn leads_reference_exactly_one_record_and_list_in_order() -> Result<()> {
    let store = Store::connect("sqlite::memory:").await?;
    let subreddit = store.get_or_create_subreddit("webdev").await?;
    let post = store
        .upsert_post(&fetched_post("p1", "Hiring devs", 1_700_000_000.0), &subreddit.id)
        .await?;
    let comment = store
        .upsert_comment(&fetched_comment("c1", "I can help, hire me", 1_700_000_100), &post.id)
        .await?;

    let low = store
        .insert_lead(LeadRef::Comment(comment.id.clone()), 0.5, "comment lead")
        .await?;
    let high = store
        .insert_lead(LeadRef::Post(post.id.clone()), 0.9, "post lead")
        .await?;

    assert_eq!(high.post_id.as_deref(), Some(post.id.as_str()));
    assert!(high.comment_id.is_none());
    assert_eq!(low.comment_id.as_deref(), Some(comment.id.as_str()));
    assert!(low.post_id.is_none());

    let listed = store.list_leads(None).await?;
    assert_eq!(listed.len(), 2);

    // Highest confidence first.
    assert_eq!(listed[0].lead.id, high.id);
    assert_eq!(listed[0].subreddit, "webdev");
    assert!(listed[0].post.is_some());
    assert!(listed[0].comment.is_none());

    // The comment lead carries its subreddit through its parent post.
    assert_eq!(listed[1].lead.id, low.id);
    assert_eq!(listed[1].subreddit, "webdev");
    assert!(listed[1].comment.is_some());

    // Scoping by an unrelated subreddit hides everything.
    let other = store.get_or_create_subreddit("other").await?;
    let scoped = store.list_leads(Some(&[other.id])).await?;
    assert!(scoped.is_empty());
    Ok(())
}

#[tokio::test]
async fn counts_support_zero_safe_coefficients() -> Result<()> {
    let store = Store::connect("sqlite::memory:").await?;
    let empty = store.get_or_create_subreddit("empty").await?;
    let busy = store.get_or_create_subreddit("busy").await?;

    assert_eq!(store.post_counts(&empty.id).await?, (0, 0));
    assert_eq!(store.comment_counts(&empty.id).await?, (0, 0));

    let post = store
        .upsert_post(&fetched_post("b1", "Hiring", 1_700_000_000.0), &busy.id)
        .await?;
    store
        .upsert_post(&fetched_post("b2", "Chatter", 1_700_000_001.0), &busy.id)
        .await?;
    store.mark_post_classified(&post.id, true, 0.7).await?;

    let comment = store
        .upsert_comment(&fetched_comment("bc1", "hire me", 1_700_000_100), &post.id)
        .await?;
    store.mark_comment_classified(&comment.id, true, 0.5).await?;

    assert_eq!(store.post_counts(&busy.id).await?, (2, 1));
    assert_eq!(store.comment_counts(&busy.id).await?, (1, 1));
    Ok(())
}
