use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::fetcher::epoch_to_utc;
use crate::types::{
    Comment, FetchedComment, FetchedPost, ItemFilter, Lead, LeadError, LeadKind, LeadRef,
    LeadWithContext, Post, Result, Subreddit,
};

pub struct Store {
    db: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // A pooled :memory: database is one database per connection; keep a
        // single connection so tests see one store.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { db };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subreddits (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                reddit_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                author TEXT NOT NULL,
                url TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                num_comments INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                subreddit_id TEXT NOT NULL REFERENCES subreddits(id),
                is_lead INTEGER NOT NULL DEFAULT 0,
                lead_score REAL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                reddit_id TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                author TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                post_id TEXT NOT NULL REFERENCES posts(id),
                is_lead INTEGER NOT NULL DEFAULT 0,
                lead_score REAL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL CHECK (kind IN ('post', 'comment')),
                confidence REAL NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL,
                post_id TEXT REFERENCES posts(id),
                comment_id TEXT REFERENCES comments(id),
                CHECK ((post_id IS NULL) != (comment_id IS NULL))
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        debug!("Database schema ready");
        Ok(())
    }

    pub async fn get_or_create_subreddit(&self, name: &str) -> Result<Subreddit> {
        sqlx::query("INSERT INTO subreddits (id, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .execute(&self.db)
            .await?;

        let row = sqlx::query("SELECT id, name FROM subreddits WHERE name = ?")
            .bind(name)
            .fetch_one(&self.db)
            .await?;

        Ok(Subreddit {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }

    pub async fn subreddits(&self, ids: Option<&[String]>) -> Result<Vec<Subreddit>> {
        let rows = match ids {
            Some([]) => Vec::new(),
            Some(ids) => {
                let sql = format!(
                    "SELECT id, name FROM subreddits WHERE id IN ({}) ORDER BY name",
                    placeholders(ids.len())
                );
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(id);
                }
                query.fetch_all(&self.db).await?
            }
            None => {
                sqlx::query("SELECT id, name FROM subreddits ORDER BY name")
                    .fetch_all(&self.db)
                    .await?
            }
        };

        let mut subreddits = Vec::with_capacity(rows.len());
        for row in rows {
            subreddits.push(Subreddit {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }
        Ok(subreddits)
    }

    pub async fn subreddit_ids_by_names(&self, names: &[String]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id FROM subreddits WHERE name IN ({})",
            placeholders(names.len())
        );
        let mut query = sqlx::query(&sql);
        for name in names {
            query = query.bind(name);
        }
        let rows = query.fetch_all(&self.db).await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }

    /// Upserts a fetched post keyed on its reddit id. The update path only
    /// refreshes title, content, score and reply count; identity, author,
    /// url, `created_at` and the classification columns stay as first
    /// written.
    pub async fn upsert_post(&self, fetched: &FetchedPost, subreddit_id: &str) -> Result<Post> {
        let url = format!("https://reddit.com{}", fetched.permalink);

        sqlx::query(
            r#"
            INSERT INTO posts (id, reddit_id, title, content, author, url, score, num_comments, created_at, subreddit_id, is_lead, lead_score)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL)
            ON CONFLICT(reddit_id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                score = excluded.score,
                num_comments = excluded.num_comments
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&fetched.id)
        .bind(&fetched.title)
        .bind(&fetched.selftext)
        .bind(&fetched.author)
        .bind(&url)
        .bind(fetched.score)
        .bind(fetched.num_comments)
        .bind(epoch_to_utc(fetched.created_utc))
        .bind(subreddit_id)
        .execute(&self.db)
        .await?;

        let row = sqlx::query("SELECT * FROM posts WHERE reddit_id = ?")
            .bind(&fetched.id)
            .fetch_one(&self.db)
            .await?;
        post_from_row(&row)
    }

    /// Same upsert discipline as posts: only content and score refresh on
    /// conflict.
    pub async fn upsert_comment(&self, fetched: &FetchedComment, post_id: &str) -> Result<Comment> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, reddit_id, content, author, score, created_at, post_id, is_lead, lead_score)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL)
            ON CONFLICT(reddit_id) DO UPDATE SET
                content = excluded.content,
                score = excluded.score
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&fetched.id)
        .bind(&fetched.body)
        .bind(&fetched.author)
        .bind(fetched.score)
        .bind(epoch_to_utc(fetched.created_utc as f64))
        .bind(post_id)
        .execute(&self.db)
        .await?;

        let row = sqlx::query("SELECT * FROM comments WHERE reddit_id = ?")
            .bind(&fetched.id)
            .fetch_one(&self.db)
            .await?;
        comment_from_row(&row)
    }

    pub async fn unclassified_posts(&self, filter: &ItemFilter) -> Result<Vec<Post>> {
        let mut sql = String::from("SELECT * FROM posts WHERE is_lead = 0");
        if let Some(ids) = &filter.subreddit_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(
                " AND subreddit_id IN ({})",
                placeholders(ids.len())
            ));
        }
        sql.push_str(" ORDER BY created_at");

        let mut query = sqlx::query(&sql);
        if let Some(ids) = &filter.subreddit_ids {
            for id in ids {
                query = query.bind(id);
            }
        }

        let rows = query.fetch_all(&self.db).await?;
        rows.iter().map(post_from_row).collect()
    }

    pub async fn unclassified_comments(&self, filter: &ItemFilter) -> Result<Vec<Comment>> {
        let mut sql = String::from("SELECT * FROM comments WHERE is_lead = 0");
        if let Some(ids) = &filter.post_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND post_id IN ({})", placeholders(ids.len())));
        }
        sql.push_str(" ORDER BY created_at");

        let mut query = sqlx::query(&sql);
        if let Some(ids) = &filter.post_ids {
            for id in ids {
                query = query.bind(id);
            }
        }

        let rows = query.fetch_all(&self.db).await?;
        rows.iter().map(comment_from_row).collect()
    }

    pub async fn post_ids_for_subreddits(&self, subreddit_ids: &[String]) -> Result<Vec<String>> {
        if subreddit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id FROM posts WHERE subreddit_id IN ({})",
            placeholders(subreddit_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in subreddit_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.db).await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }

    pub async fn mark_post_classified(
        &self,
        post_id: &str,
        is_lead: bool,
        lead_score: f64,
    ) -> Result<()> {
        sqlx::query("UPDATE posts SET is_lead = ?, lead_score = ? WHERE id = ?")
            .bind(is_lead)
            .bind(lead_score)
            .bind(post_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn mark_comment_classified(
        &self,
        comment_id: &str,
        is_lead: bool,
        lead_score: f64,
    ) -> Result<()> {
        sqlx::query("UPDATE comments SET is_lead = ?, lead_score = ? WHERE id = ?")
            .bind(is_lead)
            .bind(lead_score)
            .bind(comment_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn insert_lead(
        &self,
        reference: LeadRef,
        confidence: f64,
        reason: &str,
    ) -> Result<Lead> {
        let (post_id, comment_id) = match &reference {
            LeadRef::Post(id) => (Some(id.clone()), None),
            LeadRef::Comment(id) => (None, Some(id.clone())),
        };

        let lead = Lead {
            id: Uuid::new_v4().to_string(),
            kind: reference.kind(),
            confidence,
            reason: reason.to_string(),
            created_at: Utc::now(),
            post_id,
            comment_id,
        };

        sqlx::query(
            r#"
            INSERT INTO leads (id, kind, confidence, reason, created_at, post_id, comment_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&lead.id)
        .bind(lead.kind.as_str())
        .bind(lead.confidence)
        .bind(&lead.reason)
        .bind(lead.created_at)
        .bind(&lead.post_id)
        .bind(&lead.comment_id)
        .execute(&self.db)
        .await?;

        info!(
            "Recorded {} lead ({:.2}) for {:?}",
            lead.kind.as_str(),
            lead.confidence,
            reference
        );
        Ok(lead)
    }

    /// Leads with their referenced post or comment and owning subreddit,
    /// ordered by confidence then recency.
    pub async fn list_leads(
        &self,
        subreddit_ids: Option<&[String]>,
    ) -> Result<Vec<LeadWithContext>> {
        let mut sql = String::from(
            r#"
            SELECT
                l.id AS l_id, l.kind AS l_kind, l.confidence AS l_confidence,
                l.reason AS l_reason, l.created_at AS l_created_at,
                l.post_id AS l_post_id, l.comment_id AS l_comment_id,
                s.name AS subreddit_name,
                p.id AS p_id, p.reddit_id AS p_reddit_id, p.title AS p_title,
                p.content AS p_content, p.author AS p_author, p.url AS p_url,
                p.score AS p_score, p.num_comments AS p_num_comments,
                p.created_at AS p_created_at, p.subreddit_id AS p_subreddit_id,
                p.is_lead AS p_is_lead, p.lead_score AS p_lead_score,
                c.id AS c_id, c.reddit_id AS c_reddit_id, c.content AS c_content,
                c.author AS c_author, c.score AS c_score, c.created_at AS c_created_at,
                c.post_id AS c_post_id, c.is_lead AS c_is_lead, c.lead_score AS c_lead_score
            FROM leads l
            LEFT JOIN posts p ON p.id = l.post_id
            LEFT JOIN comments c ON c.id = l.comment_id
            LEFT JOIN posts cp ON cp.id = c.post_id
            LEFT JOIN subreddits s ON s.id = COALESCE(p.subreddit_id, cp.subreddit_id)
            "#,
        );
        if let Some(ids) = subreddit_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" WHERE s.id IN ({})", placeholders(ids.len())));
        }
        sql.push_str(" ORDER BY l.confidence DESC, l.created_at DESC");

        let mut query = sqlx::query(&sql);
        if let Some(ids) = subreddit_ids {
            for id in ids {
                query = query.bind(id);
            }
        }

        let rows = query.fetch_all(&self.db).await?;
        let mut leads = Vec::with_capacity(rows.len());
        for row in &rows {
            leads.push(lead_with_context_from_row(row)?);
        }
        Ok(leads)
    }

    pub async fn post_counts(&self, subreddit_id: &str) -> Result<(i64, i64)> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(is_lead), 0) AS leads FROM posts WHERE subreddit_id = ?",
        )
        .bind(subreddit_id)
        .fetch_one(&self.db)
        .await?;
        Ok((row.try_get("total")?, row.try_get("leads")?))
    }

    pub async fn comment_counts(&self, subreddit_id: &str) -> Result<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total, COALESCE(SUM(c.is_lead), 0) AS leads
            FROM comments c
            JOIN posts p ON p.id = c.post_id
            WHERE p.subreddit_id = ?
            "#,
        )
        .bind(subreddit_id)
        .fetch_one(&self.db)
        .await?;
        Ok((row.try_get("total")?, row.try_get("leads")?))
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        reddit_id: row.try_get("reddit_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        url: row.try_get("url")?,
        score: row.try_get("score")?,
        num_comments: row.try_get("num_comments")?,
        created_at: row.try_get("created_at")?,
        subreddit_id: row.try_get("subreddit_id")?,
        is_lead: row.try_get("is_lead")?,
        lead_score: row.try_get("lead_score")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        reddit_id: row.try_get("reddit_id")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        score: row.try_get("score")?,
        created_at: row.try_get("created_at")?,
        post_id: row.try_get("post_id")?,
        is_lead: row.try_get("is_lead")?,
        lead_score: row.try_get("lead_score")?,
    })
}

fn lead_with_context_from_row(row: &SqliteRow) -> Result<LeadWithContext> {
    let kind: String = row.try_get("l_kind")?;
    let kind = match kind.as_str() {
        "post" => LeadKind::Post,
        "comment" => LeadKind::Comment,
        other => {
            return Err(LeadError::General(format!("unknown lead kind '{}'", other)));
        }
    };

    let lead = Lead {
        id: row.try_get("l_id")?,
        kind,
        confidence: row.try_get("l_confidence")?,
        reason: row.try_get("l_reason")?,
        created_at: row.try_get("l_created_at")?,
        post_id: row.try_get("l_post_id")?,
        comment_id: row.try_get("l_comment_id")?,
    };

    let post = match row.try_get::<Option<String>, _>("p_id")? {
        Some(id) => Some(Post {
            id,
            reddit_id: row.try_get("p_reddit_id")?,
            title: row.try_get("p_title")?,
            content: row.try_get("p_content")?,
            author: row.try_get("p_author")?,
            url: row.try_get("p_url")?,
            score: row.try_get("p_score")?,
            num_comments: row.try_get("p_num_comments")?,
            created_at: row.try_get("p_created_at")?,
            subreddit_id: row.try_get("p_subreddit_id")?,
            is_lead: row.try_get("p_is_lead")?,
            lead_score: row.try_get("p_lead_score")?,
        }),
        None => None,
    };

    let comment = match row.try_get::<Option<String>, _>("c_id")? {
        Some(id) => Some(Comment {
            id,
            reddit_id: row.try_get("c_reddit_id")?,
            content: row.try_get("c_content")?,
            author: row.try_get("c_author")?,
            score: row.try_get("c_score")?,
            created_at: row.try_get("c_created_at")?,
            post_id: row.try_get("c_post_id")?,
            is_lead: row.try_get("c_is_lead")?,
            lead_score: row.try_get("c_lead_score")?,
        }),
        None => None,
    };

    let subreddit: Option<String> = row.try_get("subreddit_name")?;

    Ok(LeadWithContext {
        lead,
        subreddit: subreddit.unwrap_or_default(),
        post,
        comment,
    })
}
