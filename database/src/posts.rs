use crate::Database;
use chrono::{DateTime, Utc};
use keywatch_core::{CollectedVia, CoreError, DatabaseError, Post};
use tracing::debug;

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: String,
    created_at: DateTime<Utc>,
    author: String,
    author_id: Option<String>,
    text: String,
    like_count: i64,
    reshare_count: i64,
    links: String,
    proper_links: Option<String>,
    links_to_resolve: bool,
    reshare_of: Option<String>,
    collected_via: String,
}

impl TryFrom<PostRow> for Post {
    type Error = CoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let links: Vec<String> = serde_json::from_str(&row.links).map_err(|e| {
            CoreError::Database(DatabaseError::CorruptDocument {
                details: format!("links of post {}: {e}", row.id),
            })
        })?;
        let proper_links: Option<Vec<String>> = row
            .proper_links
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| {
                CoreError::Database(DatabaseError::CorruptDocument {
                    details: format!("proper_links of post {}: {e}", row.id),
                })
            })?;
        let collected_via: CollectedVia = row.collected_via.parse().map_err(|details| {
            CoreError::Database(DatabaseError::CorruptDocument { details })
        })?;

        Ok(Post {
            id: row.id,
            created_at: row.created_at,
            author: row.author,
            author_id: row.author_id,
            text: row.text,
            like_count: row.like_count,
            reshare_count: row.reshare_count,
            links,
            proper_links,
            links_to_resolve: row.links_to_resolve,
            reshare_of: row.reshare_of,
            collected_via,
        })
    }
}

impl Database {
    /// Create-or-replace a post keyed by its identifier. Re-delivery
    /// refreshes engagement counters but can never regress resolution
    /// state: `proper_links`, once set, sticks, and `links_to_resolve`
    /// never flips back from false to true.
    pub async fn upsert_post(&self, post: &Post) -> Result<(), CoreError> {
        let links = serde_json::to_string(&post.links)?;
        let proper_links = post
            .proper_links
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO posts (
                id, created_at, author, author_id, text,
                like_count, reshare_count, links, proper_links,
                links_to_resolve, reshare_of, collected_via,
                inserted_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                like_count = excluded.like_count,
                reshare_count = excluded.reshare_count,
                links = CASE
                    WHEN posts.proper_links IS NOT NULL THEN posts.links
                    ELSE excluded.links
                END,
                proper_links = COALESCE(posts.proper_links, excluded.proper_links),
                links_to_resolve = posts.links_to_resolve AND excluded.links_to_resolve,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&post.id)
        .bind(post.created_at)
        .bind(&post.author)
        .bind(&post.author_id)
        .bind(&post.text)
        .bind(post.like_count)
        .bind(post.reshare_count)
        .bind(links)
        .bind(proper_links)
        .bind(post.links_to_resolve)
        .bind(&post.reshare_of)
        .bind(post.collected_via.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;

        Ok(())
    }

    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, CoreError> {
        let row = sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;

        row.map(Post::try_from).transpose()
    }

    /// A bounded batch of posts still waiting for link resolution.
    pub async fn find_unresolved(&self, limit: u32) -> Result<Vec<Post>, CoreError> {
        let rows = sqlx::query_as::<_, PostRow>(
            "SELECT * FROM posts WHERE links_to_resolve = 1 ORDER BY created_at LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;

        rows.into_iter().map(Post::try_from).collect()
    }

    pub async fn count_unresolved(&self) -> Result<u64, CoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE links_to_resolve = 1")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;
        Ok(count as u64)
    }

    pub async fn count_posts(&self) -> Result<u64, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;
        Ok(count as u64)
    }

    /// Patch resolution state for every document sharing an effective
    /// identifier: the original post itself plus any reshares of it.
    /// Documents that already carry `proper_links` are left untouched, so
    /// the patch is idempotent and safe to re-run.
    pub async fn mark_resolved(
        &self,
        effective_id: &str,
        proper_links: &[String],
    ) -> Result<u64, CoreError> {
        let encoded = serde_json::to_string(proper_links)?;
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET proper_links = ?, links_to_resolve = 0, updated_at = ?
            WHERE (id = ? OR reshare_of = ?) AND proper_links IS NULL
            "#,
        )
        .bind(encoded)
        .bind(Utc::now())
        .bind(effective_id)
        .bind(effective_id)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;

        let patched = result.rows_affected();
        debug!("Marked {} document(s) resolved for {}", patched, effective_id);
        Ok(patched)
    }
}
