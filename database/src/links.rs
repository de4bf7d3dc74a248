use crate::Database;
use chrono::Utc;
use keywatch_core::{CoreError, DatabaseError, LinkCacheEntry};
use tracing::debug;

// SQLite caps bound parameters per statement; stay well under it.
const LOOKUP_CHUNK: usize = 500;

impl Database {
    /// Batch-lookup cache entries for the given URLs. URLs without an
    /// entry are simply absent from the result.
    pub async fn find_links_in(
        &self,
        urls: &[String],
    ) -> Result<Vec<LinkCacheEntry>, CoreError> {
        let mut found = Vec::new();

        for chunk in urls.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                r#"SELECT link_id, "real" FROM link_cache WHERE link_id IN ({placeholders})"#
            );

            let mut query = sqlx::query_as::<_, (String, String)>(&sql);
            for url in chunk {
                query = query.bind(url);
            }

            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;

            found.extend(
                rows.into_iter()
                    .map(|(link_id, real)| LinkCacheEntry { link_id, real }),
            );
        }

        Ok(found)
    }

    /// Persist newly resolved redirections. Entries are write-once per
    /// key: an existing entry for a URL is never overwritten.
    pub async fn insert_links(&self, entries: &[LinkCacheEntry]) -> Result<u64, CoreError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;

        let mut inserted = 0u64;
        for entry in entries {
            let result = sqlx::query(
                r#"
                INSERT INTO link_cache (link_id, "real", resolved_at)
                VALUES (?, ?, ?)
                ON CONFLICT(link_id) DO NOTHING
                "#,
            )
            .bind(&entry.link_id)
            .bind(&entry.real)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;

        debug!("Stored {} new link cache entr(ies)", inserted);
        Ok(inserted)
    }

    pub async fn count_links(&self) -> Result<u64, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM link_cache")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::Database(DatabaseError::Sql(e)))?;
        Ok(count as u64)
    }
}
