//! Pantry item persistence
//!
//! `ItemRepository` is the CRUD boundary the rest of the service depends on.
//! `SqliteItemRepository` stores items in `pantry_items`, tags as a JSON array.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pantry_common::{Error, ItemDraft, PantryItem, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::utils::{retry_with_backoff, RetryPolicy};

/// Item store operations
///
/// Each operation is independent; no transactional guarantees span calls.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Persist a new item, returning it with its assigned id
    async fn create(&self, draft: &ItemDraft) -> Result<PantryItem>;

    async fn get(&self, id: &str) -> Result<Option<PantryItem>>;

    /// Replace all fields of an existing item
    async fn update(&self, id: &str, draft: &ItemDraft) -> Result<PantryItem>;

    /// All items, oldest first
    async fn list(&self) -> Result<Vec<PantryItem>>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// SQLite-backed repository
#[derive(Clone)]
pub struct SqliteItemRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl SqliteItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::new(5, 10),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_lock_error(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => db_err.to_string().contains("database is locked"),
        _ => false,
    }
}

fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags)
        .map_err(|e| Error::Internal(format!("Failed to serialize tags: {}", e)))
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn row_to_item(row: &SqliteRow) -> Result<PantryItem> {
    let tags: String = row.get("tags");
    let tags: Vec<String> = serde_json::from_str(&tags)
        .map_err(|e| Error::Internal(format!("Failed to deserialize tags: {}", e)))?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(PantryItem {
        id: row.get("id"),
        name: row.get("name"),
        quantity: row.get("quantity"),
        image_url: row.get("image_url"),
        tags,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn create(&self, draft: &ItemDraft) -> Result<PantryItem> {
        let draft = draft.clone().validated()?;
        let now = Utc::now();
        let item = PantryItem {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            quantity: draft.quantity,
            image_url: draft.image_url,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
        };

        let tags = encode_tags(&item.tags)?;
        let timestamp = now.to_rfc3339();

        retry_with_backoff("create item", self.retry, is_lock_error, || async {
            sqlx::query(
                r#"
                INSERT INTO pantry_items (id, name, quantity, image_url, tags, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(&item.name)
            .bind(&item.quantity)
            .bind(&item.image_url)
            .bind(&tags)
            .bind(&timestamp)
            .bind(&timestamp)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(())
        })
        .await?;

        tracing::info!(id = %item.id, name = %item.name, "Created pantry item");
        Ok(item)
    }

    async fn get(&self, id: &str) -> Result<Option<PantryItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, quantity, image_url, tags, created_at, updated_at
            FROM pantry_items
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn update(&self, id: &str, draft: &ItemDraft) -> Result<PantryItem> {
        let draft = draft.clone().validated()?;
        let tags = encode_tags(&draft.tags)?;
        let updated_at = Utc::now().to_rfc3339();

        let rows = retry_with_backoff("update item", self.retry, is_lock_error, || async {
            let result = sqlx::query(
                r#"
                UPDATE pantry_items
                SET name = ?, quantity = ?, image_url = ?, tags = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&draft.name)
            .bind(&draft.quantity)
            .bind(&draft.image_url)
            .bind(&tags)
            .bind(&updated_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(result.rows_affected())
        })
        .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("Pantry item {}", id)));
        }

        tracing::info!(id = %id, "Updated pantry item");

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Pantry item {}", id)))
    }

    async fn list(&self) -> Result<Vec<PantryItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, quantity, image_url, tags, created_at, updated_at
            FROM pantry_items
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let rows = retry_with_backoff("delete item", self.retry, is_lock_error, || async {
            let result = sqlx::query("DELETE FROM pantry_items WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

            Ok(result.rows_affected())
        })
        .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("Pantry item {}", id)));
        }

        tracing::info!(id = %id, "Deleted pantry item");
        Ok(())
    }
}
