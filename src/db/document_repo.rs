use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use editer_core::{check_content_length, next_update_stamp, Document, DocumentStore, StoreError};

/// SQLite-backed document store.
///
/// The pool is owned by the caller; this only borrows connections per
/// call. Every statement runs under `operation_timeout`.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    max_content_length: usize,
    operation_timeout: Duration,
}

// Row types for database queries
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    share_id: String,
    content: String,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document, StoreError> {
        Ok(Document {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            share_id: self.share_id,
            content: self.content,
        })
    }
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool, max_content_length: usize, operation_timeout: Duration) -> Self {
        Self {
            pool,
            max_content_length,
            operation_timeout,
        }
    }

    /// Runs a query future under the operation timeout, translating errors.
    async fn run<T, F>(&self, op: &str, query: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        self.bounded(op, async move { query.await.map_err(translate_error) })
            .await
    }

    /// Runs a multi-statement operation under the operation timeout.
    async fn bounded<T, F>(&self, op: &str, work: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.operation_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "{} timed out after {:?}",
                op, self.operation_timeout
            ))),
        }
    }

    /// Looks for a row this store inserted under `id`.
    ///
    /// An insert that outlives its deadline can still commit, so a timed
    /// out create checks here before reporting failure.
    async fn recover_insert(
        &self,
        id: &str,
        share_id: &str,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self
            .find_by_share_id(share_id)
            .await?
            .filter(|doc| doc.id == id))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, share_id: &str, content: &str) -> Result<Document, StoreError> {
        check_content_length(content, self.max_content_length)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let stamp = storage_timestamp(&now);

        let inserted = self
            .run(
                "insert",
                sqlx::query(
                    r#"
                    INSERT INTO documents (id, share_id, content, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(share_id)
                .bind(content)
                .bind(&stamp)
                .bind(&stamp)
                .execute(&self.pool),
            )
            .await;

        match inserted {
            Ok(_) => Ok(Document::new(id, share_id, content, now)),
            Err(StoreError::Conflict(_)) => Err(StoreError::Conflict(share_id.to_string())),
            Err(StoreError::Unavailable(reason)) => {
                if let Ok(Some(doc)) = self.recover_insert(&id, share_id).await {
                    tracing::warn!("Insert of {} committed after: {}", share_id, reason);
                    return Ok(doc);
                }
                Err(StoreError::Unavailable(reason))
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_share_id(&self, share_id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = self
            .run(
                "select",
                sqlx::query_as("SELECT * FROM documents WHERE share_id = ?")
                    .bind(share_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn update(
        &self,
        share_id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Document>, StoreError> {
        check_content_length(content, self.max_content_length)?;

        // Compare-and-swap on the stamp we read, so the new stamp is always
        // derived from the one it replaces. A concurrent writer makes the
        // swap miss and we go round again.
        self.bounded("update", async {
            loop {
                let current: Option<(String,)> =
                    sqlx::query_as("SELECT updated_at FROM documents WHERE share_id = ?")
                        .bind(share_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(translate_error)?;
                let Some((previous,)) = current else {
                    return Ok(None);
                };

                let stamp = next_update_stamp(updated_at, parse_timestamp(&previous)?);
                let row: Option<DocumentRow> = sqlx::query_as(
                    r#"
                    UPDATE documents
                    SET content = ?, updated_at = ?
                    WHERE share_id = ? AND updated_at = ?
                    RETURNING id, share_id, content, created_at, updated_at
                    "#,
                )
                .bind(content)
                .bind(storage_timestamp(&stamp))
                .bind(share_id)
                .bind(&previous)
                .fetch_optional(&self.pool)
                .await
                .map_err(translate_error)?;

                match row {
                    Some(row) => return row.into_document().map(Some),
                    None => tracing::debug!("Concurrent update on {}, retrying", share_id),
                }
            }
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.run("ping", sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }
}

fn storage_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

/// Maps driver errors onto the store taxonomy.
fn translate_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. } => StoreError::Corrupt(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    async fn setup_store() -> (SqliteDocumentStore, TempDir) {
        setup_store_with_limit(editer_core::DEFAULT_MAX_CONTENT_LENGTH).await
    }

    async fn setup_store_with_limit(limit: usize) -> (SqliteDocumentStore, TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(&db_path, Duration::from_secs(5)).await.unwrap();
        (
            SqliteDocumentStore::new(pool, limit, Duration::from_secs(5)),
            temp_dir,
        )
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (store, _temp) = setup_store().await;

        let created = store.create("7-kind-owls-sing-softly", "Hello 世界").await.unwrap();
        assert_eq!(created.created_at, created.updated_at);

        let found = store
            .find_by_share_id("7-kind-owls-sing-softly")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, created);
        assert_eq!(found.content.as_bytes(), "Hello 世界".as_bytes());
    }

    #[tokio::test]
    async fn test_create_duplicate_share_id_conflicts() {
        let (store, _temp) = setup_store().await;
        store.create("same", "first").await.unwrap();

        let err = store.create("same", "second").await.unwrap_err();
        assert_eq!(err, StoreError::Conflict("same".to_string()));

        let kept = store.find_by_share_id("same").await.unwrap().unwrap();
        assert_eq!(kept.content, "first");
    }

    #[tokio::test]
    async fn test_find_missing() {
        let (store, _temp) = setup_store().await;
        assert!(store.find_by_share_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update() {
        let (store, _temp) = setup_store().await;
        let created = store.create("doc", "old").await.unwrap();
        let stamp = created.updated_at + ChronoDuration::milliseconds(1500);

        let updated = store.update("doc", "new", stamp).await.unwrap().unwrap();
        assert_eq!(updated.content, "new");
        assert_eq!(updated.updated_at, stamp);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.id, created.id);

        let found = store.find_by_share_id("doc").await.unwrap().unwrap();
        assert_eq!(found, updated);
    }

    #[tokio::test]
    async fn test_stale_update_moves_past_created_at() {
        let (store, _temp) = setup_store().await;
        let created = store.create("doc", "old").await.unwrap();

        let stale = created.created_at - ChronoDuration::days(1);
        let updated = store.update("doc", "new", stale).await.unwrap().unwrap();
        assert_eq!(
            updated.updated_at,
            created.created_at + ChronoDuration::microseconds(1)
        );
    }

    #[tokio::test]
    async fn test_update_moves_past_future_stamp() {
        let (store, _temp) = setup_store().await;
        store.create("doc", "v1").await.unwrap();

        // Another writer whose clock runs a minute ahead.
        let future = Utc::now() + ChronoDuration::seconds(60);
        store.update("doc", "v2", future).await.unwrap().unwrap();

        let updated = store.update("doc", "v3", Utc::now()).await.unwrap().unwrap();
        assert_eq!(updated.content, "v3");
        assert!(updated.updated_at > future);

        let found = store.find_by_share_id("doc").await.unwrap().unwrap();
        assert_eq!(found, updated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_keep_stamps_increasing() {
        let (store, _temp) = setup_store().await;
        let store = Arc::new(store);
        let created = store.create("doc", "v0").await.unwrap();
        let stamp = created.created_at;

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .update("doc", &format!("v{}", i + 1), stamp)
                        .await
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap().updated_at);
        }
        stamps.sort();
        stamps.dedup();
        assert_eq!(stamps.len(), 10);
        assert!(stamps[0] > created.created_at);
    }

    #[tokio::test]
    async fn test_blocked_update_times_out() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db"), Duration::from_secs(5))
            .await
            .unwrap();
        let store = SqliteDocumentStore::new(
            pool.clone(),
            editer_core::DEFAULT_MAX_CONTENT_LENGTH,
            Duration::from_millis(200),
        );
        store.create("doc", "old").await.unwrap();

        // Hold the write lock on another pooled connection.
        let mut blocker = pool.acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *blocker)
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let result = store.update("doc", "new", Utc::now()).await;
        let elapsed = started.elapsed();

        match result {
            Err(StoreError::Unavailable(reason)) => assert!(reason.contains("timed out")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(2));

        sqlx::query("ROLLBACK").execute(&mut *blocker).await.unwrap();
    }

    #[tokio::test]
    async fn test_blocked_create_times_out() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db"), Duration::from_secs(5))
            .await
            .unwrap();
        let store = SqliteDocumentStore::new(
            pool.clone(),
            editer_core::DEFAULT_MAX_CONTENT_LENGTH,
            Duration::from_millis(200),
        );

        let mut blocker = pool.acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *blocker)
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let result = store.create("doc", "text").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(started.elapsed() < Duration::from_secs(2));

        sqlx::query("ROLLBACK").execute(&mut *blocker).await.unwrap();
    }

    #[tokio::test]
    async fn test_recover_insert_matches_own_id_only() {
        let (store, _temp) = setup_store().await;
        let created = store.create("doc", "text").await.unwrap();

        let recovered = store.recover_insert(&created.id, "doc").await.unwrap();
        assert_eq!(recovered, Some(created));

        // Same share-id inserted by someone else is not ours.
        assert!(store
            .recover_insert("other-id", "doc")
            .await
            .unwrap()
            .is_none());
        assert!(store.recover_insert("any", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing() {
        let (store, _temp) = setup_store().await;
        let result = store.update("ghost", "text", Utc::now()).await.unwrap();
        assert!(result.is_none());
        assert!(store.find_by_share_id("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_content_limit() {
        let (store, _temp) = setup_store_with_limit(8).await;
        let err = store.create("big", "123456789").await.unwrap_err();
        assert_eq!(err, StoreError::ContentTooLarge { len: 9, max: 8 });
        assert!(store.find_by_share_id("big").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let (store, _temp) = setup_store().await;
        store.pool.close().await;

        assert!(matches!(
            store.find_by_share_id("any").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.create("any", "text").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_timestamp() {
        let (store, _temp) = setup_store().await;
        sqlx::query(
            "INSERT INTO documents (id, share_id, content, created_at, updated_at) VALUES ('x', 'bad', 'c', 'yesterday', 'today')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        assert!(matches!(
            store.find_by_share_id("bad").await,
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_ping() {
        let (store, _temp) = setup_store().await;
        store.ping().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates() {
        let (store, _temp) = setup_store().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .create(&format!("doc-{}", i), &format!("content {}", i))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..20 {
            let doc = store
                .find_by_share_id(&format!("doc-{}", i))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(doc.content, format!("content {}", i));
        }
    }
}
