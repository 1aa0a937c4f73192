use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::Row;

use crate::error::Result;
use crate::store::{apply_merge, Document, DocumentStore, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 8;

/// Documents persisted as JSON text in the `documents` table.
///
/// Merges read, patch and upsert inside one `BEGIN IMMEDIATE` transaction, so
/// the write lock is held from the read onwards and concurrent merges queue on
/// the busy timeout instead of failing the lock upgrade.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: sqlx::SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file in WAL mode and runs migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, path: &str) -> std::result::Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let body: String = row.try_get("body")?;
        decode(path, &body).map(Some)
    }

    async fn merge(&self, path: &str, patch: &Document) -> std::result::Result<(), StoreError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let existing = sqlx::query("SELECT body FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&mut *tx)
            .await?;
        let mut document = match existing {
            Some(row) => {
                let body: String = row.try_get("body")?;
                decode(path, &body)?
            }
            None => Document::new(),
        };

        apply_merge(path, &mut document, patch)?;
        upsert(&mut tx, path, &document).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn put(&self, path: &str, document: Document) -> std::result::Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        upsert(&mut tx, path, &document).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn upsert(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    path: &str,
    document: &Document,
) -> std::result::Result<(), StoreError> {
    let body = serde_json::to_string(document)?;
    sqlx::query(
        r#"
        INSERT INTO documents (path, body, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
        "#,
    )
    .bind(path)
    .bind(body)
    .bind(now_ms())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn decode(path: &str, body: &str) -> std::result::Result<Document, StoreError> {
    match serde_json::from_str::<serde_json::Value>(body)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject { path: path.to_string() }),
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteDocumentStore {
        // One connection: every new connection to :memory: is a fresh database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteDocumentStore::new(pool)
    }

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = memory_store().await;
        let session = doc(json!({ "type": "game", "ownerUserId": "u1", "gameId": "g1" }));
        store.put("sessions/123456", session.clone()).await.unwrap();

        assert_eq!(store.get("sessions/123456").await.unwrap(), Some(session));
        assert_eq!(store.get("sessions/654321").await.unwrap(), None);
    }

    #[tokio::test]
    async fn merge_keeps_existing_fields_and_is_repeatable() {
        let store = memory_store().await;
        store
            .put("users/u1/games/g1", doc(json!({ "opponent": "Tigers", "participants": { "u1": true } })))
            .await
            .unwrap();

        let patch = doc(json!({ "participants.u2": true }));
        store.merge("users/u1/games/g1", &patch).await.unwrap();
        store.merge("users/u1/games/g1", &patch).await.unwrap();

        let game = store.get("users/u1/games/g1").await.unwrap().unwrap();
        assert_eq!(
            serde_json::Value::Object(game),
            json!({ "opponent": "Tigers", "participants": { "u1": true, "u2": true } })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_merges_on_a_shared_file_all_land() {
        let path = std::env::temp_dir().join(format!("pitch-tracker-merge-{}.db", std::process::id()));
        let db_path = path.to_string_lossy().into_owned();
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{db_path}{suffix}"));
        }
        let store = SqliteDocumentStore::connect(&db_path).await.unwrap();

        // Half the merges hit one game, half are spread across others.
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let game = if i % 2 == 0 { "users/o/games/g0".to_string() } else { format!("users/o/games/g{i}") };
                    let patch = doc(json!({ (format!("participants.u{i}")): true }));
                    store.merge(&game, &patch).await
                })
            })
            .collect();
        let mut failures = 0;
        for handle in handles {
            if handle.await.unwrap().is_err() {
                failures += 1;
            }
        }

        let shared = store.get("users/o/games/g0").await.unwrap().unwrap();
        let joined = shared["participants"].as_object().map_or(0, |p| p.len());
        store.pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{db_path}{suffix}"));
        }

        assert_eq!(failures, 0);
        assert_eq!(joined, 32);
    }

    #[tokio::test]
    async fn merge_into_missing_document_creates_it() {
        let store = memory_store().await;
        store
            .merge("users/u9/games/g9", &doc(json!({ "participants.u2": true })))
            .await
            .unwrap();
        let game = store.get("users/u9/games/g9").await.unwrap().unwrap();
        assert_eq!(game["participants"]["u2"], json!(true));
    }
}
