//! SQLite-backed implementation of the core storage traits.
//!
//! One [`SqliteStore`] serves all four trait roles plus the app-side
//! write paths the CLI needs: user and document upserts, document
//! content updates after an apply, and the zettel inbox.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use notekeep_core::models::{Document, UserConfig};
use notekeep_core::store::{DocumentStore, IndexStore, LedgerStore, UserStore};

/// A freeform captured note awaiting filing.
#[derive(Debug, Clone)]
pub struct Zettel {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: i64,
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a user's model selection.
    pub async fn upsert_user(&self, user: &UserConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, embedding_model, chat_model)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                embedding_model = excluded.embedding_model,
                chat_model = excluded.chat_model
            "#,
        )
        .bind(&user.id)
        .bind(&user.embedding_model)
        .bind(&user.chat_model)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, user_id, title, content, deleted, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                title = excluded.title,
                content = excluded.content,
                deleted = excluded.deleted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.user_id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(doc.deleted)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace a document's content, bumping `updated_at`.
    pub async fn update_document_content(&self, document_id: &str, content: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(chrono::Utc::now().timestamp())
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-delete a document. Its vectors leave the index on the next
    /// delete or rebuild maintenance pass.
    pub async fn mark_deleted(&self, document_id: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET deleted = 1, updated_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_zettel(&self, zettel: &Zettel) -> Result<()> {
        sqlx::query("INSERT INTO zettels (id, user_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(&zettel.id)
            .bind(&zettel.user_id)
            .bind(&zettel.content)
            .bind(zettel.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// A user's inbox, oldest first.
    pub async fn zettels_for_user(&self, user_id: &str) -> Result<Vec<Zettel>> {
        let rows = sqlx::query(
            "SELECT id, user_id, content, created_at FROM zettels WHERE user_id = ? ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Zettel {
                id: row.get("id"),
                user_id: row.get("user_id"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn delete_zettels(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            sqlx::query("DELETE FROM zettels WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserConfig>> {
        let row = sqlx::query("SELECT id, embedding_model, chat_model FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| UserConfig {
            id: row.get("id"),
            embedding_model: row.get("embedding_model"),
            chat_model: row.get("chat_model"),
        }))
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        deleted: row.get("deleted"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, content, deleted, updated_at FROM documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    async fn documents_for_user(&self, user_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, content, deleted, updated_at FROM documents WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn load(&self, user_id: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT blob FROM index_blobs WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("blob")))
    }

    async fn save(&self, user_id: &str, blob: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_blobs (user_id, blob, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                blob = excluded.blob,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(blob)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn record(
        &self,
        user_id: &str,
        document_id: &str,
        vector_ids: &[String],
    ) -> Result<()> {
        let ids_json = serde_json::to_string(vector_ids)?;
        sqlx::query(
            r#"
            INSERT INTO vector_ledger (document_id, user_id, vector_ids)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                user_id = excluded.user_id,
                vector_ids = excluded.vector_ids
            "#,
        )
        .bind(document_id)
        .bind(user_id)
        .bind(&ids_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup(&self, document_id: &str) -> Result<Vec<String>> {
        let row = sqlx::query("SELECT vector_ids FROM vector_ledger WHERE document_id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let ids_json: String = row.get("vector_ids");
                Ok(serde_json::from_str(&ids_json)?)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn remove(&self, document_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM vector_ledger WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_user(&self, user_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM vector_ledger WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig};
    use crate::db;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db: DbConfig {
                path: dir.path().join("test.db"),
            },
            http: Default::default(),
            openai: Default::default(),
            ollama: Default::default(),
        };
        let pool = db::connect(&config).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        (dir, SqliteStore::new(pool))
    }

    fn doc(id: &str, user_id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: format!("title-{}", id),
            content: content.to_string(),
            deleted: false,
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn user_roundtrip_and_overwrite() {
        let (_dir, store) = store().await;
        store
            .upsert_user(&UserConfig {
                id: "u1".to_string(),
                embedding_model: Some("text-embedding-3-small".to_string()),
                chat_model: None,
            })
            .await
            .unwrap();

        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.embedding_model.as_deref(), Some("text-embedding-3-small"));
        assert!(user.chat_model.is_none());

        store
            .upsert_user(&UserConfig {
                id: "u1".to_string(),
                embedding_model: Some("text-embedding-3-small".to_string()),
                chat_model: Some("gpt-4o-mini".to_string()),
            })
            .await
            .unwrap();
        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.chat_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let (_dir, store) = store().await;
        assert!(store.get_user("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn documents_for_user_include_deleted() {
        let (_dir, store) = store().await;
        store.upsert_document(&doc("d1", "u1", "alive")).await.unwrap();
        store.upsert_document(&doc("d2", "u1", "doomed")).await.unwrap();
        store.upsert_document(&doc("d3", "u2", "other user")).await.unwrap();
        store.mark_deleted("d2").await.unwrap();

        let docs = store.documents_for_user("u1").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(!docs[0].deleted);
        assert!(docs[1].deleted);
    }

    #[tokio::test]
    async fn content_update_bumps_updated_at() {
        let (_dir, store) = store().await;
        store.upsert_document(&doc("d1", "u1", "before")).await.unwrap();
        store.update_document_content("d1", "after").await.unwrap();

        let fetched = store.get_document("d1").await.unwrap().unwrap();
        assert_eq!(fetched.content, "after");
        assert!(fetched.updated_at > 1);
    }

    #[tokio::test]
    async fn index_blob_roundtrip() {
        let (_dir, store) = store().await;
        assert!(store.load("u1").await.unwrap().is_none());

        store.save("u1", b"first").await.unwrap();
        store.save("u1", b"second").await.unwrap();
        assert_eq!(store.load("u1").await.unwrap().unwrap(), b"second");
    }

    #[tokio::test]
    async fn ledger_record_lookup_remove() {
        let (_dir, store) = store().await;
        let ids = vec!["v1".to_string(), "v2".to_string()];
        store.record("u1", "d1", &ids).await.unwrap();
        assert_eq!(store.lookup("d1").await.unwrap(), ids);

        store.remove("d1").await.unwrap();
        assert!(store.lookup("d1").await.unwrap().is_empty());
        // Removing again is a no-op.
        store.remove("d1").await.unwrap();
    }

    #[tokio::test]
    async fn ledger_clear_user_is_scoped() {
        let (_dir, store) = store().await;
        store.record("u1", "d1", &["v1".to_string()]).await.unwrap();
        store.record("u2", "d2", &["v2".to_string()]).await.unwrap();

        store.clear_user("u1").await.unwrap();
        assert!(store.lookup("d1").await.unwrap().is_empty());
        assert_eq!(store.lookup("d2").await.unwrap(), vec!["v2".to_string()]);
    }

    #[tokio::test]
    async fn zettel_inbox_lists_oldest_first_and_deletes() {
        let (_dir, store) = store().await;
        for (id, at) in [("z2", 2), ("z1", 1)] {
            store
                .add_zettel(&Zettel {
                    id: id.to_string(),
                    user_id: "u1".to_string(),
                    content: format!("note {}", id),
                    created_at: at,
                })
                .await
                .unwrap();
        }

        let inbox = store.zettels_for_user("u1").await.unwrap();
        assert_eq!(inbox[0].id, "z1");
        assert_eq!(inbox[1].id, "z2");

        store.delete_zettels(&["z1".to_string()]).await.unwrap();
        let inbox = store.zettels_for_user("u1").await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, "z2");
    }
}
