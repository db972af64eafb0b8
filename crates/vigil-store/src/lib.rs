//! vigil-store — enrolled face gallery persistence.
//!
//! The gallery lives in a single SQLite table and is read once at daemon
//! startup; the running pipeline never touches the database. Writes happen
//! only through the enrollment tooling.

use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;
use vigil_core::{Embedding, GalleryEntry};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("corrupt embedding for model {id}: {reason}")]
    CorruptEmbedding { id: String, reason: String },
    #[error("no such model: {0}")]
    NotFound(String),
}

/// SQLite-backed store of enrolled face models.
pub struct GalleryStore {
    conn: Connection,
}

impl GalleryStore {
    /// Open (and if needed initialize) the gallery database.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS face_models (
              id TEXT PRIMARY KEY,
              label TEXT NOT NULL,
              embedding_json TEXT NOT NULL,
              model_version TEXT,
              created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_face_models_label ON face_models(label);
            "#,
        )?;
        Ok(())
    }

    /// Load every enrolled model, ordered by label then enrollment time.
    pub fn load_gallery(&self) -> Result<Vec<GalleryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, embedding_json, model_version, created_at
             FROM face_models ORDER BY label, created_at",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, label, embedding_json, model_version, created_at) = row?;

            let values: Vec<f32> = serde_json::from_str(&embedding_json).map_err(|e| {
                StoreError::CorruptEmbedding { id: id.clone(), reason: e.to_string() }
            })?;
            let created_at = created_at.parse().map_err(|_| StoreError::CorruptEmbedding {
                id: id.clone(),
                reason: format!("bad created_at: {created_at}"),
            })?;

            entries.push(GalleryEntry {
                id,
                label,
                embedding: Embedding { values, model_version },
                created_at,
            });
        }

        tracing::info!(models = entries.len(), "gallery loaded");
        Ok(entries)
    }

    /// Enroll a new face model; returns its generated id.
    pub fn insert(&self, label: &str, embedding: &Embedding) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let embedding_json = serde_json::to_string(&embedding.values).map_err(|e| {
            StoreError::CorruptEmbedding { id: id.clone(), reason: e.to_string() }
        })?;

        self.conn.execute(
            "INSERT INTO face_models (id, label, embedding_json, model_version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                label,
                embedding_json,
                embedding.model_version,
                Utc::now().to_rfc3339(),
            ],
        )?;

        tracing::info!(id = %id, label, "face model enrolled");
        Ok(id)
    }

    /// Remove an enrolled model by id.
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let affected = self
            .conn
            .execute("DELETE FROM face_models WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
