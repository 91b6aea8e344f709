//! src/stores/sqlite_metadata_store.rs
//!
//! SqliteMetadataStore — photo records and upload intents in SQLite.
//! The table name is configurable, so statements are assembled per store;
//! the name is validated once at construction.

use crate::{
    models::photo::{PhotoRecord, UploadIntent},
    stores::metadata_store::{MetadataError, MetadataResult, MetadataStore, RecordField},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

const PHOTO_COLUMNS: &str = "photo_id, title, description, is_public, create_time";

#[derive(Clone)]
pub struct SqliteMetadataStore {
    /// Shared SQLite connection pool.
    db: Arc<SqlitePool>,
    table: String,
    intents_table: String,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>, table: &str) -> MetadataResult<Self> {
        ensure_table_name_safe(table)?;
        Ok(Self {
            db,
            table: table.to_string(),
            intents_table: format!("{}_upload_intents", table),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn exists(&self, photo_id: &str) -> MetadataResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT 1 FROM {} WHERE photo_id = ?",
            self.table
        ))
        .bind(photo_id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, photo_id: &str) -> MetadataResult<PhotoRecord> {
        sqlx::query_as::<_, PhotoRecord>(&format!(
            "SELECT {} FROM {} WHERE photo_id = ?",
            PHOTO_COLUMNS, self.table
        ))
        .bind(photo_id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => MetadataError::NotFound(photo_id.to_string()),
            other => MetadataError::Sqlx(other),
        })
    }

    async fn put(&self, record: &PhotoRecord) -> MetadataResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(photo_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                is_public = excluded.is_public,
                create_time = excluded.create_time
            "#,
            self.table, PHOTO_COLUMNS
        ))
        .bind(&record.photo_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.is_public)
        .bind(record.create_time)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn update_field(
        &self,
        photo_id: &str,
        value: RecordField,
        expected: Option<RecordField>,
    ) -> MetadataResult<()> {
        let result = match (value, expected) {
            (RecordField::IsPublic(value), None) => {
                sqlx::query(&format!(
                    "UPDATE {} SET is_public = ? WHERE photo_id = ?",
                    self.table
                ))
                .bind(value)
                .bind(photo_id)
                .execute(&*self.db)
                .await?
            }
            (RecordField::IsPublic(value), Some(RecordField::IsPublic(previous))) => {
                sqlx::query(&format!(
                    "UPDATE {} SET is_public = ? WHERE photo_id = ? AND is_public = ?",
                    self.table
                ))
                .bind(value)
                .bind(photo_id)
                .bind(previous)
                .execute(&*self.db)
                .await?
            }
        };

        if result.rows_affected() > 0 {
            return Ok(());
        }
        if expected.is_some() && self.exists(photo_id).await? {
            Err(MetadataError::Conflict(photo_id.to_string()))
        } else {
            Err(MetadataError::NotFound(photo_id.to_string()))
        }
    }

    async fn delete(&self, photo_id: &str) -> MetadataResult<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE photo_id = ?", self.table))
            .bind(photo_id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(photo_id.to_string()));
        }
        Ok(())
    }

    async fn scan_all(&self) -> MetadataResult<Vec<PhotoRecord>> {
        let rows = sqlx::query_as::<_, PhotoRecord>(&format!(
            "SELECT {} FROM {} ORDER BY rowid",
            PHOTO_COLUMNS, self.table
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn record_intent(&self, photo_id: &str) -> MetadataResult<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {} (photo_id, created_at) VALUES (?, ?)",
            self.intents_table
        ))
        .bind(photo_id)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn clear_intent(&self, photo_id: &str) -> MetadataResult<()> {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE photo_id = ?",
            self.intents_table
        ))
        .bind(photo_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn list_intents(&self) -> MetadataResult<Vec<UploadIntent>> {
        let rows = sqlx::query_as::<_, UploadIntent>(&format!(
            "SELECT photo_id, created_at FROM {} ORDER BY created_at",
            self.intents_table
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn migrate(&self) -> MetadataResult<()> {
        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    photo_id    TEXT PRIMARY KEY NOT NULL,
                    title       TEXT,
                    description TEXT,
                    is_public   INTEGER NOT NULL DEFAULT 1,
                    create_time TEXT NOT NULL
                )",
                self.table
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    photo_id   TEXT PRIMARY KEY NOT NULL,
                    created_at TEXT NOT NULL
                )",
                self.intents_table
            ),
        ];

        for stmt in statements {
            tracing::debug!("Executing migration SQL: {}", stmt);
            sqlx::query(&stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one == 1 {
            Ok(())
        } else {
            Err(MetadataError::Sqlx(sqlx::Error::Protocol(format!(
                "unexpected result: {}",
                one
            ))))
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn ensure_table_name_safe(name: &str) -> MetadataResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.len() <= 64 {
        Ok(())
    } else {
        Err(MetadataError::InvalidTableName(name.to_string()))
    }
}
