//! Asset metadata store
//!
//! One `SessionDocument` per session id: the `sessions` row plus every
//! `assets` row that references it. All mutations of a document go through
//! [`MetadataStore::upsert_asset`], which runs as a single write transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::core::error::{DatabaseError, Result, VaultError};

/// Index entry for one stored asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Filesystem location of the bytes
    pub path: String,
    /// Time of the last successful write
    pub modified: DateTime<Utc>,
    /// Byte length at the last successful write
    pub size: u64,
    /// Content type inferred from the filename
    pub mime: String,
    /// Digest of the bytes on disk
    pub hash: String,
    /// Number of overwrites since creation
    pub updated: u64,
}

/// All assets owned by one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub session_id: String,
    pub assets: BTreeMap<String, AssetRecord>,
}

impl SessionDocument {
    /// Document with no assets yet
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            assets: BTreeMap::new(),
        }
    }

    /// Add an asset entry (builder style)
    pub fn with_asset(mut self, asset_key: impl Into<String>, record: AssetRecord) -> Self {
        self.assets.insert(asset_key.into(), record);
        self
    }

    pub fn asset(&self, asset_key: &str) -> Option<&AssetRecord> {
        self.assets.get(asset_key)
    }
}

/// Fields written on every successful upload
///
/// `updated` is not part of this: the store owns the counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFields {
    pub path: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
    pub mime: String,
    pub hash: String,
}

/// Whether an upsert created a new record or overwrote one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Overwritten,
}

/// Session id with the number of assets it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session: String,
    pub assets: u64,
}

type AssetRow = (String, String, DateTime<Utc>, i64, String, String, i64);

fn to_u64(field: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        VaultError::from(DatabaseError::QueryFailed {
            reason: format!("negative {} in asset row: {}", field, value),
        })
    })
}

fn to_i64(field: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        VaultError::from(DatabaseError::QueryFailed {
            reason: format!("{} out of range: {}", field, value),
        })
    })
}

fn record_from_row(row: AssetRow) -> Result<(String, AssetRecord)> {
    let (asset_key, path, modified, size, mime, hash, updated) = row;
    Ok((
        asset_key,
        AssetRecord {
            path,
            modified,
            size: to_u64("size", size)?,
            mime,
            hash,
            updated: to_u64("updated", updated)?,
        },
    ))
}

/// SQLite-backed metadata store
#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Look up a session's document
    ///
    /// `Ok(None)` when the session has never been written. More than one
    /// matching session row means the store is corrupt; that is reported as
    /// [`DatabaseError::Inconsistent`] rather than picking one.
    pub async fn find_by_session(&self, session_id: &str) -> Result<Option<SessionDocument>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT session_id FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;

        match rows.len() {
            0 => {
                tracing::debug!(session = session_id, "no document for session");
                return Ok(None);
            }
            1 => {}
            count => {
                tracing::error!(
                    session = session_id,
                    count,
                    "multiple documents found for session, refusing to choose one"
                );
                return Err(DatabaseError::Inconsistent {
                    session: session_id.to_string(),
                    count,
                }
                .into());
            }
        }

        let asset_rows: Vec<AssetRow> = sqlx::query_as(
            r#"
            SELECT asset_key, path, modified, size, mime, hash, updated
            FROM assets
            WHERE session_id = ?
            ORDER BY asset_key
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let mut document = SessionDocument::new(session_id);
        for row in asset_rows {
            let (asset_key, record) = record_from_row(row)?;
            document.assets.insert(asset_key, record);
        }

        tracing::debug!(
            session = session_id,
            assets = document.assets.len(),
            "found session document"
        );
        Ok(Some(document))
    }

    /// Look up a single asset record
    pub async fn find_asset(
        &self,
        session_id: &str,
        asset_key: &str,
    ) -> Result<Option<AssetRecord>> {
        let row: Option<AssetRow> = sqlx::query_as(
            r#"
            SELECT asset_key, path, modified, size, mime, hash, updated
            FROM assets
            WHERE session_id = ? AND asset_key = ?
            "#,
        )
        .bind(session_id)
        .bind(asset_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| record_from_row(r).map(|(_, record)| record)).transpose()
    }

    /// Insert-or-merge one asset into a session's document
    ///
    /// Creates the session document when absent. A new key starts at
    /// `updated = 0`; an existing key has its fields replaced and `updated`
    /// incremented. The whole operation is one transaction whose first
    /// statement is a write, so concurrent callers serialize on SQLite's
    /// writer lock instead of racing two inserts.
    pub async fn upsert_asset(
        &self,
        session_id: &str,
        asset_key: &str,
        fields: &AssetFields,
    ) -> Result<(AssetRecord, UpsertOutcome)> {
        let size = to_i64("size", fields.size)?;
        let mut tx = self.pool.begin().await?;

        let session_insert = sqlx::query(
            r#"
            INSERT INTO sessions (session_id, created_at) VALUES (?, ?)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if session_insert.rows_affected() > 0 {
            tracing::info!(session = session_id, "inserted new session document");
        }

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT updated FROM assets WHERE session_id = ? AND asset_key = ?")
                .bind(session_id)
                .bind(asset_key)
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO assets (session_id, asset_key, path, modified, size, mime, hash, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(session_id, asset_key) DO UPDATE SET
                path = excluded.path,
                modified = excluded.modified,
                size = excluded.size,
                mime = excluded.mime,
                hash = excluded.hash,
                updated = assets.updated + 1
            "#,
        )
        .bind(session_id)
        .bind(asset_key)
        .bind(&fields.path)
        .bind(fields.modified)
        .bind(size)
        .bind(&fields.mime)
        .bind(&fields.hash)
        .execute(&mut *tx)
        .await?;

        let row: AssetRow = sqlx::query_as(
            r#"
            SELECT asset_key, path, modified, size, mime, hash, updated
            FROM assets
            WHERE session_id = ? AND asset_key = ?
            "#,
        )
        .bind(session_id)
        .bind(asset_key)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let (_, record) = record_from_row(row)?;
        let outcome = if existing.is_some() {
            UpsertOutcome::Overwritten
        } else {
            UpsertOutcome::Created
        };

        tracing::debug!(
            session = session_id,
            asset = asset_key,
            updated = record.updated,
            ?outcome,
            "committed asset record"
        );
        Ok((record, outcome))
    }

    /// Create a brand-new session document
    ///
    /// Fails with [`DatabaseError::SessionExists`] when the session already
    /// has a document; callers that may race should use
    /// [`MetadataStore::upsert_asset`] instead.
    pub async fn insert_session(&self, document: &SessionDocument) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO sessions (session_id, created_at) VALUES (?, ?)")
            .bind(&document.session_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(DatabaseError::SessionExists {
                    session: document.session_id.clone(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        for (asset_key, record) in &document.assets {
            sqlx::query(
                r#"
                INSERT INTO assets
                    (session_id, asset_key, path, modified, size, mime, hash, updated)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&document.session_id)
            .bind(asset_key)
            .bind(&record.path)
            .bind(record.modified)
            .bind(to_i64("size", record.size)?)
            .bind(&record.mime)
            .bind(&record.hash)
            .bind(to_i64("updated", record.updated)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            session = %document.session_id,
            assets = document.assets.len(),
            "inserted session document"
        );
        Ok(())
    }

    /// Every known session with its asset count, ordered by id
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT s.session_id, COUNT(a.asset_key)
            FROM sessions s
            LEFT JOIN assets a ON a.session_id = s.session_id
            GROUP BY s.session_id
            ORDER BY s.session_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(session, count)| {
                Ok(SessionSummary {
                    session,
                    assets: to_u64("count", count)?,
                })
            })
            .collect()
    }
}
