//! Database migration manager for Session Vault
//!
//! Provides automatic schema migration with atomic transactions and rollback support.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::core::error::{DatabaseError, Result, VaultError};

/// Represents a single database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number
    pub version: i64,
    /// Migration name
    pub name: String,
    /// SQL statements to apply the migration
    pub up_sql: String,
    /// SQL statements to rollback the migration (optional)
    pub down_sql: Option<String>,
    /// Checksum for integrity verification
    pub checksum: String,
}

impl Migration {
    /// Create a new migration
    pub fn new(version: i64, name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        let up_sql = up_sql.into();
        let checksum = Self::calculate_checksum(&up_sql);
        Self {
            version,
            name: name.into(),
            up_sql,
            down_sql: None,
            checksum,
        }
    }

    /// Add rollback SQL
    pub fn with_down(mut self, down_sql: impl Into<String>) -> Self {
        self.down_sql = Some(down_sql.into());
        self
    }

    /// BLAKE3 of the migration body; stable across toolchains
    fn calculate_checksum(content: &str) -> String {
        blake3::hash(content.as_bytes()).to_hex().to_string()
    }
}

/// Split a migration script into executable statements, dropping `--` comment lines
fn statements(sql: &str) -> impl Iterator<Item = String> + '_ {
    sql.split(';').filter_map(|chunk| {
        let statement = chunk
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let statement = statement.trim();
        if statement.is_empty() {
            None
        } else {
            Some(statement.to_string())
        }
    })
}

/// Migration manager for handling database schema updates
pub struct MigrationManager {
    pool: SqlitePool,
    migrations: Vec<Migration>,
}

impl MigrationManager {
    /// Create a new migration manager
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            migrations: Vec::new(),
        }
    }

    /// Add a migration to the manager
    pub fn add_migration(&mut self, migration: Migration) {
        self.migrations.push(migration);
        self.migrations.sort_by_key(|m| m.version);
    }

    /// Load the schema migrations compiled into the binary
    pub fn with_embedded_migrations(mut self) -> Self {
        let initial_migration = Migration::new(
            1,
            "001_initial_schema",
            include_str!("../../migrations/001_initial_schema.sql"),
        )
        .with_down(include_str!("../../migrations/001_initial_schema.down.sql"));
        self.add_migration(initial_migration);
        self
    }

    /// Ensure the migrations table exists
    async fn ensure_migrations_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL,
                checksum TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the current schema version
    pub async fn current_version(&self) -> Result<i64> {
        self.ensure_migrations_table().await?;

        let result: (Option<i64>,) = sqlx::query_as("SELECT MAX(version) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.unwrap_or(0))
    }

    /// Get list of applied migrations
    pub async fn applied_migrations(&self) -> Result<HashMap<i64, AppliedMigration>> {
        self.ensure_migrations_table().await?;

        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT version, name, applied_at, checksum FROM schema_migrations ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(version, name, applied_at, checksum)| {
                (
                    version,
                    AppliedMigration {
                        version,
                        name,
                        applied_at,
                        checksum,
                    },
                )
            })
            .collect())
    }

    /// Run all pending migrations
    ///
    /// Applies, in version order, every migration not yet recorded. A recorded
    /// migration whose checksum no longer matches aborts the run.
    pub async fn migrate(&self) -> Result<MigrationResult> {
        let applied = self.applied_migrations().await?;
        let mut result = MigrationResult::default();

        for migration in &self.migrations {
            if let Some(applied_migration) = applied.get(&migration.version) {
                if applied_migration.checksum != migration.checksum {
                    return Err(DatabaseError::MigrationFailed {
                        reason: format!(
                            "Migration {} checksum mismatch: expected {}, found {}",
                            migration.version, migration.checksum, applied_migration.checksum
                        ),
                    }
                    .into());
                }
                result.skipped += 1;
                continue;
            }

            self.apply_migration(migration).await?;
            result.applied += 1;
            result.applied_versions.push(migration.version);
        }

        result.current_version = self.current_version().await?;
        Ok(result)
    }

    /// Apply a single migration atomically
    async fn apply_migration(&self, migration: &Migration) -> Result<()> {
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);

        let mut tx = self.pool.begin().await?;

        for statement in statements(&migration.up_sql) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    VaultError::from(DatabaseError::MigrationFailed {
                        reason: format!(
                            "Migration {} failed at statement: {}. Error: {}",
                            migration.version, statement, e
                        ),
                    })
                })?;
        }

        sqlx::query(
            r#"
            INSERT INTO schema_migrations (version, name, applied_at, checksum)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(migration.version)
        .bind(&migration.name)
        .bind(Utc::now().to_rfc3339())
        .bind(&migration.checksum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Migration {} applied successfully", migration.version);
        Ok(())
    }

    /// Rollback the last applied migration
    ///
    /// This only works if the migration has a down_sql defined.
    pub async fn rollback(&self) -> Result<Option<i64>> {
        let current = self.current_version().await?;
        if current == 0 {
            return Ok(None);
        }

        let migration = self
            .migrations
            .iter()
            .find(|m| m.version == current)
            .ok_or_else(|| DatabaseError::MigrationFailed {
                reason: format!("Migration {} not found for rollback", current),
            })?;

        let down_sql = migration
            .down_sql
            .as_ref()
            .ok_or_else(|| DatabaseError::MigrationFailed {
                reason: format!("Migration {} has no rollback SQL", current),
            })?;

        tracing::info!("Rolling back migration {}: {}", migration.version, migration.name);

        let mut tx = self.pool.begin().await?;

        for statement in statements(down_sql) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    VaultError::from(DatabaseError::MigrationFailed {
                        reason: format!(
                            "Rollback {} failed at statement: {}. Error: {}",
                            migration.version, statement, e
                        ),
                    })
                })?;
        }

        sqlx::query("DELETE FROM schema_migrations WHERE version = ?")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Migration {} rolled back successfully", migration.version);
        Ok(Some(current))
    }
}

/// Information about an applied migration
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: String,
    pub checksum: String,
}

/// Result of running migrations
#[derive(Debug, Default)]
pub struct MigrationResult {
    /// Number of migrations applied
    pub applied: usize,
    /// Number of migrations skipped (already applied)
    pub skipped: usize,
    /// Versions that were applied
    pub applied_versions: Vec<i64>,
    /// Current schema version after migration
    pub current_version: i64,
}
