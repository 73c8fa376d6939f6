//! libSQL storage for the editorial 404 mapping.
//!
//! The [`NotFoundPageStore`] persists "below this node, show that page"
//! entries. The request path never reads it directly: entries are loaded into
//! `PageNotFoundService` and refreshed after edits.
//!
//! **Access rules:**
//! - CLI `pages` commands: read-write via [`NotFoundPageStore::open`]
//! - `resolve`: read-only via [`NotFoundPageStore::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use pagenotfound_shared::{NodeKey, NotFoundPageEntry, PageNotFoundError, Result};

/// Storage handle wrapping a libSQL database.
pub struct NotFoundPageStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl NotFoundPageStore {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PageNotFoundError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;

        let store = Self {
            db,
            conn,
            readonly: false,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PageNotFoundError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PageNotFoundError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PageNotFoundError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mapping operations
    // -----------------------------------------------------------------------

    /// Set the 404 page for `node` (insert or replace).
    pub async fn set_not_found_page(&self, node: NodeKey, target: NodeKey) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO not_found_pages (node_key, not_found_key, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(node_key) DO UPDATE SET
                   not_found_key = excluded.not_found_key,
                   updated_at = excluded.updated_at",
                params![node.to_string(), target.to_string(), now.as_str()],
            )
            .await
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;
        tracing::debug!(%node, %target, "404 mapping stored");
        Ok(())
    }

    /// Remove the mapping for `node`. Returns whether a row was deleted.
    pub async fn remove_not_found_page(&self, node: NodeKey) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                "DELETE FROM not_found_pages WHERE node_key = ?1",
                params![node.to_string()],
            )
            .await
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }

    /// Remove every mapping that points at `target`, e.g. after the target
    /// page was deleted. Returns the number of rows removed.
    pub async fn remove_mappings_to(&self, target: NodeKey) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM not_found_pages WHERE not_found_key = ?1",
                params![target.to_string()],
            )
            .await
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))
    }

    /// Get the mapping for `node`.
    pub async fn get_not_found_page(&self, node: NodeKey) -> Result<Option<NotFoundPageEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT node_key, not_found_key, updated_at
                 FROM not_found_pages WHERE node_key = ?1",
                params![node.to_string()],
            )
            .await
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_entry(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PageNotFoundError::Storage(e.to_string())),
        }
    }

    /// List all mappings ordered by node key.
    pub async fn list_not_found_pages(&self) -> Result<Vec<NotFoundPageEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT node_key, not_found_key, updated_at
                 FROM not_found_pages ORDER BY node_key",
                params![],
            )
            .await
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?
        {
            results.push(row_to_entry(&row)?);
        }
        Ok(results)
    }
}

/// Convert a database row to a [`NotFoundPageEntry`].
fn row_to_entry(row: &libsql::Row) -> Result<NotFoundPageEntry> {
    let key_at = |idx: i32| -> Result<NodeKey> {
        let raw: String = row
            .get(idx)
            .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;
        raw.parse()
            .map_err(|e| PageNotFoundError::Storage(format!("invalid node key '{raw}': {e}")))
    };

    let updated_at: String = row
        .get(2)
        .map_err(|e| PageNotFoundError::Storage(e.to_string()))?;

    Ok(NotFoundPageEntry {
        node_key: key_at(0)?,
        not_found_key: key_at(1)?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| PageNotFoundError::Storage(format!("invalid date: {e}")))?,
    })
}
