//! SQL migration definitions for the PageNotFound database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: schema_migrations, not_found_pages",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Editorial mapping: missing URLs below node_key show not_found_key
CREATE TABLE IF NOT EXISTS not_found_pages (
    node_key      TEXT PRIMARY KEY,
    not_found_key TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index mappings by target page",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_not_found_pages_target ON not_found_pages(not_found_key);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ascending_and_recorded() {
        let migrations = all_migrations();
        for pair in migrations.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
        for m in &migrations {
            assert!(
                m.sql
                    .contains(&format!("INSERT INTO schema_migrations (version) VALUES ({})", m.version)),
                "migration {} does not record itself",
                m.version
            );
        }
    }
}
