use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            -- Identity provider side: credentials only.
            CREATE TABLE accounts (
                id                TEXT PRIMARY KEY,
                email             TEXT NOT NULL UNIQUE,
                password          TEXT NOT NULL,
                reset_token       TEXT,
                reset_expires_at  TEXT,
                created_at        TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Profile documents, keyed by the account id.
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL,
                formal_name     TEXT NOT NULL,
                preferred_name  TEXT NOT NULL DEFAULT '',
                is_admin        INTEGER NOT NULL DEFAULT 0,
                phase           INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE posts (
                id                  TEXT PRIMARY KEY,
                author_id           TEXT NOT NULL,
                author_name         TEXT NOT NULL,
                content             TEXT NOT NULL,
                category            TEXT NOT NULL,
                phase               INTEGER NOT NULL,
                service_experience  TEXT NOT NULL,
                highlights          TEXT NOT NULL DEFAULT '[]',
                comments            TEXT NOT NULL DEFAULT '[]',
                created_at          TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_posts_author ON posts(author_id);
            CREATE INDEX idx_posts_created ON posts(created_at);
            CREATE INDEX idx_users_created ON users(created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
