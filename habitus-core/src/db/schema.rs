//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- ============================================
    -- Normalized transcript records
    -- ============================================

    CREATE TABLE IF NOT EXISTS sessions (
        id                TEXT PRIMARY KEY,
        project_path      TEXT,
        project_hash      TEXT,
        transcript_path   TEXT NOT NULL,
        started_at        DATETIME NOT NULL,
        last_activity_at  DATETIME,
        assistant_version TEXT,
        git_branch        TEXT,
        turn_count        INTEGER NOT NULL DEFAULT 0,
        last_synced_bytes INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_project_hash ON sessions(project_hash);
    CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON sessions(last_activity_at DESC);

    CREATE TABLE IF NOT EXISTS turns (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id     TEXT NOT NULL REFERENCES sessions(id),
        turn_number    INTEGER NOT NULL,
        prompt_text    TEXT NOT NULL,
        prompt_ts      DATETIME NOT NULL,
        assistant_text TEXT NOT NULL DEFAULT '',
        tool_names     JSON NOT NULL DEFAULT '[]',
        response_ts    DATETIME,
        model          TEXT,

        UNIQUE(session_id, turn_number)
    );

    CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id);
    CREATE INDEX IF NOT EXISTS idx_turns_prompt_ts ON turns(prompt_ts);

    -- ============================================
    -- Full-text index over prompt and response text
    -- ============================================

    CREATE VIRTUAL TABLE IF NOT EXISTS turns_fts USING fts5(
        prompt_text,
        assistant_text,
        content=turns,
        content_rowid=id,
        tokenize = 'porter',
        prefix = '2 3'
    );

    -- Triggers to keep FTS in sync
    CREATE TRIGGER IF NOT EXISTS turns_ai AFTER INSERT ON turns BEGIN
        INSERT INTO turns_fts(rowid, prompt_text, assistant_text)
        VALUES (NEW.id, NEW.prompt_text, NEW.assistant_text);
    END;

    CREATE TRIGGER IF NOT EXISTS turns_ad AFTER DELETE ON turns BEGIN
        INSERT INTO turns_fts(turns_fts, rowid, prompt_text, assistant_text)
        VALUES ('delete', OLD.id, OLD.prompt_text, OLD.assistant_text);
    END;

    CREATE TRIGGER IF NOT EXISTS turns_au AFTER UPDATE ON turns BEGIN
        INSERT INTO turns_fts(turns_fts, rowid, prompt_text, assistant_text)
        VALUES ('delete', OLD.id, OLD.prompt_text, OLD.assistant_text);
        INSERT INTO turns_fts(rowid, prompt_text, assistant_text)
        VALUES (NEW.id, NEW.prompt_text, NEW.assistant_text);
    END;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        // Check version
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = ["sessions", "turns", "turns_fts"];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_turn_unique_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO sessions (id, transcript_path, started_at) VALUES ('s1', '/t.jsonl', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO turns (session_id, turn_number, prompt_text, prompt_ts) VALUES ('s1', 1, 'hi', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO turns (session_id, turn_number, prompt_text, prompt_ts) VALUES ('s1', 1, 'again', '2026-01-01T00:00:01Z')",
            [],
        );
        assert!(dup.is_err(), "duplicate (session, turn_number) should be rejected");
    }
}
