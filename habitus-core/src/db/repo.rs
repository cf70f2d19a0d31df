//! Database repository layer
//!
//! Provides query and upsert operations for sessions and turns, plus the
//! full-text search path used by external consumers.

use crate::error::{Error, Result};
use crate::types::{ConversationTurn, Session};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// A turn joined with its owning session's project path.
///
/// This is the immutable snapshot row the pattern-mining analyses operate on.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    /// Owning session
    pub session_id: String,
    /// Project path of the owning session (if known)
    pub project_path: Option<String>,
    /// 1-based position within the session
    pub turn_number: i64,
    /// Human prompt text
    pub prompt_text: String,
    /// Prompt timestamp
    pub prompt_ts: DateTime<Utc>,
    /// First assistant event timestamp, if any
    pub response_ts: Option<DateTime<Utc>>,
    /// Ordered tool names invoked during the turn
    pub tool_names: Vec<String>,
}

/// A full-text search hit with a highlighted snippet.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Owning session
    pub session_id: String,
    /// Turn number within the session
    pub turn_number: i64,
    /// Highlighted snippet from the matched column
    pub snippet: String,
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Session operations
    // ============================================

    /// Get a session by ID
    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM sessions WHERE id = ?", [id], |row| {
            Self::row_to_session(row)
        })
        .optional()
        .map_err(Error::from)
    }

    /// List sessions ordered by most recent activity
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions ORDER BY last_activity_at DESC, started_at DESC LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], Self::row_to_session)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Look up the sync cursor for a session, if the session exists.
    pub fn get_sync_cursor(&self, session_id: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT last_synced_bytes FROM sessions WHERE id = ?",
            [session_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    /// Apply one file's parsed state atomically.
    ///
    /// Either the whole new state for the session lands or none of it does, so
    /// a reader never observes a session whose `turn_count` disagrees with its
    /// persisted turns. On conflict the session keeps its first-seen version
    /// and branch, and the sync cursor never moves backwards.
    pub fn apply_session_sync(
        &self,
        session: &Session,
        turns: &[ConversationTurn],
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO sessions (
                id, project_path, project_hash, transcript_path, started_at,
                last_activity_at, assistant_version, git_branch, turn_count,
                last_synced_bytes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                project_path = COALESCE(sessions.project_path, excluded.project_path),
                project_hash = COALESCE(sessions.project_hash, excluded.project_hash),
                transcript_path = excluded.transcript_path,
                last_activity_at = excluded.last_activity_at,
                assistant_version = COALESCE(sessions.assistant_version, excluded.assistant_version),
                git_branch = COALESCE(sessions.git_branch, excluded.git_branch),
                turn_count = excluded.turn_count,
                last_synced_bytes = MAX(sessions.last_synced_bytes, excluded.last_synced_bytes)
            "#,
            params![
                session.id,
                session.project_path,
                session.project_hash,
                session.transcript_path,
                session.started_at.to_rfc3339(),
                session.last_activity_at.map(|t| t.to_rfc3339()),
                session.assistant_version,
                session.git_branch,
                session.turn_count,
                session.last_synced_bytes,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO turns (
                    session_id, turn_number, prompt_text, prompt_ts,
                    assistant_text, tool_names, response_ts, model
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(session_id, turn_number) DO UPDATE SET
                    prompt_text = excluded.prompt_text,
                    prompt_ts = excluded.prompt_ts,
                    assistant_text = excluded.assistant_text,
                    tool_names = excluded.tool_names,
                    response_ts = excluded.response_ts,
                    model = excluded.model
                "#,
            )?;

            for turn in turns {
                stmt.execute(params![
                    turn.session_id,
                    turn.turn_number,
                    turn.prompt_text,
                    turn.prompt_ts.to_rfc3339(),
                    turn.assistant_text,
                    serde_json::to_string(&turn.tool_names)?,
                    turn.response_ts.map(|t| t.to_rfc3339()),
                    turn.model,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ============================================
    // Turn operations
    // ============================================

    /// Get all turns for a session, ordered by turn number
    pub fn get_session_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM turns WHERE session_id = ? ORDER BY turn_number ASC")?;
        let rows = stmt.query_map([session_id], Self::row_to_turn)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Load the mining snapshot: all turns with a prompt timestamp at or after
    /// `since`, joined with their session's project path, optionally filtered
    /// by a project-path substring.
    ///
    /// Ordered by session then turn number so adjacent rows of the same
    /// session are adjacent turns.
    pub fn turns_in_window(
        &self,
        since: DateTime<Utc>,
        project_filter: Option<&str>,
    ) -> Result<Vec<TurnRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT t.session_id, s.project_path, t.turn_number, t.prompt_text,
                   t.prompt_ts, t.response_ts, t.tool_names
            FROM turns t
            JOIN sessions s ON s.id = t.session_id
            WHERE t.prompt_ts >= ?1
              AND (?2 IS NULL OR s.project_path LIKE '%' || ?2 || '%')
            ORDER BY t.session_id ASC, t.turn_number ASC
            "#,
        )?;

        let rows = stmt.query_map(params![since.to_rfc3339(), project_filter], |row| {
            let tool_names_json: String = row.get("tool_names")?;
            Ok(TurnRecord {
                session_id: row.get("session_id")?,
                project_path: row.get("project_path")?,
                turn_number: row.get("turn_number")?,
                prompt_text: row.get("prompt_text")?,
                prompt_ts: Self::parse_ts(row.get::<_, String>("prompt_ts")?),
                response_ts: row
                    .get::<_, Option<String>>("response_ts")?
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                // Malformed stored tool lists contribute nothing, not an error
                tool_names: serde_json::from_str(&tool_names_json).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Malformed tool_names JSON, skipping tools");
                    Vec::new()
                }),
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // ============================================
    // Full-text search
    // ============================================

    /// Search prompt and response text with ranked, highlighted results.
    ///
    /// Falls back to a plain substring scan when the query does not parse as
    /// FTS5 syntax (unbalanced quotes, stray operators).
    pub fn search_turns(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        match self.search_turns_fts(query, limit) {
            Ok(hits) => Ok(hits),
            Err(Error::Database(e)) => {
                tracing::debug!(error = %e, query, "FTS query failed, using substring fallback");
                self.search_turns_substring(query, limit)
            }
            Err(e) => Err(e),
        }
    }

    fn search_turns_fts(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT t.session_id, t.turn_number,
                   snippet(turns_fts, -1, '[', ']', '…', 12) AS hit
            FROM turns_fts f
            JOIN turns t ON t.id = f.rowid
            WHERE turns_fts MATCH ?1
            ORDER BY bm25(turns_fts)
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![query, limit as i64], |row| {
            Ok(SearchHit {
                session_id: row.get(0)?,
                turn_number: row.get(1)?,
                snippet: row.get(2)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    fn search_turns_substring(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let conn = self.conn.lock().unwrap();
        let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{}%", escaped);

        let mut stmt = conn.prepare(
            r#"
            SELECT session_id, turn_number, substr(prompt_text, 1, 120)
            FROM turns
            WHERE prompt_text LIKE ?1 ESCAPE '\'
               OR assistant_text LIKE ?1 ESCAPE '\'
            ORDER BY prompt_ts DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            Ok(SearchHit {
                session_id: row.get(0)?,
                turn_number: row.get(1)?,
                snippet: row.get(2)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // ============================================
    // Row mapping
    // ============================================

    fn parse_ts(s: String) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
        let started_at_str: String = row.get("started_at")?;
        let last_activity_str: Option<String> = row.get("last_activity_at")?;

        Ok(Session {
            id: row.get("id")?,
            project_path: row.get("project_path")?,
            project_hash: row.get("project_hash")?,
            transcript_path: row.get("transcript_path")?,
            started_at: Self::parse_ts(started_at_str),
            last_activity_at: last_activity_str
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            assistant_version: row.get("assistant_version")?,
            git_branch: row.get("git_branch")?,
            turn_count: row.get("turn_count")?,
            last_synced_bytes: row.get("last_synced_bytes")?,
        })
    }

    fn row_to_turn(row: &Row) -> rusqlite::Result<ConversationTurn> {
        let prompt_ts_str: String = row.get("prompt_ts")?;
        let response_ts_str: Option<String> = row.get("response_ts")?;
        let tool_names_json: String = row.get("tool_names")?;

        Ok(ConversationTurn {
            session_id: row.get("session_id")?,
            turn_number: row.get("turn_number")?,
            prompt_text: row.get("prompt_text")?,
            prompt_ts: Self::parse_ts(prompt_ts_str),
            assistant_text: row.get("assistant_text")?,
            tool_names: serde_json::from_str(&tool_names_json).unwrap_or_default(),
            response_ts: response_ts_str
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            model: row.get("model")?,
        })
    }
}
