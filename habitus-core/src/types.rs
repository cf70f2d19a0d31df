//! Core domain types for habitus
//!
//! These types represent the normalized record model the ingestion pipeline
//! produces and the pattern-mining engine consumes.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One continuous transcript, identified by a stable id, anchored to a working directory |
//! | **Turn** | One human-prompt/assistant-response pairing within a session, the atomic unit of analysis |
//! | **Project** | The working directory a session ran in; grouped by a path hash |
//! | **Sync cursor** | Byte-length watermark recording how much of a transcript file is already in the store |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One continuous interaction episode, backed by a single transcript file.
///
/// Created on first parse of a transcript; mutated on every re-sync. The
/// `turn_count` always matches the number of persisted turns, and
/// `last_synced_bytes` only ever grows across re-syncs of the same file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable session identifier from the transcript
    pub id: String,
    /// Working directory the session ran in (if the transcript exposed one)
    pub project_path: Option<String>,
    /// Hash of `project_path` used as a directory grouping key
    pub project_hash: Option<String>,
    /// Path to the source transcript file
    pub transcript_path: String,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// Most recent activity timestamp
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Assistant version string, if present in the transcript
    pub assistant_version: Option<String>,
    /// Source-control branch, if present in the transcript
    pub git_branch: Option<String>,
    /// Number of persisted turns
    pub turn_count: i64,
    /// Sync cursor: transcript bytes already incorporated into the store
    pub last_synced_bytes: i64,
}

/// One human-prompt/assistant-response pair within a session.
///
/// Turn numbers are contiguous starting at 1. A turn may carry an empty
/// assistant side: a new surviving human prompt always opens the next turn,
/// whether or not the previous one ever saw a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Owning session
    pub session_id: String,
    /// 1-based position within the session
    pub turn_number: i64,
    /// Extracted human prompt text
    pub prompt_text: String,
    /// Timestamp of the prompt event
    pub prompt_ts: DateTime<Utc>,
    /// Concatenated assistant text (may be empty)
    pub assistant_text: String,
    /// Tool names invoked during the turn, in order, duplicates allowed
    pub tool_names: Vec<String>,
    /// Timestamp of the first assistant event in the turn
    pub response_ts: Option<DateTime<Utc>>,
    /// Model identifier used for the turn, if observed
    pub model: Option<String>,
}

/// Change event emitted after a transcript file is successfully synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A session was created or updated in the store
    SessionUpdated {
        session_id: String,
        turn_count: i64,
    },
}

/// Generate a deterministic grouping hash for a project path using SHA256.
pub fn project_hash(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let hash = hasher.finalize();
    format!("{:x}", hash)[..16].to_string()
}
