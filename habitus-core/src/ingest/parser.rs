//! Transcript JSONL parser
//!
//! Turns one raw transcript (a JSONL stream of timestamped, typed events)
//! into a [`ParsedSession`]: ordered prompt/response turns plus session
//! metadata.
//!
//! # Error Handling
//!
//! The parser is designed to be resilient and recover from errors:
//!
//! - **Malformed JSON lines**: skipped, parsing continues. A bad line is
//!   never fatal to the session.
//! - **Missing fields**: tolerated via `#[serde(default)]`; a record without
//!   a timestamp reuses the last seen one as an approximation.
//! - **Unreadable file**: yields no session and zero bytes consumed rather
//!   than an error.
//!
//! # Turn reconstruction
//!
//! Events are walked in order. A human-prompt event whose extracted text
//! survives the synthetic-content filter closes the in-flight turn and opens
//! the next one; assistant events accumulate text parts and tool names onto
//! the open turn until the next prompt appears. A new prompt always starts a
//! new turn even when the previous one never received a response.
//!
//! The whole file is re-read on every parse; skipping already-incorporated
//! work is the sync engine's job, done by comparing total byte length against
//! the session's sync cursor.

use crate::types::project_hash;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// A fully reconstructed session, before persistence.
#[derive(Debug, Clone)]
pub struct ParsedSession {
    /// Stable session identifier from the transcript
    pub id: String,
    /// Working directory, from the first event exposing one
    pub project_path: Option<String>,
    /// Grouping hash of `project_path`
    pub project_hash: Option<String>,
    /// Path of the source transcript
    pub transcript_path: String,
    /// Assistant version string, if present
    pub assistant_version: Option<String>,
    /// Source-control branch, if present
    pub git_branch: Option<String>,
    /// Timestamp of the first event carrying the session identifier
    pub started_at: DateTime<Utc>,
    /// Timestamp of the last event in the file
    pub last_activity_at: DateTime<Utc>,
    /// Reconstructed turns, in order
    pub turns: Vec<ParsedTurn>,
}

/// One reconstructed prompt/response turn.
#[derive(Debug, Clone)]
pub struct ParsedTurn {
    /// 1-based position within the session
    pub turn_number: i64,
    /// Extracted human prompt text (non-empty by construction)
    pub prompt_text: String,
    /// Timestamp of the prompt event
    pub prompt_ts: DateTime<Utc>,
    /// Assistant text parts joined by newlines (may be empty)
    pub assistant_text: String,
    /// Ordered tool names invoked during the turn
    pub tool_names: Vec<String>,
    /// Timestamp of the first assistant event in the turn
    pub response_ts: Option<DateTime<Utc>>,
    /// Model identifier, if observed
    pub model: Option<String>,
}

/// Prompt prefixes that mark synthetic, non-human content.
///
/// A prompt whose content begins with one of these contributes no turn.
const SYNTHETIC_PREFIXES: &[&str] = &[
    "<system-reminder>",
    "<local-command-stdout>",
    "<local-command-stderr>",
    "<command-name>",
    "<command-message>",
    "<task-notification>",
    "<teammate-message",
    "[Request interrupted",
    "Caveat: the messages below were generated by the user while running a local command",
    "This session is being continued from a previous conversation",
];

/// Skill/command templates are injected as markdown documents: a top-level
/// heading, a subheading further down, and a body well beyond what a human
/// types as a prompt.
const TEMPLATE_MIN_LEN: usize = 1000;

/// Result of parsing one transcript file.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// The reconstructed session, or `None` when the stream held no session
    /// identifier or no surviving turns
    pub session: Option<ParsedSession>,
    /// Total bytes consumed (always the full stream for a readable file)
    pub bytes_consumed: u64,
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// Represents a single line from a transcript.
///
/// Uses `#[serde(default)]` liberally to handle missing fields gracefully.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawEvent {
    session_id: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    timestamp: Option<String>,
    cwd: Option<String>,
    version: Option<String>,
    git_branch: Option<String>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    role: Option<String>,
    model: Option<String>,
    content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { name: String },
    // Catch-all for tool_result, image, and future block types
    #[serde(other)]
    Other,
}

/// In-flight turn accumulator; finalized when the next prompt opens.
struct OpenTurn {
    turn_number: i64,
    prompt_text: String,
    prompt_ts: DateTime<Utc>,
    text_parts: Vec<String>,
    tool_names: Vec<String>,
    response_ts: Option<DateTime<Utc>>,
    model: Option<String>,
}

impl OpenTurn {
    fn finish(self) -> ParsedTurn {
        ParsedTurn {
            turn_number: self.turn_number,
            prompt_text: self.prompt_text,
            prompt_ts: self.prompt_ts,
            assistant_text: self.text_parts.join("\n"),
            tool_names: self.tool_names,
            response_ts: self.response_ts,
            model: self.model,
        }
    }
}

/// Parser for transcript JSONL files.
pub struct TranscriptParser;

impl TranscriptParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a transcript file.
    ///
    /// An unreadable file yields `session: None` with zero bytes consumed;
    /// this is the only failure mode and is not surfaced as an error.
    pub fn parse_file(&self, path: &Path) -> ParseOutcome {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read transcript");
                return ParseOutcome::default();
            }
        };

        ParseOutcome {
            session: self.parse_str(&content, &path.to_string_lossy()),
            bytes_consumed: content.len() as u64,
        }
    }

    /// Parse a transcript from its raw content.
    pub fn parse_str(&self, content: &str, source_path: &str) -> Option<ParsedSession> {
        let mut session_id: Option<String> = None;
        let mut cwd: Option<String> = None;
        let mut version: Option<String> = None;
        let mut git_branch: Option<String> = None;
        let mut started_at: Option<DateTime<Utc>> = None;

        // Records without timestamps reuse the last seen value as an
        // approximation; initialized to parse time.
        let observed_at = Utc::now();
        let mut last_timestamp = observed_at;

        let mut turns: Vec<ParsedTurn> = Vec::new();
        let mut open: Option<OpenTurn> = None;

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let event: RawEvent = match serde_json::from_str(line) {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed transcript line");
                    continue;
                }
            };

            let emitted_at = event
                .timestamp
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(last_timestamp);
            last_timestamp = emitted_at;

            // Session id and start time come from the first event carrying one
            if session_id.is_none() {
                if let Some(ref sid) = event.session_id {
                    session_id = Some(sid.clone());
                    started_at = Some(emitted_at);
                }
            }

            // Metadata is captured opportunistically from the first event
            // exposing it
            if cwd.is_none() {
                cwd = event.cwd.clone();
            }
            if version.is_none() {
                version = event.version.clone();
            }
            if git_branch.is_none() {
                git_branch = event.git_branch.clone();
            }

            match event.event_type.as_deref() {
                Some("user") => {
                    let Some(text) = event
                        .message
                        .as_ref()
                        .and_then(|m| m.content.as_ref())
                        .and_then(extract_prompt_text)
                    else {
                        continue;
                    };

                    if let Some(finished) = open.take() {
                        turns.push(finished.finish());
                    }
                    open = Some(OpenTurn {
                        turn_number: turns.len() as i64 + 1,
                        prompt_text: text,
                        prompt_ts: emitted_at,
                        text_parts: Vec::new(),
                        tool_names: Vec::new(),
                        response_ts: None,
                        model: None,
                    });
                }
                Some("assistant") => {
                    let Some(turn) = open.as_mut() else {
                        continue;
                    };
                    let Some(ref msg) = event.message else {
                        continue;
                    };

                    if turn.model.is_none() {
                        turn.model = msg.model.clone();
                    }
                    if turn.response_ts.is_none() {
                        turn.response_ts = Some(emitted_at);
                    }

                    match msg.content {
                        Some(RawContent::Text(ref text)) => {
                            if !text.trim().is_empty() {
                                turn.text_parts.push(text.clone());
                            }
                        }
                        Some(RawContent::Blocks(ref blocks)) => {
                            for block in blocks {
                                match block {
                                    ContentBlock::Text { text } => {
                                        if !text.trim().is_empty() {
                                            turn.text_parts.push(text.clone());
                                        }
                                    }
                                    ContentBlock::ToolUse { name } => {
                                        turn.tool_names.push(name.clone());
                                    }
                                    ContentBlock::Other => {}
                                }
                            }
                        }
                        None => {}
                    }
                }
                _ => {}
            }
        }

        if let Some(finished) = open.take() {
            turns.push(finished.finish());
        }

        let session_id = session_id?;
        if turns.is_empty() {
            return None;
        }

        Some(ParsedSession {
            id: session_id,
            project_path: cwd.clone(),
            project_hash: cwd.as_deref().map(project_hash),
            transcript_path: source_path.to_string(),
            assistant_version: version,
            git_branch,
            started_at: started_at.unwrap_or(observed_at),
            last_activity_at: last_timestamp,
            turns,
        })
    }
}

impl Default for TranscriptParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract prompt text from a human event's content, applying the
/// synthetic-content filter.
///
/// A plain string payload is dropped wholesale when synthetic. A block list
/// keeps only the surviving text blocks, joined by newlines. Returns `None`
/// when nothing survives.
fn extract_prompt_text(content: &RawContent) -> Option<String> {
    let text = match content {
        RawContent::Text(text) => {
            if is_synthetic(text) {
                return None;
            }
            text.clone()
        }
        RawContent::Blocks(blocks) => {
            let surviving: Vec<&str> = blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } if !is_synthetic(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            surviving.join("\n")
        }
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Whether a piece of prompt content is synthetic (system-originated) rather
/// than typed by a human.
fn is_synthetic(text: &str) -> bool {
    let trimmed = text.trim_start();

    if SYNTHETIC_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }

    // Skill/command templates: heading + subheading markdown shape at a
    // length no human prompt reaches
    trimmed.starts_with("# ") && trimmed.contains("\n## ") && trimmed.len() > TEMPLATE_MIN_LEN
}
