//! Pattern mining engine
//!
//! Five independent read-only analyses over the persisted turns: tool
//! sequences, prompt clusters, project profiles, workflow arcs, and friction
//! points. Each is a pure function of a turn snapshot loaded for a lookback
//! window and optional project filter; none carries state between calls.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use habitus_core::mining::{MiningOptions, PatternMiner};
//!
//! let miner = PatternMiner::new(&db);
//! let report = miner.report(&MiningOptions::default());
//! println!("{} recurring sequences", report.tool_sequences.len());
//! ```
//!
//! A failure in one analysis degrades that analysis to an empty list; the
//! siblings still run and the report still carries everything that could be
//! computed.

mod friction;
mod project_profiles;
mod prompt_clusters;
mod tool_sequences;
pub mod vocab;
mod workflow_arcs;

pub use friction::FrictionPoint;
pub use project_profiles::{ProjectProfile, ToolUsage, UsageFlag};
pub use prompt_clusters::PromptCluster;
pub use tool_sequences::{SequenceKind, ToolSequence};
pub use workflow_arcs::WorkflowArc;

use crate::db::{Database, TurnRecord};
use crate::error::Result;
use chrono::{Duration, Utc};
use serde::Serialize;

/// Bounded length for prompt excerpts embedded in artifacts.
const TEXT_SNIPPET_CHARS: usize = 120;

/// Shared options for all five analyses.
#[derive(Debug, Clone)]
pub struct MiningOptions {
    /// Lookback window in days
    pub days: u32,
    /// Substring filter on the session's project path
    pub project_filter: Option<String>,
    /// Minimum sessions (sequences, arcs) or members (clusters) for a
    /// pattern to be reported
    pub min_frequency: usize,
}

impl Default for MiningOptions {
    fn default() -> Self {
        Self {
            days: 30,
            project_filter: None,
            min_frequency: 3,
        }
    }
}

/// Aggregate output of all five analyses.
#[derive(Debug, Default, Serialize)]
pub struct PatternReport {
    pub tool_sequences: Vec<ToolSequence>,
    pub prompt_clusters: Vec<PromptCluster>,
    pub project_profiles: Vec<ProjectProfile>,
    pub workflow_arcs: Vec<WorkflowArc>,
    pub friction_points: Vec<FrictionPoint>,
}

/// Read-only facade over the record store for pattern mining.
pub struct PatternMiner<'a> {
    db: &'a Database,
}

impl<'a> PatternMiner<'a> {
    /// Create a miner over an injected read-only store handle.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Load the immutable turn snapshot for the options' window and filter.
    fn snapshot(&self, opts: &MiningOptions) -> Result<Vec<TurnRecord>> {
        let since = Utc::now() - Duration::days(opts.days as i64);
        self.db.turns_in_window(since, opts.project_filter.as_deref())
    }

    /// Recurring tool bigrams, trigrams, signatures, and cross-turn
    /// transitions.
    pub fn tool_sequences(&self, opts: &MiningOptions) -> Result<Vec<ToolSequence>> {
        Ok(tool_sequences::mine_tool_sequences(&self.snapshot(opts)?, opts))
    }

    /// Prompts grouped by first token with canonical intent labels.
    pub fn prompt_clusters(&self, opts: &MiningOptions) -> Result<Vec<PromptCluster>> {
        Ok(prompt_clusters::mine_prompt_clusters(&self.snapshot(opts)?, opts))
    }

    /// Per-project tool usage with enrichment against the global baseline.
    pub fn project_profiles(&self, opts: &MiningOptions) -> Result<Vec<ProjectProfile>> {
        Ok(project_profiles::mine_project_profiles(&self.snapshot(opts)?, opts))
    }

    /// Recurring session shapes as phase-label arcs.
    pub fn workflow_arcs(&self, opts: &MiningOptions) -> Result<Vec<WorkflowArc>> {
        Ok(workflow_arcs::mine_workflow_arcs(&self.snapshot(opts)?, opts))
    }

    /// Short response-to-next-prompt gaps.
    pub fn friction_points(&self, opts: &MiningOptions) -> Result<Vec<FrictionPoint>> {
        Ok(friction::mine_friction_points(&self.snapshot(opts)?, opts))
    }

    /// Run all five analyses, isolating failures per analysis.
    pub fn report(&self, opts: &MiningOptions) -> PatternReport {
        fn degrade<T>(name: &str, result: Result<Vec<T>>) -> Vec<T> {
            result.unwrap_or_else(|e| {
                tracing::warn!(analysis = name, error = %e, "Analysis failed, degrading to empty");
                Vec::new()
            })
        }

        PatternReport {
            tool_sequences: degrade("tool_sequences", self.tool_sequences(opts)),
            prompt_clusters: degrade("prompt_clusters", self.prompt_clusters(opts)),
            project_profiles: degrade("project_profiles", self.project_profiles(opts)),
            workflow_arcs: degrade("workflow_arcs", self.workflow_arcs(opts)),
            friction_points: degrade("friction_points", self.friction_points(opts)),
        }
    }
}

/// Truncate text to the bounded snippet length, on a char boundary.
pub(crate) fn truncate_text(s: &str) -> String {
    if s.chars().count() <= TEXT_SNIPPET_CHARS {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(TEXT_SNIPPET_CHARS).collect();
        out.push('…');
        out
    }
}
