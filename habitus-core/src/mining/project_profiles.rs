//! Per-project tool usage profiles with enrichment against the global
//! baseline, plus turn signatures unique to a single project.

use crate::db::TurnRecord;
use crate::mining::MiningOptions;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Minimum in-project occurrences for a signature to count as unique to it.
const UNIQUE_SEQUENCE_MIN: usize = 2;

/// How a tool's local share compares to the global baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageFlag {
    /// Enrichment ratio above 1.5: disproportionately used here
    Overused,
    /// Enrichment ratio below 0.5: disproportionately avoided here
    Avoided,
    /// In line with the global baseline
    Typical,
}

/// One tool's usage within a project.
#[derive(Debug, Clone, Serialize)]
pub struct ToolUsage {
    /// Tool name
    pub tool: String,
    /// Invocations within the project
    pub count: usize,
    /// Share of the project's total tool usage, rounded to two decimals
    pub share: f64,
    /// (project share) / (global share), rounded to two decimals
    pub enrichment: f64,
    /// Over/under-representation flag
    pub flag: UsageFlag,
}

/// A project's behavioral profile.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectProfile {
    /// Project path
    pub project_path: String,
    /// Distinct sessions in the window
    pub session_count: usize,
    /// Turns in the window
    pub turn_count: usize,
    /// Per-tool usage with enrichment ratios, heaviest first
    pub tool_usage: Vec<ToolUsage>,
    /// Multi-tool turn signatures seen in this project and nowhere else,
    /// at least twice
    pub unique_sequences: Vec<Vec<String>>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Compute per-project profiles against the global tool-usage distribution.
///
/// Turns without a known project path are excluded. Projects are sorted by
/// turn count descending.
pub fn mine_project_profiles(turns: &[TurnRecord], _opts: &MiningOptions) -> Vec<ProjectProfile> {
    let mut global_counts: HashMap<&str, usize> = HashMap::new();
    let mut global_total: usize = 0;

    struct ProjectAcc<'a> {
        sessions: HashSet<&'a str>,
        turn_count: usize,
        tool_counts: HashMap<&'a str, usize>,
        tool_total: usize,
    }

    let mut projects: HashMap<&str, ProjectAcc> = HashMap::new();

    // Signature -> (owning projects, per-project occurrence counts)
    let mut signatures: HashMap<&[String], HashMap<&str, usize>> = HashMap::new();

    for turn in turns {
        let Some(project) = turn.project_path.as_deref() else {
            continue;
        };

        let acc = projects.entry(project).or_insert_with(|| ProjectAcc {
            sessions: HashSet::new(),
            turn_count: 0,
            tool_counts: HashMap::new(),
            tool_total: 0,
        });
        acc.sessions.insert(&turn.session_id);
        acc.turn_count += 1;

        for tool in &turn.tool_names {
            *global_counts.entry(tool).or_insert(0) += 1;
            global_total += 1;
            *acc.tool_counts.entry(tool).or_insert(0) += 1;
            acc.tool_total += 1;
        }

        if turn.tool_names.len() >= 2 {
            *signatures
                .entry(&turn.tool_names)
                .or_default()
                .entry(project)
                .or_insert(0) += 1;
        }
    }

    if global_total == 0 {
        return Vec::new();
    }

    // Signatures owned by exactly one project, occurring at least twice there
    let mut unique_by_project: HashMap<&str, Vec<Vec<String>>> = HashMap::new();
    for (signature, owners) in &signatures {
        if owners.len() == 1 {
            let (&project, &count) = owners.iter().next().unwrap();
            if count >= UNIQUE_SEQUENCE_MIN {
                unique_by_project
                    .entry(project)
                    .or_default()
                    .push(signature.to_vec());
            }
        }
    }

    let mut profiles: Vec<ProjectProfile> = projects
        .into_iter()
        .map(|(project, acc)| {
            let mut tool_usage: Vec<ToolUsage> = acc
                .tool_counts
                .iter()
                .map(|(&tool, &count)| {
                    let share = count as f64 / acc.tool_total as f64;
                    let global_share = global_counts[tool] as f64 / global_total as f64;
                    let enrichment = round2(share / global_share);
                    ToolUsage {
                        tool: tool.to_string(),
                        count,
                        share: round2(share),
                        enrichment,
                        flag: if enrichment > 1.5 {
                            UsageFlag::Overused
                        } else if enrichment < 0.5 {
                            UsageFlag::Avoided
                        } else {
                            UsageFlag::Typical
                        },
                    }
                })
                .collect();
            tool_usage.sort_by(|a, b| b.count.cmp(&a.count).then(a.tool.cmp(&b.tool)));

            let mut unique_sequences = unique_by_project.remove(project).unwrap_or_default();
            unique_sequences.sort();

            ProjectProfile {
                project_path: project.to_string(),
                session_count: acc.sessions.len(),
                turn_count: acc.turn_count,
                tool_usage,
                unique_sequences,
            }
        })
        .collect();

    profiles.sort_by(|a, b| {
        b.turn_count
            .cmp(&a.turn_count)
            .then(a.project_path.cmp(&b.project_path))
    });

    profiles
}
