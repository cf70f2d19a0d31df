//! Workflow arc detection: sessions collapsed to per-turn phase strings.

use crate::db::TurnRecord;
use crate::mining::{vocab, MiningOptions};
use serde::Serialize;
use std::collections::HashMap;

/// Sessions shorter than this are too thin to show a shape.
const MIN_SESSION_TURNS: usize = 3;
/// Sessions longer than this are marathons, not representative workflows.
const MAX_SESSION_TURNS: usize = 30;
/// Cap on the sample of contributing session ids per arc.
const MAX_SESSION_SAMPLE: usize = 5;

/// A recurring session shape: the ordered phase labels shared by a group of
/// sessions.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowArc {
    /// Ordered phase labels, one per turn
    pub phases: Vec<String>,
    /// Canonical string form of the phase sequence
    pub arc: String,
    /// Number of sessions with exactly this shape
    pub session_count: usize,
    /// Sample of contributing session ids, capped
    pub session_ids: Vec<String>,
    /// Average turn count across contributing sessions
    pub avg_turn_count: f64,
}

/// Detect recurring workflow arcs.
///
/// Only sessions with 3 to 30 in-window turns participate. Each turn's tool
/// list collapses to one phase label, sessions group by their full phase
/// string, and groups below the minimum-session threshold are discarded.
pub fn mine_workflow_arcs(turns: &[TurnRecord], opts: &MiningOptions) -> Vec<WorkflowArc> {
    // Snapshot rows arrive ordered by session then turn number
    let mut sessions: HashMap<&str, Vec<&TurnRecord>> = HashMap::new();
    for turn in turns {
        sessions.entry(&turn.session_id).or_default().push(turn);
    }

    struct Group {
        phases: Vec<String>,
        session_ids: Vec<String>,
        total_turns: usize,
    }

    let mut groups: HashMap<String, Group> = HashMap::new();

    for (session_id, session_turns) in sessions {
        if session_turns.len() < MIN_SESSION_TURNS || session_turns.len() > MAX_SESSION_TURNS {
            continue;
        }

        let phases: Vec<String> = session_turns
            .iter()
            .map(|t| vocab::phase_for(&t.tool_names).to_string())
            .collect();
        let arc = phases.join(">");

        let group = groups.entry(arc).or_insert_with(|| Group {
            phases,
            session_ids: Vec::new(),
            total_turns: 0,
        });
        group.session_ids.push(session_id.to_string());
        group.total_turns += session_turns.len();
    }

    let mut arcs: Vec<WorkflowArc> = groups
        .into_iter()
        .filter(|(_, group)| group.session_ids.len() >= opts.min_frequency)
        .map(|(arc, group)| {
            let session_count = group.session_ids.len();
            let avg_turn_count = group.total_turns as f64 / session_count as f64;

            let mut session_ids = group.session_ids;
            session_ids.sort();
            session_ids.truncate(MAX_SESSION_SAMPLE);

            WorkflowArc {
                phases: group.phases,
                arc,
                session_count,
                session_ids,
                avg_turn_count,
            }
        })
        .collect();

    arcs.sort_by(|a, b| {
        b.session_count
            .cmp(&a.session_count)
            .then(a.arc.cmp(&b.arc))
    });

    arcs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::tests::turn;

    fn opts(min: usize) -> MiningOptions {
        MiningOptions {
            min_frequency: min,
            ..Default::default()
        }
    }

    /// Build one session shaped explore, explore, edit, run.
    fn shaped_session(id: &str) -> Vec<TurnRecord> {
        vec![
            turn(id, 1, "look around", &["Read"]),
            turn(id, 2, "search more", &["Grep", "Glob"]),
            turn(id, 3, "make the change", &["Edit"]),
            turn(id, 4, "run the tests", &["Bash"]),
        ]
    }

    #[test]
    fn test_identical_sessions_group_into_one_arc() {
        let mut turns = Vec::new();
        for id in ["s1", "s2", "s3"] {
            turns.extend(shaped_session(id));
        }

        let arcs = mine_workflow_arcs(&turns, &opts(2));
        assert_eq!(arcs.len(), 1);

        let arc = &arcs[0];
        assert_eq!(arc.phases, vec!["explore", "explore", "edit", "run"]);
        assert_eq!(arc.arc, "explore>explore>edit>run");
        assert_eq!(arc.session_count, 3);
        assert_eq!(arc.avg_turn_count, 4.0);
        assert_eq!(arc.session_ids, vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_short_and_long_sessions_excluded() {
        let mut turns = Vec::new();
        // 2-turn session: too short
        turns.push(turn("short", 1, "a", &["Read"]));
        turns.push(turn("short", 2, "b", &["Edit"]));
        // 31-turn session: too long
        for i in 0..31 {
            turns.push(turn("long", i + 1, "x", &["Read"]));
        }

        assert!(mine_workflow_arcs(&turns, &opts(1)).is_empty());
    }

    #[test]
    fn test_min_frequency_discards_rare_arcs() {
        let turns = shaped_session("s1");
        assert!(mine_workflow_arcs(&turns, &opts(2)).is_empty());
        assert_eq!(mine_workflow_arcs(&turns, &opts(1)).len(), 1);
    }

    #[test]
    fn test_session_sample_capped() {
        let mut turns = Vec::new();
        for i in 0..8 {
            turns.extend(shaped_session(&format!("s{}", i)));
        }

        let arcs = mine_workflow_arcs(&turns, &opts(2));
        assert_eq!(arcs[0].session_count, 8);
        assert_eq!(arcs[0].session_ids.len(), 5);
    }

    #[test]
    fn test_sorted_by_session_count() {
        let mut turns = Vec::new();
        for id in ["s1", "s2", "s3"] {
            turns.extend(shaped_session(id));
        }
        // A different, rarer shape
        for id in ["t1", "t2"] {
            turns.push(turn(id, 1, "a", &["Edit"]));
            turns.push(turn(id, 2, "b", &["Edit"]));
            turns.push(turn(id, 3, "c", &["Edit"]));
        }

        let arcs = mine_workflow_arcs(&turns, &opts(2));
        assert_eq!(arcs.len(), 2);
        assert_eq!(arcs[0].session_count, 3);
        assert_eq!(arcs[1].arc, "edit>edit>edit");
    }
}
