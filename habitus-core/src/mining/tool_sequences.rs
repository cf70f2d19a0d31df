//! Tool sequence mining: recurring bigrams, trigrams, whole-turn signatures,
//! and cross-turn transitions.

use crate::db::TurnRecord;
use crate::mining::MiningOptions;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

const MAX_BIGRAMS: usize = 30;
const MAX_TRIGRAMS: usize = 20;
const MAX_SIGNATURES: usize = 20;
const MAX_CROSS_TURN: usize = 15;

/// Category of a mined tool sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    Bigram,
    Trigram,
    Signature,
    CrossTurn,
}

/// A recurring ordered tool sequence.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSequence {
    /// Which enumeration produced the sequence
    pub kind: SequenceKind,
    /// Ordered tool names
    pub tools: Vec<String>,
    /// Raw occurrence count across all turns
    pub occurrence_count: usize,
    /// Distinct sessions the sequence appeared in
    pub session_count: usize,
    /// Projects that contributed occurrences
    pub projects: Vec<String>,
}

#[derive(Default)]
struct Group {
    occurrences: usize,
    sessions: HashSet<String>,
    projects: BTreeSet<String>,
}

/// Mine recurring tool sequences from the turn snapshot.
///
/// Within each turn's ordered tool list, adjacent pairs and triples are
/// enumerated, plus the full list as a signature when it holds two or more
/// tools. Cross-turn transitions pair the last tool of turn N with the first
/// tool of turn N+1 in the same session. Groups below the minimum
/// distinct-session threshold are discarded, and each category is capped to
/// bound output size.
pub fn mine_tool_sequences(turns: &[TurnRecord], opts: &MiningOptions) -> Vec<ToolSequence> {
    let mut groups: HashMap<(SequenceKind, Vec<String>), Group> = HashMap::new();

    fn record(
        kind: SequenceKind,
        tools: Vec<String>,
        turn: &TurnRecord,
        groups: &mut HashMap<(SequenceKind, Vec<String>), Group>,
    ) {
        let group = groups.entry((kind, tools)).or_default();
        group.occurrences += 1;
        group.sessions.insert(turn.session_id.clone());
        if let Some(ref project) = turn.project_path {
            group.projects.insert(project.clone());
        }
    }

    let mut prev: Option<&TurnRecord> = None;
    for turn in turns {
        for pair in turn.tool_names.windows(2) {
            record(SequenceKind::Bigram, pair.to_vec(), turn, &mut groups);
        }
        for triple in turn.tool_names.windows(3) {
            record(SequenceKind::Trigram, triple.to_vec(), turn, &mut groups);
        }
        if turn.tool_names.len() >= 2 {
            record(
                SequenceKind::Signature,
                turn.tool_names.clone(),
                turn,
                &mut groups,
            );
        }

        if let Some(prev_turn) = prev {
            if prev_turn.session_id == turn.session_id
                && prev_turn.turn_number + 1 == turn.turn_number
            {
                if let (Some(last), Some(first)) =
                    (prev_turn.tool_names.last(), turn.tool_names.first())
                {
                    record(
                        SequenceKind::CrossTurn,
                        vec![last.clone(), first.clone()],
                        turn,
                        &mut groups,
                    );
                }
            }
        }
        prev = Some(turn);
    }

    let mut by_kind: HashMap<SequenceKind, Vec<ToolSequence>> = HashMap::new();
    for ((kind, tools), group) in groups {
        if group.sessions.len() < opts.min_frequency {
            continue;
        }
        by_kind.entry(kind).or_default().push(ToolSequence {
            kind,
            tools,
            occurrence_count: group.occurrences,
            session_count: group.sessions.len(),
            projects: group.projects.into_iter().collect(),
        });
    }

    let mut result = Vec::new();
    for (kind, cap) in [
        (SequenceKind::Bigram, MAX_BIGRAMS),
        (SequenceKind::Trigram, MAX_TRIGRAMS),
        (SequenceKind::Signature, MAX_SIGNATURES),
        (SequenceKind::CrossTurn, MAX_CROSS_TURN),
    ] {
        let mut sequences = by_kind.remove(&kind).unwrap_or_default();
        sequences.sort_by(|a, b| {
            b.session_count
                .cmp(&a.session_count)
                .then(b.occurrence_count.cmp(&a.occurrence_count))
                .then(a.tools.cmp(&b.tools))
        });
        sequences.truncate(cap);
        result.extend(sequences);
    }

    result
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

    #[test]
    fn test_signature_across_sessions() {
        let turns = vec![
            turn("s1", 1, "fix it", &["Read", "Edit", "Bash"]),
            turn("s2", 1, "fix that", &["Read", "Edit", "Bash"]),
        ];

        let sequences = mine_tool_sequences(&turns, &opts(2));
        let signature = sequences
            .iter()
            .find(|s| s.kind == SequenceKind::Signature)
            .expect("signature should be reported");
        assert_eq!(signature.tools, vec!["Read", "Edit", "Bash"]);
        assert_eq!(signature.session_count, 2);
        assert_eq!(signature.occurrence_count, 2);
    }

    #[test]
    fn test_min_frequency_filters_rare_sequences() {
        let turns = vec![turn("s1", 1, "fix it", &["Read", "Edit"])];
        assert!(mine_tool_sequences(&turns, &opts(2)).is_empty());

        let sequences = mine_tool_sequences(&turns, &opts(1));
        assert!(sequences
            .iter()
            .all(|s| s.session_count >= 1 && s.occurrence_count >= 1));
    }

    #[test]
    fn test_bigrams_and_trigrams_enumerated() {
        let turns = vec![turn("s1", 1, "go", &["Read", "Edit", "Bash"])];
        let sequences = mine_tool_sequences(&turns, &opts(1));

        let bigrams: Vec<_> = sequences
            .iter()
            .filter(|s| s.kind == SequenceKind::Bigram)
            .collect();
        assert_eq!(bigrams.len(), 2);

        let trigrams: Vec<_> = sequences
            .iter()
            .filter(|s| s.kind == SequenceKind::Trigram)
            .collect();
        assert_eq!(trigrams.len(), 1);
        assert_eq!(trigrams[0].tools, vec!["Read", "Edit", "Bash"]);
    }

    #[test]
    fn test_cross_turn_transition() {
        let turns = vec![
            turn("s1", 1, "look", &["Read", "Grep"]),
            turn("s1", 2, "change it", &["Edit"]),
        ];
        let sequences = mine_tool_sequences(&turns, &opts(1));

        let cross: Vec<_> = sequences
            .iter()
            .filter(|s| s.kind == SequenceKind::CrossTurn)
            .collect();
        assert_eq!(cross.len(), 1);
        assert_eq!(cross[0].tools, vec!["Grep", "Edit"]);
    }

    #[test]
    fn test_cross_turn_does_not_span_sessions() {
        let turns = vec![
            turn("s1", 1, "look", &["Read"]),
            turn("s2", 1, "change it", &["Edit"]),
        ];
        let sequences = mine_tool_sequences(&turns, &opts(1));
        assert!(!sequences.iter().any(|s| s.kind == SequenceKind::CrossTurn));
    }

    #[test]
    fn test_ordering_by_session_then_occurrence() {
        let mut turns = Vec::new();
        // "Read Edit" in 3 sessions, once each
        for i in 0..3 {
            turns.push(turn(&format!("s{}", i), 1, "go", &["Read", "Edit"]));
        }
        // "Grep Bash" in 2 sessions, twice each
        for i in 0..2 {
            turns.push(turn(&format!("t{}", i), 1, "go", &["Grep", "Bash"]));
            turns.push(turn(&format!("t{}", i), 2, "go", &["Grep", "Bash"]));
        }

        let sequences = mine_tool_sequences(&turns, &opts(2));
        let bigrams: Vec<_> = sequences
            .iter()
            .filter(|s| s.kind == SequenceKind::Bigram)
            .collect();
        assert_eq!(bigrams[0].tools, vec!["Read", "Edit"]);
        assert_eq!(bigrams[0].session_count, 3);
        assert_eq!(bigrams[1].tools, vec!["Grep", "Bash"]);
        assert_eq!(bigrams[1].occurrence_count, 4);
    }
}
