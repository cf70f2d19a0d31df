//! Prompt clustering by lowercased first token, mapped to canonical intents.

use crate::db::TurnRecord;
use crate::mining::{truncate_text, vocab, MiningOptions};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

const MAX_TOP_TOOLS: usize = 5;
const MAX_EXAMPLES: usize = 3;

/// A group of prompts sharing a first token.
#[derive(Debug, Clone, Serialize)]
pub struct PromptCluster {
    /// Surface grouping key: the lowercased first token
    pub first_word: String,
    /// Canonical intent label from the fixed lookup table
    pub intent: String,
    /// Number of member prompts
    pub member_count: usize,
    /// Distinct sessions contributing members
    pub session_count: usize,
    /// Most frequent co-occurring tool names, capped at five
    pub top_tools: Vec<String>,
    /// Representative example prompts (first, middle, last), truncated
    pub examples: Vec<String>,
}

#[derive(Default)]
struct Group {
    prompts: Vec<String>,
    sessions: HashSet<String>,
    tool_counts: HashMap<String, usize>,
}

/// Cluster prompts by their lowercased first token.
///
/// Groups below the minimum-frequency threshold are discarded; survivors are
/// sorted by member count descending.
pub fn mine_prompt_clusters(turns: &[TurnRecord], opts: &MiningOptions) -> Vec<PromptCluster> {
    let mut groups: HashMap<String, Group> = HashMap::new();

    for turn in turns {
        let Some(token) = first_token(&turn.prompt_text) else {
            continue;
        };

        let group = groups.entry(token).or_default();
        group.prompts.push(turn.prompt_text.clone());
        group.sessions.insert(turn.session_id.clone());
        for tool in &turn.tool_names {
            *group.tool_counts.entry(tool.clone()).or_insert(0) += 1;
        }
    }

    let mut clusters: Vec<PromptCluster> = groups
        .into_iter()
        .filter(|(_, group)| group.prompts.len() >= opts.min_frequency)
        .map(|(first_word, group)| {
            let mut tools: Vec<(String, usize)> = group.tool_counts.into_iter().collect();
            tools.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

            PromptCluster {
                intent: vocab::intent_for(&first_word).to_string(),
                member_count: group.prompts.len(),
                session_count: group.sessions.len(),
                top_tools: tools
                    .into_iter()
                    .take(MAX_TOP_TOOLS)
                    .map(|(name, _)| name)
                    .collect(),
                examples: pick_examples(&group.prompts),
                first_word,
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.member_count
            .cmp(&a.member_count)
            .then(b.session_count.cmp(&a.session_count))
            .then(a.first_word.cmp(&b.first_word))
    });

    clusters
}

/// The lowercased first token of a prompt, stripped of edge punctuation.
fn first_token(prompt: &str) -> Option<String> {
    let token: String = prompt
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// First, middle, and last prompt by insertion order, de-duplicated and
/// truncated.
fn pick_examples(prompts: &[String]) -> Vec<String> {
    let candidates = [0, prompts.len() / 2, prompts.len().saturating_sub(1)];

    let mut examples: Vec<String> = Vec::new();
    for &i in &candidates {
        let example = truncate_text(&prompts[i]);
        if !examples.contains(&example) {
            examples.push(example);
        }
        if examples.len() == MAX_EXAMPLES {
            break;
        }
    }
    examples
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
    fn test_clusters_by_first_token() {
        let turns = vec![
            turn("s1", 1, "fix the login bug", &["Read", "Edit"]),
            turn("s1", 2, "Fix the logout bug", &["Edit"]),
            turn("s2", 1, "fix flaky test", &["Bash"]),
            turn("s2", 2, "add a retry", &[]),
        ];

        let clusters = mine_prompt_clusters(&turns, &opts(2));
        assert_eq!(clusters.len(), 1);

        let fix = &clusters[0];
        assert_eq!(fix.first_word, "fix");
        assert_eq!(fix.intent, "fix");
        assert_eq!(fix.member_count, 3);
        assert_eq!(fix.session_count, 2);
        assert_eq!(fix.top_tools[0], "Edit");
    }

    #[test]
    fn test_unmapped_token_is_other() {
        let turns = vec![
            turn("s1", 1, "ponder the meaning", &[]),
            turn("s2", 1, "ponder again", &[]),
        ];
        let clusters = mine_prompt_clusters(&turns, &opts(2));
        assert_eq!(clusters[0].intent, "other");
    }

    #[test]
    fn test_examples_first_middle_last_deduped() {
        let turns: Vec<_> = (0..5)
            .map(|i| turn("s1", i + 1, &format!("fix bug number {}", i), &[]))
            .collect();

        let clusters = mine_prompt_clusters(&turns, &opts(2));
        assert_eq!(
            clusters[0].examples,
            vec![
                "fix bug number 0".to_string(),
                "fix bug number 2".to_string(),
                "fix bug number 4".to_string(),
            ]
        );

        // Identical prompts collapse to one example
        let turns = vec![
            turn("s1", 1, "fix it", &[]),
            turn("s1", 2, "fix it", &[]),
            turn("s1", 3, "fix it", &[]),
        ];
        let clusters = mine_prompt_clusters(&turns, &opts(2));
        assert_eq!(clusters[0].examples, vec!["fix it".to_string()]);
    }

    #[test]
    fn test_sorted_by_member_count() {
        let mut turns = Vec::new();
        for i in 0..3 {
            turns.push(turn("s1", i + 1, "add a thing", &[]));
        }
        for i in 0..2 {
            turns.push(turn("s1", i + 4, "fix a thing", &[]));
        }

        let clusters = mine_prompt_clusters(&turns, &opts(2));
        assert_eq!(clusters[0].first_word, "add");
        assert_eq!(clusters[1].first_word, "fix");
    }

    #[test]
    fn test_long_examples_truncated() {
        let long = format!("fix {}", "x".repeat(500));
        let turns = vec![turn("s1", 1, &long, &[]), turn("s1", 2, &long, &[])];

        let clusters = mine_prompt_clusters(&turns, &opts(2));
        assert!(clusters[0].examples[0].chars().count() <= 121);
    }
}
