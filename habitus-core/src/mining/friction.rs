//! Friction point detection: short gaps between an assistant response and the
//! next human prompt, suggestive of an immediate retry or dissatisfaction.

use crate::db::TurnRecord;
use crate::mining::{truncate_text, MiningOptions};
use serde::Serialize;

/// Gaps outside [0, MAX_GAP_SECS] are data artifacts, not friction.
const MAX_GAP_SECS: i64 = 30;
/// Cap on reported friction points.
const MAX_POINTS: usize = 50;

/// A suspiciously quick follow-up prompt.
#[derive(Debug, Clone, Serialize)]
pub struct FrictionPoint {
    /// Owning session
    pub session_id: String,
    /// Turn number of the original prompt
    pub turn_number: i64,
    /// The original prompt, truncated
    pub prompt: String,
    /// The immediately following prompt, truncated
    pub next_prompt: String,
    /// Seconds between the assistant response and the next prompt
    pub gap_seconds: i64,
    /// Project of the owning session
    pub project_path: Option<String>,
}

/// Find adjacent turn pairs with an implausibly quick follow-up.
///
/// For every (N, N+1) pair in the same session where turn N has a response
/// timestamp and turn N+1 a prompt timestamp, the gap is kept when it falls
/// within [0, 30] seconds. Smallest gaps are reported first, capped at 50.
pub fn mine_friction_points(turns: &[TurnRecord], _opts: &MiningOptions) -> Vec<FrictionPoint> {
    let mut points = Vec::new();

    for pair in turns.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);

        if current.session_id != next.session_id
            || current.turn_number + 1 != next.turn_number
        {
            continue;
        }
        let Some(response_ts) = current.response_ts else {
            continue;
        };

        let gap_seconds = next
            .prompt_ts
            .signed_duration_since(response_ts)
            .num_seconds();
        if !(0..=MAX_GAP_SECS).contains(&gap_seconds) {
            continue;
        }

        points.push(FrictionPoint {
            session_id: current.session_id.clone(),
            turn_number: current.turn_number,
            prompt: truncate_text(&current.prompt_text),
            next_prompt: truncate_text(&next.prompt_text),
            gap_seconds,
            project_path: current.project_path.clone(),
        });
    }

    points.sort_by(|a, b| {
        a.gap_seconds
            .cmp(&b.gap_seconds)
            .then(a.session_id.cmp(&b.session_id))
            .then(a.turn_number.cmp(&b.turn_number))
    });
    points.truncate(MAX_POINTS);

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::tests::turn;
    use chrono::Duration;

    fn opts() -> MiningOptions {
        MiningOptions::default()
    }

    /// Adjacent pair where the next prompt lands `gap` seconds after the
    /// response to the previous one.
    fn pair_with_gap(session: &str, first_turn: i64, gap: i64) -> Vec<TurnRecord> {
        let mut first = turn(session, first_turn, "try this", &["Edit"]);
        let response_ts = first.prompt_ts + Duration::seconds(20);
        first.response_ts = Some(response_ts);

        let mut second = turn(session, first_turn + 1, "no, try again", &[]);
        second.prompt_ts = response_ts + Duration::seconds(gap);

        vec![first, second]
    }

    #[test]
    fn test_quick_followup_detected() {
        let turns = pair_with_gap("s1", 1, 5);
        let points = mine_friction_points(&turns, &opts());

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].session_id, "s1");
        assert_eq!(points[0].turn_number, 1);
        assert_eq!(points[0].gap_seconds, 5);
        assert_eq!(points[0].prompt, "try this");
        assert_eq!(points[0].next_prompt, "no, try again");
    }

    #[test]
    fn test_gap_bounds() {
        // Negative gap: timestamp artifact
        assert!(mine_friction_points(&pair_with_gap("s1", 1, -3), &opts()).is_empty());
        // Too slow to be a retry
        assert!(mine_friction_points(&pair_with_gap("s1", 1, 31), &opts()).is_empty());
        // Boundary values are kept
        assert_eq!(mine_friction_points(&pair_with_gap("s1", 1, 0), &opts()).len(), 1);
        assert_eq!(
            mine_friction_points(&pair_with_gap("s1", 1, 30), &opts()).len(),
            1
        );
    }

    #[test]
    fn test_missing_response_timestamp_skipped() {
        let mut turns = pair_with_gap("s1", 1, 5);
        turns[0].response_ts = None;
        assert!(mine_friction_points(&turns, &opts()).is_empty());
    }

    #[test]
    fn test_pairs_do_not_span_sessions() {
        let mut turns = pair_with_gap("s1", 1, 5);
        turns[1].session_id = "s2".to_string();
        assert!(mine_friction_points(&turns, &opts()).is_empty());
    }

    #[test]
    fn test_sorted_ascending_and_capped() {
        let mut turns = Vec::new();
        for i in 0..60 {
            turns.extend(pair_with_gap(&format!("s{:02}", i), 1, (i % 31) as i64));
        }

        let points = mine_friction_points(&turns, &opts());
        assert_eq!(points.len(), 50);
        for pair in points.windows(2) {
            assert!(pair[0].gap_seconds <= pair[1].gap_seconds);
        }
        assert!(points.iter().all(|p| (0..=30).contains(&p.gap_seconds)));
    }
}
