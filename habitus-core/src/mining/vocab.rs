//! Fixed vocabulary tables for the mining analyses.
//!
//! The verb-to-intent and tool-to-phase mappings are versioned configuration
//! data, kept as constant tables rather than branching logic so they can be
//! tested and extended in one place.

/// Bump when a table changes meaning, so derived reports can be told apart.
pub const VOCAB_VERSION: u32 = 1;

/// Lowercased first-token → canonical intent label.
pub const INTENT_MAP: &[(&str, &str)] = &[
    ("fix", "fix"),
    ("debug", "fix"),
    ("resolve", "fix"),
    ("repair", "fix"),
    ("add", "create"),
    ("create", "create"),
    ("implement", "create"),
    ("build", "create"),
    ("write", "create"),
    ("refactor", "refactor"),
    ("clean", "refactor"),
    ("simplify", "refactor"),
    ("extract", "refactor"),
    ("update", "update"),
    ("change", "update"),
    ("modify", "update"),
    ("rename", "update"),
    ("remove", "remove"),
    ("delete", "remove"),
    ("explain", "explain"),
    ("what", "explain"),
    ("how", "explain"),
    ("why", "explain"),
    ("describe", "explain"),
    ("test", "verify"),
    ("verify", "verify"),
    ("check", "verify"),
    ("run", "verify"),
];

/// Canonical intent for a lowercased first token; unmapped tokens are "other".
pub fn intent_for(token: &str) -> &'static str {
    INTENT_MAP
        .iter()
        .find(|(verb, _)| *verb == token)
        .map(|(_, intent)| *intent)
        .unwrap_or("other")
}

/// Tools that modify files.
pub const EDIT_TOOLS: &[&str] = &["Edit", "Write", "MultiEdit", "NotebookEdit"];

/// Tools that execute shell commands.
pub const RUN_TOOLS: &[&str] = &["Bash", "BashOutput", "KillShell"];

/// Tools that read or search without modifying anything.
pub const EXPLORE_TOOLS: &[&str] = &["Read", "Grep", "Glob", "WebSearch", "WebFetch"];

/// Tools that delegate work to a subagent.
pub const DELEGATE_TOOLS: &[&str] = &["Task", "Agent"];

/// Collapse a turn's tool list to a single phase label.
///
/// Precedence: edit > run > explore > delegate > other.
pub fn phase_for(tools: &[String]) -> &'static str {
    let contains_any = |set: &[&str]| tools.iter().any(|t| set.contains(&t.as_str()));

    if contains_any(EDIT_TOOLS) {
        "edit"
    } else if contains_any(RUN_TOOLS) {
        "run"
    } else if contains_any(EXPLORE_TOOLS) {
        "explore"
    } else if contains_any(DELEGATE_TOOLS) {
        "delegate"
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_intent_lookup() {
        assert_eq!(intent_for("fix"), "fix");
        assert_eq!(intent_for("debug"), "fix");
        assert_eq!(intent_for("implement"), "create");
        assert_eq!(intent_for("wtf"), "other");
    }

    #[test]
    fn test_phase_precedence() {
        // Edit wins over everything else present in the same turn
        assert_eq!(phase_for(&tools(&["Read", "Bash", "Edit"])), "edit");
        assert_eq!(phase_for(&tools(&["Read", "Bash"])), "run");
        assert_eq!(phase_for(&tools(&["Grep", "Read"])), "explore");
        assert_eq!(phase_for(&tools(&["Task"])), "delegate");
        assert_eq!(phase_for(&tools(&["SomethingNew"])), "other");
        assert_eq!(phase_for(&[]), "other");
    }
}
