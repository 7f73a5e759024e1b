//! Symptom triage by keyword matching.
//!
//! The intent is lower-cased and tested against a fixed table of symptom
//! categories. Every category whose patterns appear in the intent matches;
//! matches are reported in table order, not in the order they appear in the
//! text.

use crate::catalog::base_inspect_steps;
use crate::plan::ToolStep;
use serde::{Deserialize, Serialize};

/// Playbook used when no symptom matched
pub const GENERAL_PLAYBOOK: &str = "general";

/// Symptom category → substrings that select it
pub const SYMPTOM_PATTERNS: &[(&str, &[&str])] = &[
    (
        "hot",
        &["hot", "running hot", "temperature", "overheat", "fan", "thermal", "cpu hot"],
    ),
    ("slow", &["slow", "lag", "performance", "speed", "responsive"]),
    ("disk", &["disk", "space", "full", "storage", "capacity"]),
    ("memory", &["memory", "ram", "leak", "swapping", "oom"]),
    ("network", &["network", "wifi", "internet", "connection", "port"]),
    ("docker", &["docker", "container", "image"]),
    ("build", &["build", "compile", "error", "failed"]),
];

/// Output of triage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageResult {
    /// First matched symptom, or `general`
    pub matched_playbook: String,
    /// All matched symptoms in table order
    pub symptom_keywords: Vec<String>,
    /// Base inspection set followed by symptom-specific steps
    pub suggested_steps: Vec<ToolStep>,
}

impl TriageResult {
    pub fn matched(&self, symptom: &str) -> bool {
        self.symptom_keywords.iter().any(|k| k == symptom)
    }
}

/// Classify a free-text complaint into symptom categories.
pub fn triage(intent: &str) -> TriageResult {
    let lower_intent = intent.to_lowercase();

    let symptom_keywords: Vec<String> = SYMPTOM_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| lower_intent.contains(p)))
        .map(|(symptom, _)| symptom.to_string())
        .collect();

    let has = |k: &str| symptom_keywords.iter().any(|s| s == k);

    let mut suggested_steps = base_inspect_steps();

    if has("hot") || has("slow") {
        suggested_steps.push(ToolStep::read("sensors", "sensors", "Temperature sensors"));
    }

    // Repeats the base df step; the raw map keeps the last run.
    if has("disk") || has("space") {
        suggested_steps.push(ToolStep::read("df", "df -h", "Disk usage"));
    }

    if has("memory") {
        suggested_steps.push(ToolStep::read("vmstat", "vmstat 1 2", "Paging and swap activity"));
    }

    if has("docker") {
        suggested_steps.push(ToolStep::read("docker_df", "docker system df", "Docker disk usage"));
    }

    TriageResult {
        matched_playbook: symptom_keywords
            .first()
            .cloned()
            .unwrap_or_else(|| GENERAL_PLAYBOOK.to_string()),
        symptom_keywords,
        suggested_steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::Risk;

    #[test]
    fn test_running_hot_scenario() {
        let result = triage("my laptop is running hot");
        assert_eq!(result.matched_playbook, "hot");
        assert_eq!(result.symptom_keywords, vec!["hot".to_string()]);

        let ids: Vec<&str> = result.suggested_steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["uptime", "loadavg", "ps", "free", "df", "sensors"]);
        assert!(result.suggested_steps.iter().all(|s| s.risk == Risk::Read));
    }

    #[test]
    fn test_no_match_is_general() {
        let result = triage("please take a look");
        assert_eq!(result.matched_playbook, GENERAL_PLAYBOOK);
        assert!(result.symptom_keywords.is_empty());
        assert_eq!(result.suggested_steps.len(), 5);
    }

    #[test]
    fn test_case_insensitive() {
        let result = triage("OVERHEATING since the update");
        assert_eq!(result.matched_playbook, "hot");
    }

    #[test]
    fn test_multiple_matches_follow_table_order() {
        // "memory" appears before "slow" in the text, table order wins
        let result = triage("memory use is high and everything is slow");
        assert_eq!(result.symptom_keywords, vec!["slow".to_string(), "memory".to_string()]);
        assert_eq!(result.matched_playbook, "slow");
        assert!(result.matched("memory"));
        assert!(result.suggested_steps.iter().any(|s| s.id == "sensors"));
        assert!(result.suggested_steps.iter().any(|s| s.id == "vmstat"));
    }

    #[test]
    fn test_hot_and_disk_concatenate_with_duplicate_df() {
        let result = triage("fan is loud and the disk is full");
        assert_eq!(result.symptom_keywords, vec!["hot".to_string(), "disk".to_string()]);
        let df_steps = result.suggested_steps.iter().filter(|s| s.id == "df").count();
        assert_eq!(df_steps, 2);
        assert_eq!(result.suggested_steps.last().map(|s| s.command.as_str()), Some("df -h"));
    }
}
