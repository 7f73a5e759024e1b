//! Tool steps and agent plans.
//!
//! An `AgentPlan` is either an inspection plan (read-only evidence gathering)
//! or a fix plan built from a chosen fix option. Plans are immutable once
//! built; the collector and the executor only read them.

use crate::risk::Risk;
use crate::triage::{triage, TriageResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Tool name used for shell commands
pub const TERMINAL_TOOL: &str = "terminal";

/// A single command the pipeline may run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStep {
    pub id: String,
    pub tool: String,
    pub command: String,
    pub risk: Risk,
    pub description: String,
}

impl ToolStep {
    /// Read-only terminal step
    pub fn read(id: impl Into<String>, command: impl Into<String>, description: impl Into<String>) -> Self {
        Self::terminal(id, command, Risk::Read, description)
    }

    pub fn terminal(
        id: impl Into<String>,
        command: impl Into<String>,
        risk: Risk,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool: TERMINAL_TOOL.to_string(),
            command: command.into(),
            risk,
            description: description.into(),
        }
    }
}

/// What a plan is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStage {
    Inspect,
    Fix,
}

/// An ordered list of steps with the reasoning behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPlan {
    pub id: String,
    pub intent: String,
    pub playbook_id: String,
    pub stage: PlanStage,
    pub reasoning: String,
    pub steps: Vec<ToolStep>,
}

impl AgentPlan {
    pub fn is_read_only(&self) -> bool {
        self.steps.iter().all(|s| s.risk == Risk::Read)
    }

    /// Highest risk of any step, `Read` for an empty plan
    pub fn max_risk(&self) -> Risk {
        self.steps
            .iter()
            .map(|s| s.risk)
            .max_by_key(|r| r.rank())
            .unwrap_or(Risk::Read)
    }
}

/// Build an inspection plan from a free-text intent.
///
/// An explicit `playbook_id` overrides the playbook chosen by triage; the
/// steps always come from triage.
pub fn build_inspect_plan(intent: &str, playbook_id: Option<&str>) -> AgentPlan {
    let triaged = triage(intent);
    inspect_plan_from_triage(intent, playbook_id, triaged)
}

pub(crate) fn inspect_plan_from_triage(
    intent: &str,
    playbook_id: Option<&str>,
    triaged: TriageResult,
) -> AgentPlan {
    let keywords = if triaged.symptom_keywords.is_empty() {
        "general check".to_string()
    } else {
        triaged.symptom_keywords.join(", ")
    };

    AgentPlan {
        id: format!("inspect_{}", Utc::now().timestamp_millis()),
        intent: intent.to_string(),
        playbook_id: playbook_id
            .map(str::to_string)
            .unwrap_or(triaged.matched_playbook),
        stage: PlanStage::Inspect,
        reasoning: format!("Inspecting system to diagnose: {}", keywords),
        steps: triaged.suggested_steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_plan_for_hot() {
        let plan = build_inspect_plan("my laptop is running hot", None);
        assert_eq!(plan.stage, PlanStage::Inspect);
        assert_eq!(plan.playbook_id, "hot");
        assert!(plan.id.starts_with("inspect_"));
        assert_eq!(plan.reasoning, "Inspecting system to diagnose: hot");
        assert!(plan.is_read_only());
    }

    #[test]
    fn test_inspect_plan_general_check() {
        let plan = build_inspect_plan("something feels off", None);
        assert_eq!(plan.playbook_id, "general");
        assert_eq!(plan.reasoning, "Inspecting system to diagnose: general check");
        assert_eq!(plan.steps.len(), 5);
    }

    #[test]
    fn test_inspect_plan_playbook_override() {
        let plan = build_inspect_plan("disk is full", Some("storage"));
        assert_eq!(plan.playbook_id, "storage");
        assert!(plan.steps.iter().any(|s| s.command == "df -h"));
    }

    #[test]
    fn test_max_risk() {
        let mut plan = build_inspect_plan("hot", None);
        assert_eq!(plan.max_risk(), Risk::Read);
        plan.steps
            .push(ToolStep::terminal("x", "kill 1", Risk::HighImpact, "kill"));
        assert_eq!(plan.max_risk(), Risk::HighImpact);
        assert!(!plan.is_read_only());
    }
}
