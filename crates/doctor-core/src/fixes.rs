//! Fix options.
//!
//! A fix option wraps the caller's `{label, why, risk, commands}` into a fix
//! plan whose every step carries the option's risk. Options are presented
//! least risky first.

use crate::diagnosis::DiagnosisBundle;
use crate::plan::{AgentPlan, PlanStage, ToolStep};
use crate::risk::{classify_risk, Risk};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Caller-supplied remedy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSpec {
    pub label: String,
    pub why: String,
    pub risk: Risk,
    pub commands: Vec<String>,
}

impl FixSpec {
    pub fn new(label: &str, why: &str, risk: Risk, commands: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            why: why.to_string(),
            risk,
            commands: commands.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixOption {
    pub id: String,
    pub label: String,
    pub why: String,
    pub risk: Risk,
    pub plan: AgentPlan,
    pub expected_outcome: Vec<String>,
}

/// Build fix options for a diagnosis, stable-sorted by risk rank.
///
/// Ids are assigned before sorting, so `fix_<i>` always refers to the i-th
/// spec as given.
pub fn build_fix_options(diagnosis: &DiagnosisBundle, specs: &[FixSpec]) -> Vec<FixOption> {
    let primary = &diagnosis.primary;
    let stamp = Utc::now().timestamp_millis();

    for spec in specs {
        for cmd in &spec.commands {
            let guessed = classify_risk(cmd);
            if guessed.rank() > spec.risk.rank() {
                debug!("Fix '{}' tagged {} but '{}' looks {}", spec.label, spec.risk, cmd, guessed);
            }
        }
    }

    let mut options: Vec<FixOption> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| FixOption {
            id: format!("fix_{}", i),
            label: spec.label.clone(),
            why: spec.why.clone(),
            risk: spec.risk,
            plan: AgentPlan {
                id: format!("fix_plan_{}_{}", stamp, i),
                intent: primary.label.clone(),
                playbook_id: primary.cause_id.clone(),
                stage: PlanStage::Fix,
                reasoning: spec.why.clone(),
                steps: spec
                    .commands
                    .iter()
                    .enumerate()
                    .map(|(j, cmd)| {
                        ToolStep::terminal(format!("fix_{}_s{}", i, j), cmd.as_str(), spec.risk, spec.label.as_str())
                    })
                    .collect(),
            },
            expected_outcome: vec![format!("Resolve {}", primary.label)],
        })
        .collect();

    options.sort_by_key(|o| o.risk.rank());
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::{DiagnosisBundle, DiagnosisCandidate};

    fn diagnosis() -> DiagnosisBundle {
        DiagnosisBundle {
            primary: DiagnosisCandidate {
                cause_id: "cpu_runaway".to_string(),
                label: "Runaway CPU process".to_string(),
                score: 1.0,
                supporting_findings: vec!["runaway_process".to_string()],
                disconfirming_findings: Vec::new(),
            },
            differential: Vec::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_sorted_by_risk_stable() {
        let specs = vec![
            FixSpec::new("Kill", "stop it", Risk::HighImpact, &["kill -9 4242"]),
            FixSpec::new("Renice", "lower priority", Risk::SafeWrite, &["renice +10 4242"]),
            FixSpec::new("Inspect", "look closer", Risk::Read, &["ps -p 4242"]),
            FixSpec::new("Term", "ask nicely", Risk::SafeWrite, &["kill -15 4242"]),
        ];
        let options = build_fix_options(&diagnosis(), &specs);
        let ids: Vec<&str> = options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["fix_2", "fix_1", "fix_3", "fix_0"]);
        assert!(options.windows(2).all(|w| w[0].risk.rank() <= w[1].risk.rank()));
    }

    #[test]
    fn test_plan_shape() {
        let specs = vec![FixSpec::new(
            "Clean cache",
            "free space",
            Risk::SafeWrite,
            &["apt-get clean", "journalctl --vacuum-time=7d"],
        )];
        let option = &build_fix_options(&diagnosis(), &specs)[0];
        assert_eq!(option.plan.stage, PlanStage::Fix);
        assert_eq!(option.plan.intent, "Runaway CPU process");
        assert_eq!(option.plan.playbook_id, "cpu_runaway");
        assert_eq!(option.plan.steps[1].id, "fix_0_s1");
        assert!(option.plan.steps.iter().all(|s| s.risk == Risk::SafeWrite));
        assert_eq!(option.expected_outcome, vec!["Resolve Runaway CPU process"]);
    }
}
