//! Outcome card.

use crate::catalog::prevention_tips;
use crate::diagnosis::DiagnosisBundle;
use crate::risk::Risk;
use crate::verify::VerificationResult;
use serde::{Deserialize, Serialize};

/// Confidence scale when verification did not pass
const FAILED_VERIFICATION_FACTOR: f64 = 0.5;
/// Confidence scale when verification passed with a failing check
const PARTIAL_VERIFICATION_FACTOR: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Resolved,
    Improved,
    Unchanged,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Resolved => "resolved",
            OutcomeStatus::Improved => "improved",
            OutcomeStatus::Unchanged => "unchanged",
            OutcomeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTaken {
    pub label: String,
    pub risk: Risk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeCard {
    pub status: OutcomeStatus,
    pub root_cause: String,
    pub actions_taken: Vec<ActionTaken>,
    pub results: Vec<String>,
    pub prevention_tips: Vec<String>,
    pub confidence: f64,
}

/// Derive status and confidence from a verification result.
///
/// Not ok: `failed` when every check failed, otherwise `unchanged`. Ok but
/// with a failing check: `improved`. Otherwise `resolved`.
pub fn outcome_status(verification: &VerificationResult, confidence: f64) -> (OutcomeStatus, f64) {
    if !verification.ok {
        let status = if verification.all_failed() {
            OutcomeStatus::Failed
        } else {
            OutcomeStatus::Unchanged
        };
        (status, confidence * FAILED_VERIFICATION_FACTOR)
    } else if verification.any_failed() {
        (OutcomeStatus::Improved, confidence * PARTIAL_VERIFICATION_FACTOR)
    } else {
        (OutcomeStatus::Resolved, confidence)
    }
}

pub fn build_outcome(
    diagnosis: &DiagnosisBundle,
    verification: &VerificationResult,
    actions: &[ActionTaken],
) -> OutcomeCard {
    let (status, confidence) = outcome_status(verification, diagnosis.primary.score);

    OutcomeCard {
        status,
        root_cause: diagnosis.primary.label.clone(),
        actions_taken: actions.to_vec(),
        results: verification
            .checks
            .iter()
            .map(|c| format!("{}: {}", c.label, if c.ok { "OK" } else { "Failed" }))
            .collect(),
        prevention_tips: prevention_tips(&diagnosis.primary.cause_id),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::DiagnosisCandidate;
    use crate::evidence::build_evidence;
    use crate::verify::CheckResult;
    use std::collections::BTreeMap;

    fn diagnosis(cause_id: &str, score: f64) -> DiagnosisBundle {
        DiagnosisBundle {
            primary: DiagnosisCandidate {
                cause_id: cause_id.to_string(),
                label: "Large log files".to_string(),
                score,
                supporting_findings: Vec::new(),
                disconfirming_findings: Vec::new(),
            },
            differential: Vec::new(),
            notes: String::new(),
        }
    }

    fn verification(ok: bool, checks: &[(&str, bool)]) -> VerificationResult {
        let empty = build_evidence(BTreeMap::new());
        VerificationResult {
            ok,
            checks: checks
                .iter()
                .map(|(label, ok)| CheckResult { label: label.to_string(), ok: *ok })
                .collect(),
            before: empty.clone(),
            after: empty,
        }
    }

    #[test]
    fn test_all_failed_is_failed() {
        let card = build_outcome(
            &diagnosis("log_bloat", 0.9),
            &verification(false, &[("Disk usage reduced", false), ("Logs rotated", false)]),
            &[],
        );
        assert_eq!(card.status, OutcomeStatus::Failed);
        assert!((card.confidence - 0.45).abs() < 1e-9);
        assert_eq!(card.results, vec!["Disk usage reduced: Failed", "Logs rotated: Failed"]);
    }

    #[test]
    fn test_mixed_not_ok_is_unchanged() {
        let card = build_outcome(
            &diagnosis("log_bloat", 1.0),
            &verification(false, &[("a", true), ("b", false)]),
            &[],
        );
        assert_eq!(card.status, OutcomeStatus::Unchanged);
        assert_eq!(card.confidence, 0.5);
    }

    #[test]
    fn test_ok_with_failed_check_is_improved() {
        // run_checks never produces this shape; the branch is kept as written
        let card = build_outcome(
            &diagnosis("log_bloat", 1.0),
            &verification(true, &[("a", true), ("b", false)]),
            &[],
        );
        assert_eq!(card.status, OutcomeStatus::Improved);
        assert_eq!(card.confidence, 0.8);
    }

    #[test]
    fn test_resolved_with_actions_and_tips() {
        let actions = vec![ActionTaken { label: "Vacuum journal".to_string(), risk: Risk::SafeWrite }];
        let card = build_outcome(&diagnosis("disk_full", 0.7), &verification(true, &[("a", true)]), &actions);
        assert_eq!(card.status, OutcomeStatus::Resolved);
        assert_eq!(card.confidence, 0.7);
        assert_eq!(card.root_cause, "Large log files");
        assert_eq!(card.actions_taken, actions);
        assert_eq!(card.prevention_tips.len(), 2);
        assert_eq!(card.results, vec!["a: OK"]);
    }
}
