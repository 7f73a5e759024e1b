//! Diagnosis scoring.
//!
//! Candidates are caller-supplied causes, each naming the findings that
//! support or disconfirm it. Scoring only looks at findings it is given, so
//! every id recorded on a candidate came from the same interpret run.

use crate::rules::{Finding, Severity};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_CAUSE: &str = "unknown";
pub const UNKNOWN_LABEL: &str = "Unable to determine cause";

/// Score multiplier for a candidate with no supporting finding
const UNSUPPORTED_FACTOR: f64 = 0.7;
const DISCONFIRM_PENALTY: f64 = 1.0;

/// A possible cause, before scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub cause_id: String,
    pub label: String,
    /// Finding ids or finding titles
    pub supporting: Vec<String>,
    /// Finding ids
    #[serde(default)]
    pub disconfirming: Vec<String>,
}

impl CandidateSpec {
    pub fn new(cause_id: &str, label: &str, supporting: &[&str]) -> Self {
        Self {
            cause_id: cause_id.to_string(),
            label: label.to_string(),
            supporting: supporting.iter().map(|s| s.to_string()).collect(),
            disconfirming: Vec::new(),
        }
    }

    pub fn disconfirmed_by(mut self, ids: &[&str]) -> Self {
        self.disconfirming = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    fn is_supported_by(&self, finding: &Finding) -> bool {
        let title = finding.title.to_lowercase();
        self.supporting.iter().filter(|s| !s.trim().is_empty()).any(|s| {
            let s = s.to_lowercase();
            *s == finding.id.to_lowercase() || s.contains(&title) || title.contains(&s)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisCandidate {
    pub cause_id: String,
    pub label: String,
    /// In [0, 1]
    pub score: f64,
    pub supporting_findings: Vec<String>,
    pub disconfirming_findings: Vec<String>,
}

impl DiagnosisCandidate {
    pub fn unknown() -> Self {
        Self {
            cause_id: UNKNOWN_CAUSE.to_string(),
            label: UNKNOWN_LABEL.to_string(),
            score: 0.0,
            supporting_findings: Vec::new(),
            disconfirming_findings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisBundle {
    pub primary: DiagnosisCandidate,
    pub differential: Vec<DiagnosisCandidate>,
    pub notes: String,
}

fn score_candidate(spec: &CandidateSpec, findings: &[Finding]) -> DiagnosisCandidate {
    let mut score = 0.0;
    let mut supporting = Vec::new();
    let mut disconfirming = Vec::new();

    for finding in findings {
        if spec.is_supported_by(finding) {
            score += finding.severity.support_weight();
            supporting.push(finding.id.clone());
        }
        if spec.disconfirming.iter().any(|d| *d == finding.id) {
            score -= DISCONFIRM_PENALTY;
            disconfirming.push(finding.id.clone());
        }
    }

    if supporting.is_empty() {
        score *= UNSUPPORTED_FACTOR;
    }

    DiagnosisCandidate {
        cause_id: spec.cause_id.clone(),
        label: spec.label.clone(),
        score: score.clamp(0.0, 1.0),
        supporting_findings: supporting,
        disconfirming_findings: disconfirming,
    }
}

/// Score every candidate and split into primary and differential.
///
/// Ordering is a stable sort by descending score, so equal scores keep the
/// candidate table's order.
pub fn score_diagnoses(
    findings: &[Finding],
    candidates: &[CandidateSpec],
) -> (DiagnosisCandidate, Vec<DiagnosisCandidate>) {
    let mut scored: Vec<DiagnosisCandidate> =
        candidates.iter().map(|c| score_candidate(c, findings)).collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    if scored.is_empty() {
        return (DiagnosisCandidate::unknown(), Vec::new());
    }
    let primary = scored.remove(0);
    (primary, scored)
}

/// Summary line over the severities present
pub fn diagnosis_notes(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No significant issues detected.".to_string();
    }

    let titles = |severity: Severity| {
        findings
            .iter()
            .filter(|f| f.severity == severity)
            .map(|f| f.title.as_str())
            .collect::<Vec<_>>()
    };
    let critical = titles(Severity::Critical);
    let warnings = titles(Severity::Warn);

    let mut notes = String::new();
    if !critical.is_empty() {
        notes.push_str(&format!("Critical: {}. ", critical.join(", ")));
    }
    if !warnings.is_empty() {
        notes.push_str(&format!("Warnings: {}.", warnings.join(", ")));
    }

    if notes.is_empty() {
        "Issues detected. Review findings for details.".to_string()
    } else {
        notes
    }
}

pub fn build_diagnosis(findings: &[Finding], candidates: &[CandidateSpec]) -> DiagnosisBundle {
    let (primary, differential) = score_diagnoses(findings, candidates);
    DiagnosisBundle {
        primary,
        differential,
        notes: diagnosis_notes(findings),
    }
}
