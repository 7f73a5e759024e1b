//! Before/after verification.

use crate::evidence::EvidenceBundle;
use serde::{Deserialize, Serialize};

pub type CheckFn = dyn Fn(&EvidenceBundle, &EvidenceBundle) -> bool + Send + Sync;

/// Labelled predicate over the before and after bundles
pub struct VerificationCheck {
    pub label: String,
    validate: Box<CheckFn>,
}

impl VerificationCheck {
    pub fn new<F>(label: &str, validate: F) -> Self
    where
        F: Fn(&EvidenceBundle, &EvidenceBundle) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.to_string(),
            validate: Box::new(validate),
        }
    }

    /// Check that holds when metric `name` dropped. A metric missing from
    /// either side fails the check.
    pub fn metric_dropped(label: &str, name: &'static str) -> Self {
        Self::new(label, move |before, after| match (before.number(name), after.number(name)) {
            (Some(b), Some(a)) => a < b,
            _ => false,
        })
    }

    /// Check that holds when metric `name` is below `limit` afterwards
    pub fn metric_below(label: &str, name: &'static str, limit: f64) -> Self {
        Self::new(label, move |_, after| after.number(name).is_some_and(|a| a < limit))
    }

    pub fn run(&self, before: &EvidenceBundle, after: &EvidenceBundle) -> bool {
        (self.validate)(before, after)
    }
}

impl std::fmt::Debug for VerificationCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationCheck").field("label", &self.label).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub label: String,
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// AND of every check; true for an empty check list
    pub ok: bool,
    pub checks: Vec<CheckResult>,
    pub before: EvidenceBundle,
    pub after: EvidenceBundle,
}

impl VerificationResult {
    pub fn all_failed(&self) -> bool {
        self.checks.iter().all(|c| !c.ok)
    }

    pub fn any_failed(&self) -> bool {
        self.checks.iter().any(|c| !c.ok)
    }
}

pub fn run_checks(
    before: &EvidenceBundle,
    after: &EvidenceBundle,
    checks: &[VerificationCheck],
) -> VerificationResult {
    let checks: Vec<CheckResult> = checks
        .iter()
        .map(|check| CheckResult {
            label: check.label.clone(),
            ok: check.run(before, after),
        })
        .collect();

    VerificationResult {
        ok: checks.iter().all(|c| c.ok),
        checks,
        before: before.clone(),
        after: after.clone(),
    }
}
