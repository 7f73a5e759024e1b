//! Pipeline stages.
//!
//! The eleven stages run in one direction. Stage functions are stateless, so
//! calling an earlier one again still works; the tracker simply refuses to
//! move backwards.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intake,
    Triage,
    Plan,
    Collect,
    Interpret,
    Diagnose,
    Recommend,
    Gate,
    Execute,
    Verify,
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Triage => "triage",
            Stage::Plan => "plan",
            Stage::Collect => "collect",
            Stage::Interpret => "interpret",
            Stage::Diagnose => "diagnose",
            Stage::Recommend => "recommend",
            Stage::Gate => "gate",
            Stage::Execute => "execute",
            Stage::Verify => "verify",
            Stage::Report => "report",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Forward-only record of the furthest stage reached
#[derive(Debug, Clone, Default)]
pub struct StageTracker {
    current: Option<Stage>,
    refused: usize,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    /// Record entry into `stage`. Returns false, leaving the tracker where
    /// it was, when `stage` is behind the current stage.
    pub fn enter(&mut self, stage: Stage) -> bool {
        match self.current {
            Some(current) if stage < current => {
                self.refused += 1;
                warn!("Re-entering {} after {}: stage not rewound", stage, current);
                false
            }
            _ => {
                self.current = Some(stage);
                true
            }
        }
    }

    /// Move to `stage` only if it is ahead; staying put is not a refusal.
    pub fn advance_to(&mut self, stage: Stage) {
        if self.current.map_or(true, |current| stage > current) {
            self.current = Some(stage);
        }
    }

    /// Number of backward moves `enter` refused
    pub fn refused(&self) -> usize {
        self.refused
    }

    /// Collection after a fix ran is the verification round
    pub fn collect_stage(&self) -> Stage {
        match self.current {
            Some(current) if current >= Stage::Execute => Stage::Verify,
            _ => Stage::Collect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Intake < Stage::Report);
        assert!(Stage::Gate < Stage::Execute);
        assert_eq!(Stage::Verify.to_string(), "verify");
    }

    #[test]
    fn test_tracker_forward_only() {
        let mut tracker = StageTracker::new();
        assert!(tracker.enter(Stage::Intake));
        assert!(tracker.enter(Stage::Collect));
        assert!(tracker.enter(Stage::Collect));
        assert!(!tracker.enter(Stage::Triage));
        assert_eq!(tracker.current(), Some(Stage::Collect));
        assert_eq!(tracker.refused(), 1);
    }

    #[test]
    fn test_advance_to_never_refuses() {
        let mut tracker = StageTracker::new();
        tracker.advance_to(Stage::Gate);
        tracker.advance_to(Stage::Execute);
        tracker.advance_to(Stage::Gate);
        assert_eq!(tracker.current(), Some(Stage::Execute));
        assert_eq!(tracker.refused(), 0);
    }

    #[test]
    fn test_collect_after_execute_is_verify() {
        let mut tracker = StageTracker::new();
        assert_eq!(tracker.collect_stage(), Stage::Collect);
        tracker.enter(Stage::Execute);
        assert_eq!(tracker.collect_stage(), Stage::Verify);
    }
}
