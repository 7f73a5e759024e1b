//! Per-step authorization.
//!
//! `gate` is a pure decision; callers record the approval event.

use crate::plan::ToolStep;
use crate::risk::Risk;

/// Exact text a user must type to authorize a high-impact step
pub const CONFIRMATION_PHRASE: &str = "YES";

/// Decide whether a step may run.
///
/// - read: always
/// - safe-write: when `confirmed`
/// - high-impact: when `confirmed` and the text is exactly `YES`
pub fn gate(step: &ToolStep, confirmed: bool, confirmation_text: Option<&str>) -> bool {
    match step.risk {
        Risk::Read => true,
        Risk::SafeWrite => confirmed,
        Risk::HighImpact => confirmed && confirmation_text == Some(CONFIRMATION_PHRASE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(risk: Risk) -> ToolStep {
        ToolStep::terminal("s", "cmd", risk, "test")
    }

    #[test]
    fn test_read_always_allowed() {
        let s = step(Risk::Read);
        assert!(gate(&s, false, None));
        assert!(gate(&s, true, Some("anything")));
    }

    #[test]
    fn test_safe_write_needs_confirmation() {
        let s = step(Risk::SafeWrite);
        assert!(!gate(&s, false, None));
        assert!(!gate(&s, false, Some("YES")));
        assert!(gate(&s, true, None));
        assert!(gate(&s, true, Some("whatever")));
    }

    #[test]
    fn test_high_impact_needs_exact_phrase() {
        let s = step(Risk::HighImpact);
        assert!(gate(&s, true, Some("YES")));
        assert!(!gate(&s, true, Some("yes")));
        assert!(!gate(&s, true, Some("Yes ")));
        assert!(!gate(&s, true, Some(" YES")));
        assert!(!gate(&s, true, None));
        assert!(!gate(&s, false, Some("YES")));
    }
}
