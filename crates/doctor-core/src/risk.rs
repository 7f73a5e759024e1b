//! Risk classes for tool steps.
//!
//! A step's risk decides two things: which timeout class it runs under and
//! what confirmation the gate demands before it may run.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Risk class of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Risk {
    /// No side effects
    Read,
    /// Reversible mutation, needs a simple confirmation
    SafeWrite,
    /// Needs the typed confirmation phrase
    HighImpact,
}

/// Timeout class a step executes under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Read,
    Write,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::Read => "read",
            Risk::SafeWrite => "safe-write",
            Risk::HighImpact => "high-impact",
        }
    }

    /// Fixed ordering used when presenting fix options.
    pub fn rank(&self) -> u8 {
        match self {
            Risk::Read => 0,
            Risk::SafeWrite => 1,
            Risk::HighImpact => 2,
        }
    }

    pub fn timeout_class(&self) -> TimeoutClass {
        match self {
            Risk::Read => TimeoutClass::Read,
            Risk::SafeWrite | Risk::HighImpact => TimeoutClass::Write,
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        !matches!(self, Risk::Read)
    }

    pub fn indicator(&self) -> &'static str {
        match self {
            Risk::Read => "[R]",
            Risk::SafeWrite => "[W]",
            Risk::HighImpact => "[!]",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Risk::Read => "Read-only inspection. Runs without confirmation.",
            Risk::SafeWrite => "Reversible change. Requires confirmation.",
            Risk::HighImpact => "High-impact change. Requires typing YES to confirm.",
        }
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Risk {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Risk::Read),
            "safe-write" | "safe_write" => Ok(Risk::SafeWrite),
            "high-impact" | "high_impact" => Ok(Risk::HighImpact),
            other => Err(format!(
                "Invalid risk: '{}'. Valid values: read, safe-write, high-impact",
                other
            )),
        }
    }
}

// =============================================================================
// Heuristic classification
// =============================================================================

/// Programs that destroy data or stop the machine
const HIGH_IMPACT_PROGRAMS: &[&str] = &[
    "rm", "dd", "mkfs", "shred", "kill", "pkill", "killall", "reboot", "shutdown", "poweroff",
    "halt", "wipefs", "fdisk", "parted",
];

/// Argument fragments that escalate an otherwise mild command
const HIGH_IMPACT_FRAGMENTS: &[&str] = &["-delete", "prune", "--force", " -rf", "--vacuum"];

/// Programs that mutate state but can be undone
const SAFE_WRITE_PROGRAMS: &[&str] = &[
    "renice", "sysctl", "systemctl", "journalctl", "apt-get", "apt", "dnf", "pacman", "sync",
    "docker", "mkdir", "touch", "cpupower",
];

/// Subcommands of safe-write programs that only read
const READ_SUBCOMMANDS: &[&str] = &[
    "status", "is-active", "list-units", "--disk-usage", "ps", "images", "df", "-a", "-q",
];

/// Classify a raw command into a risk class.
///
/// Used for commands that arrive without an explicit risk tag. Unknown
/// programs are treated as read.
pub fn classify_risk(command: &str) -> Risk {
    let trimmed = command.trim();
    let stripped = trimmed.strip_prefix("sudo ").unwrap_or(trimmed);
    let mut parts = stripped.split_whitespace();
    let program = match parts.next() {
        Some(p) => p.rsplit('/').next().unwrap_or(p),
        None => return Risk::Read,
    };

    if HIGH_IMPACT_PROGRAMS.contains(&program) {
        return Risk::HighImpact;
    }

    for fragment in HIGH_IMPACT_FRAGMENTS {
        if stripped.contains(fragment) {
            return Risk::HighImpact;
        }
    }

    if SAFE_WRITE_PROGRAMS.contains(&program) {
        let first_arg = parts.next().unwrap_or("");
        if READ_SUBCOMMANDS.contains(&first_arg) {
            return Risk::Read;
        }
        return Risk::SafeWrite;
    }

    Risk::Read
}
