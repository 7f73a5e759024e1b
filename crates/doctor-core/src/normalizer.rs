//! Command normalization and the allowlist.
//!
//! Inspection commands are normalized before they are matched, so that
//! cosmetic differences (extra spaces, CRLF, a trailing `;`) never change
//! whether a command is allowed. The allowlist is a set of anchored regexes;
//! chaining, backgrounding and redirection operators are refused outright.
//! A pipe is only accepted as a standalone ` | ` segment.

use crate::error::{DoctorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Operators that would let an allowed prefix smuggle in another command
pub const CHAINING_OPERATORS: &[&str] = &[";", "&", "||", "`", "$(", ">", "<", "\n"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCommand {
    pub original: String,
    pub normalized: String,
    /// First word of the normalized command
    pub program: String,
}

/// Normalize a command string.
///
/// Trims, converts CRLF and CR to LF, collapses runs of whitespace outside
/// single or double quotes into one space and drops trailing `;`.
pub fn normalize_command(command: &str) -> NormalizedCommand {
    let unified = command.replace("\r\n", "\n").replace('\r', "\n");

    let mut normalized = String::with_capacity(unified.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for c in unified.trim().chars() {
        match quote {
            Some(q) => {
                normalized.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => pending_space = true,
            None => {
                if pending_space && !normalized.is_empty() {
                    normalized.push(' ');
                }
                pending_space = false;
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                normalized.push(c);
            }
        }
    }

    let normalized = normalized.trim_end_matches(';').trim_end().to_string();
    let program = normalized.split_whitespace().next().unwrap_or_default().to_string();

    NormalizedCommand {
        original: command.to_string(),
        normalized,
        program,
    }
}

/// True if the command contains an operator that chains or redirects, or a
/// pipe written anywhere but between two spaces
pub fn has_chaining(command: &str) -> bool {
    CHAINING_OPERATORS.iter().any(|op| command.contains(op)) || has_bare_pipe(command)
}

fn has_bare_pipe(command: &str) -> bool {
    let bytes = command.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'|' && (i == 0 || bytes[i - 1] != b' ' || bytes.get(i + 1) != Some(&b' '))
    })
}

/// Patterns covering the built-in read-only inspection commands
pub fn default_allowlist_patterns() -> Vec<String> {
    [
        r"^uptime$",
        r"^cat /proc/loadavg$",
        r"^ps -eo [a-z,%]+( --sort=-?[a-z%]+)?( \| head -n [0-9]+)?$",
        r"^free( -[bkmgh]+)?$",
        r"^df( -[hTPi]+)*( /[A-Za-z0-9_./-]*)?$",
        r"^sensors( -[A-Za-z]+)?$",
        r"^du -[shxd0-9 ]+ /[A-Za-z0-9_./-]*( \| sort -[a-z]+)?( \| head -n [0-9]+)?$",
        r"^vmstat( [0-9]+){0,2}$",
        r"^docker (ps|images|system df)( -a)?$",
        r"^journalctl --disk-usage$",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// Compiled allowlist
#[derive(Debug, Clone)]
pub struct Allowlist {
    patterns: Vec<Regex>,
}

impl Allowlist {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| DoctorError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn with_defaults() -> Self {
        Self {
            patterns: default_allowlist_patterns()
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }

    /// Match a command after normalization.
    pub fn is_allowed(&self, command: &str) -> bool {
        let normalized = normalize_command(command).normalized;
        if normalized.is_empty() || has_chaining(&normalized) {
            return false;
        }
        self.patterns.iter().any(|re| re.is_match(&normalized))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
