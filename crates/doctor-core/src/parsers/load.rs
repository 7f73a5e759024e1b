//! Parsers for `/proc/loadavg` and `uptime`.

use super::atoms::{parse_decimal, ParseError, ParseErrorReason};
use serde::{Deserialize, Serialize};

/// 1/5/15 minute load averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
    /// Runnable entities, `/proc/loadavg` only
    pub running: Option<u32>,
    /// Total scheduling entities, `/proc/loadavg` only
    pub total: Option<u32>,
}

/// Parsed `uptime` line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeInfo {
    /// The "up ..." span as printed, e.g. "3 days,  2:03"
    pub up_for: String,
    pub users: Option<u32>,
    pub load: LoadAverage,
}

/// Parse `/proc/loadavg`: `0.52 0.58 0.59 1/345 12345`
pub fn parse_loadavg(step_id: &str, output: &str) -> Result<LoadAverage, ParseError> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty()).ok_or_else(|| {
        ParseError::new(step_id, ParseErrorReason::EmptyOutput, output)
    })?;

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::at(step_id, 1, line, ParseErrorReason::MalformedRow));
    }

    let num = |s: &str| parse_decimal(s).map_err(|reason| ParseError::at(step_id, 1, s, reason));

    let (running, total) = match parts.get(3).and_then(|p| p.split_once('/')) {
        Some((r, t)) => (r.parse().ok(), t.parse().ok()),
        None => (None, None),
    };

    Ok(LoadAverage {
        one: num(parts[0])?,
        five: num(parts[1])?,
        fifteen: num(parts[2])?,
        running,
        total,
    })
}

/// Parse `uptime` output.
///
/// ```text
///  10:14:03 up 3 days,  2:03,  2 users,  load average: 0.52, 0.58, 0.59
/// ```
///
/// macOS prints `load averages:` with spaces only; both are accepted.
pub fn parse_uptime(step_id: &str, output: &str) -> Result<UptimeInfo, ParseError> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty()).ok_or_else(|| {
        ParseError::new(step_id, ParseErrorReason::EmptyOutput, output)
    })?;

    let (head, loads) = line
        .split_once("load average:")
        .or_else(|| line.split_once("load averages:"))
        .ok_or_else(|| {
            ParseError::at(
                step_id,
                1,
                line,
                ParseErrorReason::MissingSection("load average".to_string()),
            )
        })?;

    let values: Vec<&str> = loads
        .split(|c: char| c == ' ' || c == '\t')
        .map(|s| s.trim_end_matches(','))
        .filter(|s| !s.is_empty())
        .collect();
    if values.len() < 3 {
        return Err(ParseError::at(step_id, 1, loads, ParseErrorReason::MalformedRow));
    }
    let num = |s: &str| parse_decimal(s).map_err(|reason| ParseError::at(step_id, 1, s, reason));
    let load = LoadAverage {
        one: num(values[0])?,
        five: num(values[1])?,
        fifteen: num(values[2])?,
        running: None,
        total: None,
    };

    // "10:14:03 up 3 days,  2:03,  2 users,  "
    let after_up = head.split_once(" up ").map(|(_, rest)| rest).unwrap_or(head);
    let mut up_parts = Vec::new();
    let mut users = None;
    for segment in after_up.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if segment.ends_with("users") || segment.ends_with("user") {
            users = segment.split_whitespace().next().and_then(|n| n.parse().ok());
            continue;
        }
        up_parts.push(segment);
    }

    Ok(UptimeInfo {
        up_for: up_parts.join(", "),
        users,
        load,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loadavg() {
        let load = parse_loadavg("loadavg", "2.50 1.75 0.90 3/812 40211\n").unwrap();
        assert_eq!(load.one, 2.5);
        assert_eq!(load.five, 1.75);
        assert_eq!(load.fifteen, 0.9);
        assert_eq!(load.running, Some(3));
        assert_eq!(load.total, Some(812));
    }

    #[test]
    fn test_parse_loadavg_empty() {
        let err = parse_loadavg("loadavg", "\n").unwrap_err();
        assert_eq!(err.reason, ParseErrorReason::EmptyOutput);
    }

    #[test]
    fn test_parse_uptime_linux() {
        let out = " 10:14:03 up 3 days,  2:03,  2 users,  load average: 0.52, 0.58, 0.59\n";
        let info = parse_uptime("uptime", out).unwrap();
        assert_eq!(info.up_for, "3 days, 2:03");
        assert_eq!(info.users, Some(2));
        assert_eq!(info.load.one, 0.52);
        assert_eq!(info.load.fifteen, 0.59);
    }

    #[test]
    fn test_parse_uptime_macos() {
        let out = "10:14  up 5 mins, 1 user, load averages: 1.95 2.10 2.05\n";
        let info = parse_uptime("uptime", out).unwrap();
        assert_eq!(info.up_for, "5 mins");
        assert_eq!(info.users, Some(1));
        assert_eq!(info.load.five, 2.10);
    }

    #[test]
    fn test_parse_uptime_missing_load() {
        let err = parse_uptime("uptime", "up 2 days\n").unwrap_err();
        assert!(matches!(err.reason, ParseErrorReason::MissingSection(_)));
    }
}
