//! Parser for `ps -eo pid,ppid,pcpu,pmem,comm` style output.
//!
//! Columns are located from the header line, so any `-o` ordering works as
//! long as the command column comes last.

use super::atoms::{parse_decimal, ParseError, ParseErrorReason};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: Option<u32>,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub command: String,
}

#[derive(Debug, Default)]
struct Columns {
    pid: Option<usize>,
    ppid: Option<usize>,
    cpu: Option<usize>,
    mem: Option<usize>,
    command: Option<usize>,
}

fn locate_columns(header: &str) -> Columns {
    let mut cols = Columns::default();
    for (idx, name) in header.split_whitespace().enumerate() {
        match name.to_uppercase().as_str() {
            "PID" => cols.pid = Some(idx),
            "PPID" => cols.ppid = Some(idx),
            "%CPU" | "PCPU" => cols.cpu = Some(idx),
            "%MEM" | "PMEM" => cols.mem = Some(idx),
            "COMMAND" | "COMM" | "CMD" => cols.command = Some(idx),
            _ => {}
        }
    }
    cols
}

/// Parse a process table. Rows are returned in output order.
pub fn parse_ps(step_id: &str, output: &str) -> Result<Vec<ProcessInfo>, ParseError> {
    let mut lines = output.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| ParseError::new(step_id, ParseErrorReason::EmptyOutput, output))?;
    let cols = locate_columns(header);

    let (pid_col, cpu_col, cmd_col) = match (cols.pid, cols.cpu, cols.command) {
        (Some(p), Some(c), Some(cmd)) => (p, c, cmd),
        _ => {
            return Err(ParseError::at(
                step_id,
                1,
                header,
                ParseErrorReason::MissingSection("PID/%CPU/COMMAND header".to_string()),
            ))
        }
    };

    let mut processes = Vec::new();
    for (line_idx, line) in lines {
        let line_num = line_idx + 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() <= cmd_col {
            return Err(ParseError::at(step_id, line_num, line, ParseErrorReason::MalformedRow));
        }

        let pid = parts[pid_col]
            .parse::<u32>()
            .map_err(|_| ParseError::at(step_id, line_num, parts[pid_col], ParseErrorReason::InvalidNumber))?;
        let decimal = |idx: usize| {
            parse_decimal(parts[idx]).map_err(|reason| ParseError::at(step_id, line_num, parts[idx], reason))
        };

        processes.push(ProcessInfo {
            pid,
            ppid: cols.ppid.and_then(|i| parts.get(i)).and_then(|p| p.parse().ok()),
            cpu_percent: decimal(cpu_col)?,
            mem_percent: match cols.mem {
                Some(i) => decimal(i)?,
                None => 0.0,
            },
            command: parts[cmd_col..].join(" "),
        });
    }

    Ok(processes)
}

/// Process with the highest CPU share. Ties keep the earlier row.
pub fn top_by_cpu(processes: &[ProcessInfo]) -> Option<&ProcessInfo> {
    processes.iter().fold(None, |best: Option<&ProcessInfo>, p| match best {
        Some(b) if b.cpu_percent >= p.cpu_percent => Some(b),
        _ => Some(p),
    })
}

/// Process with the highest memory share. Ties keep the earlier row.
pub fn top_by_mem(processes: &[ProcessInfo]) -> Option<&ProcessInfo> {
    processes.iter().fold(None, |best: Option<&ProcessInfo>, p| match best {
        Some(b) if b.mem_percent >= p.mem_percent => Some(b),
        _ => Some(p),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS_OUTPUT: &str = "\
    PID    PPID %CPU %MEM COMMAND
   4242       1  183.4  2.1 node
    911       1   12.0 31.5 firefox
      1       0    0.0  0.1 systemd
";

    #[test]
    fn test_parse_ps_rows() {
        let procs = parse_ps("ps", PS_OUTPUT).unwrap();
        assert_eq!(procs.len(), 3);
        assert_eq!(procs[0].pid, 4242);
        assert_eq!(procs[0].ppid, Some(1));
        assert_eq!(procs[0].cpu_percent, 183.4);
        assert_eq!(procs[1].command, "firefox");
    }

    #[test]
    fn test_top_processes() {
        let procs = parse_ps("ps", PS_OUTPUT).unwrap();
        assert_eq!(top_by_cpu(&procs).map(|p| p.pid), Some(4242));
        assert_eq!(top_by_mem(&procs).map(|p| p.pid), Some(911));
        assert!(top_by_cpu(&[]).is_none());
    }

    #[test]
    fn test_command_with_spaces() {
        let out = "PID %CPU COMMAND\n77 5.0 Web Content\n";
        let procs = parse_ps("ps", out).unwrap();
        assert_eq!(procs[0].command, "Web Content");
        assert_eq!(procs[0].mem_percent, 0.0);
        assert_eq!(procs[0].ppid, None);
    }

    #[test]
    fn test_missing_header_columns() {
        let err = parse_ps("ps", "USER TTY\nroot pts/0\n").unwrap_err();
        assert!(matches!(err.reason, ParseErrorReason::MissingSection(_)));
    }

    #[test]
    fn test_bad_pid() {
        let err = parse_ps("ps", "PID %CPU COMMAND\nabc 1.0 x\n").unwrap_err();
        assert_eq!(err.reason, ParseErrorReason::InvalidNumber);
        assert_eq!(err.line_num, Some(2));
    }
}
