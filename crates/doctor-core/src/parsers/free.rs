//! Parser for `free -h` output.

use super::atoms::{parse_size, percent_of, ParseError, ParseErrorReason};
use serde::{Deserialize, Serialize};

/// Memory information parsed from `free -h`. All values are bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub shared_bytes: u64,
    pub buff_cache_bytes: u64,
    pub available_bytes: u64,
    /// None when the machine has no swap row
    pub swap_total_bytes: Option<u64>,
    pub swap_used_bytes: Option<u64>,
}

impl MemoryInfo {
    /// Share of memory not available to new allocations.
    ///
    /// Computed from `available` rather than `used`, so page cache does not
    /// count as pressure.
    pub fn used_percent(&self) -> f64 {
        percent_of(self.total_bytes.saturating_sub(self.available_bytes), self.total_bytes)
    }

    /// None without swap or with a zero-sized swap device
    pub fn swap_used_percent(&self) -> Option<f64> {
        match (self.swap_total_bytes, self.swap_used_bytes) {
            (Some(total), Some(used)) if total > 0 => Some(percent_of(used, total)),
            _ => None,
        }
    }
}

/// Parse `free -h` output into MemoryInfo.
///
/// ```text
///                total        used        free      shared  buff/cache   available
/// Mem:            15Gi       8.2Gi       1.5Gi       512Mi       5.8Gi       6.5Gi
/// Swap:          4.0Gi       256Mi       3.8Gi
/// ```
///
/// Rows are located by label, so column padding does not matter.
pub fn parse_free(step_id: &str, output: &str) -> Result<MemoryInfo, ParseError> {
    let mut mem_row: Option<Vec<u64>> = None;
    let mut swap_row: Option<Vec<u64>> = None;

    for (line_idx, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.starts_with("Mem:") {
            mem_row = Some(parse_row(step_id, line, line_idx + 1, 6)?);
        } else if line.starts_with("Swap:") {
            swap_row = Some(parse_row(step_id, line, line_idx + 1, 3)?);
        }
    }

    let mem = mem_row.ok_or_else(|| {
        ParseError::new(
            step_id,
            ParseErrorReason::MissingSection("Mem:".to_string()),
            output,
        )
    })?;

    Ok(MemoryInfo {
        total_bytes: mem[0],
        used_bytes: mem[1],
        free_bytes: mem[2],
        shared_bytes: mem[3],
        buff_cache_bytes: mem[4],
        available_bytes: mem[5],
        swap_total_bytes: swap_row.as_ref().and_then(|s| s.first().copied()),
        swap_used_bytes: swap_row.as_ref().and_then(|s| s.get(1).copied()),
    })
}

/// Parse a labelled row, requiring at least `min_values` values after the label.
fn parse_row(
    step_id: &str,
    line: &str,
    line_num: usize,
    min_values: usize,
) -> Result<Vec<u64>, ParseError> {
    let parts: Vec<&str> = line.split_whitespace().skip(1).collect();
    if parts.len() < min_values {
        return Err(ParseError::at(step_id, line_num, line, ParseErrorReason::MalformedRow));
    }

    parts
        .iter()
        .map(|part| {
            parse_size(part).map_err(|reason| ParseError::at(step_id, line_num, part, reason))
        })
        .collect()
}
