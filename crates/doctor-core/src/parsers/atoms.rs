//! Atomic parsing functions shared by the step parsers.
//!
//! Byte sizes use rational arithmetic with exact rounding. Load averages,
//! percentages from `ps` and temperatures are reported by the tools as
//! decimals and are kept as `f64`.

use serde::{Deserialize, Serialize};

/// Parse error with context for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    /// Step whose output failed to parse
    pub step_id: String,
    /// Line number where error occurred (1-indexed), if applicable
    pub line_num: Option<usize>,
    /// Raw input that failed to parse
    pub raw: String,
    pub reason: ParseErrorReason,
}

/// Specific reason for parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorReason {
    NegativeValue,
    EmptyNumber,
    InvalidNumber,
    UnknownSuffix(String),
    Overflow,
    PercentOutOfRange(u8),
    MalformedRow,
    MissingSection(String),
    EmptyOutput,
}

impl ParseError {
    pub fn new(step_id: &str, reason: ParseErrorReason, raw: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            line_num: None,
            raw: raw.to_string(),
            reason,
        }
    }

    pub fn with_line(mut self, line_num: usize) -> Self {
        self.line_num = Some(line_num);
        self
    }

    /// Wrap a field-level failure with its location.
    pub fn at(step_id: &str, line_num: usize, raw: &str, reason: ParseErrorReason) -> Self {
        Self::new(step_id, reason, raw).with_line(line_num)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line_num {
            Some(line) => write!(f, "{}: line {}: {:?} ({})", self.step_id, line, self.reason, self.raw),
            None => write!(f, "{}: {:?}", self.step_id, self.reason),
        }
    }
}

/// Parse a size string like "4.2G" or "15Gi" into exact bytes.
///
/// Policy: round to nearest byte, ties half up. K/M/G/T (with optional `i`
/// or `iB`) are base-2, matching `free -h` and `df -h`.
pub fn parse_size(s: &str) -> Result<u64, ParseErrorReason> {
    let s = s.trim();

    if s.starts_with('-') {
        return Err(ParseErrorReason::NegativeValue);
    }
    if s.starts_with('+') {
        return Err(ParseErrorReason::InvalidNumber);
    }

    let suffix_start = s.find(|c: char| c.is_ascii_alphabetic()).unwrap_or(s.len());
    let (num_str, suffix) = s.split_at(suffix_start);

    if num_str.is_empty() || num_str == "." {
        return Err(ParseErrorReason::EmptyNumber);
    }

    let multiplier: u128 = match suffix.to_uppercase().as_str() {
        "K" | "KI" | "KIB" => 1 << 10,
        "M" | "MI" | "MIB" => 1 << 20,
        "G" | "GI" | "GIB" => 1 << 30,
        "T" | "TI" | "TIB" => 1 << 40,
        "P" | "PI" | "PIB" => 1 << 50,
        "B" | "" => 1,
        _ => return Err(ParseErrorReason::UnknownSuffix(suffix.to_string())),
    };

    let (numerator, denominator) = parse_decimal_rational(num_str)?;

    let scaled = numerator
        .checked_mul(multiplier)
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| n.checked_add(denominator))
        .ok_or(ParseErrorReason::Overflow)?;
    let bytes = scaled / (denominator * 2);

    bytes.try_into().map_err(|_| ParseErrorReason::Overflow)
}

/// "4.2" → (42, 10), "500" → (500, 1)
fn parse_decimal_rational(s: &str) -> Result<(u128, u128), ParseErrorReason> {
    match s.split_once('.') {
        Some((int_part, frac_part)) => {
            if int_part.is_empty() && frac_part.is_empty() {
                return Err(ParseErrorReason::EmptyNumber);
            }
            let int_val: u128 = if int_part.is_empty() {
                0
            } else {
                int_part.parse().map_err(|_| ParseErrorReason::InvalidNumber)?
            };
            let frac_val: u128 = if frac_part.is_empty() {
                0
            } else {
                frac_part.parse().map_err(|_| ParseErrorReason::InvalidNumber)?
            };
            let denominator = 10u128
                .checked_pow(frac_part.len() as u32)
                .ok_or(ParseErrorReason::Overflow)?;
            let numerator = int_val
                .checked_mul(denominator)
                .and_then(|n| n.checked_add(frac_val))
                .ok_or(ParseErrorReason::Overflow)?;
            Ok((numerator, denominator))
        }
        None => {
            let val: u128 = s.parse().map_err(|_| ParseErrorReason::InvalidNumber)?;
            Ok((val, 1))
        }
    }
}

/// Parse a percent string like "85%" into u8 (0-100).
pub fn parse_percent(s: &str) -> Result<u8, ParseErrorReason> {
    let s = s.trim().trim_end_matches('%');

    if s.starts_with('-') {
        return Err(ParseErrorReason::NegativeValue);
    }
    if s.is_empty() {
        return Err(ParseErrorReason::EmptyNumber);
    }

    let val: u8 = s.parse().map_err(|_| ParseErrorReason::InvalidNumber)?;
    if val > 100 {
        return Err(ParseErrorReason::PercentOutOfRange(val));
    }
    Ok(val)
}

/// Parse a non-negative decimal such as a load average or `%CPU` value.
///
/// Accepts a trailing comma (as printed by `uptime`) and a comma used as
/// decimal separator in some locales ("0,52").
pub fn parse_decimal(s: &str) -> Result<f64, ParseErrorReason> {
    let s = s.trim().trim_end_matches(',');
    if s.is_empty() {
        return Err(ParseErrorReason::EmptyNumber);
    }
    if s.starts_with('-') {
        return Err(ParseErrorReason::NegativeValue);
    }
    let normalized = s.replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(ParseErrorReason::InvalidNumber)
}

/// Integer percentage of `part` in `total`, rounded half up. Zero total is 0.
pub fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let scaled = (part as u128 * 1000 + total as u128 / 2) / total as u128;
    scaled as f64 / 10.0
}
