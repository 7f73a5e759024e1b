//! Parser for lm-sensors `sensors` output.
//!
//! ```text
//! coretemp-isa-0000
//! Adapter: ISA adapter
//! Package id 0:  +84.0°C  (high = +100.0°C, crit = +100.0°C)
//! Core 0:        +81.0°C  (high = +100.0°C, crit = +100.0°C)
//!
//! thinkpad-isa-0000
//! fan1:        2400 RPM
//! ```

use super::atoms::{parse_decimal, ParseError, ParseErrorReason};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    /// Chip the reading belongs to, e.g. "coretemp-isa-0000"
    pub chip: Option<String>,
    pub label: String,
    pub celsius: f64,
    pub high: Option<f64>,
    pub critical: Option<f64>,
}

impl TemperatureReading {
    /// Package, core and AMD Tctl/Tdie sensors describe the CPU die
    pub fn is_cpu(&self) -> bool {
        let label = self.label.to_lowercase();
        label.starts_with("package")
            || label.starts_with("core")
            || label.starts_with("tctl")
            || label.starts_with("tdie")
            || label.starts_with("cpu")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanReading {
    pub chip: Option<String>,
    pub label: String,
    pub rpm: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    pub temperatures: Vec<TemperatureReading>,
    pub fans: Vec<FanReading>,
}

impl SensorReadings {
    /// Hottest CPU reading, falling back to the hottest reading of any kind
    pub fn cpu_temp(&self) -> Option<f64> {
        max_celsius(self.temperatures.iter().filter(|t| t.is_cpu()))
            .or_else(|| max_celsius(self.temperatures.iter()))
    }

    pub fn slowest_fan_rpm(&self) -> Option<u32> {
        self.fans.iter().map(|f| f.rpm).min()
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty() && self.fans.is_empty()
    }
}

fn max_celsius<'a>(readings: impl Iterator<Item = &'a TemperatureReading>) -> Option<f64> {
    readings
        .map(|t| t.celsius)
        .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t))))
}

fn temp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^:]+):\s+([+-]?[0-9]+(?:\.[0-9]+)?)\s*°?C").expect("valid temperature regex")
    })
}

fn limit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(high|crit)\s*=\s*\+?([0-9]+(?:\.[0-9]+)?)").expect("valid limit regex")
    })
}

fn fan_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^:]+):\s+([0-9]+)\s+RPM").expect("valid fan regex"))
}

/// Parse `sensors` output. Output with no readings at all is an error.
pub fn parse_sensors(step_id: &str, output: &str) -> Result<SensorReadings, ParseError> {
    let mut readings = SensorReadings::default();
    let mut chip: Option<String> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            chip = None;
            continue;
        }
        if trimmed.starts_with("Adapter:") {
            continue;
        }

        if let Some(caps) = temp_regex().captures(trimmed) {
            let celsius = match parse_decimal(caps[2].trim_start_matches('+')) {
                Ok(v) => v,
                // Negative readings come from disconnected probes
                Err(_) => continue,
            };
            let mut high = None;
            let mut critical = None;
            for limit in limit_regex().captures_iter(trimmed) {
                let value = parse_decimal(&limit[2]).ok();
                match &limit[1] {
                    "high" => high = value,
                    _ => critical = value,
                }
            }
            readings.temperatures.push(TemperatureReading {
                chip: chip.clone(),
                label: caps[1].trim().to_string(),
                celsius,
                high,
                critical,
            });
        } else if let Some(caps) = fan_regex().captures(trimmed) {
            if let Ok(rpm) = caps[2].parse() {
                readings.fans.push(FanReading {
                    chip: chip.clone(),
                    label: caps[1].trim().to_string(),
                    rpm,
                });
            }
        } else if !trimmed.contains(':') {
            chip = Some(trimmed.to_string());
        }
    }

    if readings.is_empty() {
        return Err(ParseError::new(
            step_id,
            ParseErrorReason::MissingSection("temperature or fan readings".to_string()),
            output,
        ));
    }

    Ok(readings)
}
