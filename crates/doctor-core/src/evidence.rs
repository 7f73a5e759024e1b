//! Evidence bundles.
//!
//! A bundle is built once per collection round from the raw per-step
//! outputs and is never mutated afterwards. The before-fix and after-fix
//! bundles of a session are separate instances.

use crate::parsers::{
    fullest_mount, parse_df, parse_free, parse_loadavg, parse_ps, parse_sensors, parse_uptime,
    top_by_cpu, top_by_mem, DiskUsage, LoadAverage, MemoryInfo, ParseError, ProcessInfo,
    SensorReadings, UptimeInfo,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Metric names derived from parsed evidence
pub mod metric {
    pub const LOAD1: &str = "load1";
    pub const LOAD5: &str = "load5";
    pub const LOAD15: &str = "load15";
    pub const MEM_USED_PERCENT: &str = "mem_used_percent";
    pub const SWAP_USED_PERCENT: &str = "swap_used_percent";
    pub const DISK_USE_PERCENT: &str = "disk_use_percent";
    pub const DISK_WORST_MOUNT: &str = "disk_worst_mount";
    pub const CPU_TEMP: &str = "cpu_temp";
    pub const FAN_RPM_MIN: &str = "fan_rpm_min";
    pub const TOP_CPU_PERCENT: &str = "top_cpu_percent";
    pub const TOP_MEM_PERCENT: &str = "top_mem_percent";
    pub const TOP_PROCESS: &str = "top_process";
    pub const TOP_PID: &str = "top_pid";
    pub const PROCESS_COUNT: &str = "process_count";
    pub const FAILED_STEPS: &str = "failed_steps";
}

/// Exit code recorded for soft failures (disallowed, errored, timed out)
pub const SOFT_FAILURE_EXIT_CODE: i32 = -1;

/// Raw result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub stdout: String,
    pub stderr: String,
    /// None when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl StepOutput {
    pub fn soft_failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(SOFT_FAILURE_EXIT_CODE),
        }
    }

    pub fn is_soft_failure(&self) -> bool {
        self.exit_code == Some(SOFT_FAILURE_EXIT_CODE)
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A metric value rules can test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl MetricValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{}", n),
            MetricValue::Text(s) => write!(f, "{}", s),
            MetricValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

/// Typed results of the step parsers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedEvidence {
    pub uptime: Option<UptimeInfo>,
    pub load: Option<LoadAverage>,
    pub processes: Vec<ProcessInfo>,
    pub memory: Option<MemoryInfo>,
    pub disks: Vec<DiskUsage>,
    pub sensors: Option<SensorReadings>,
    pub parse_errors: Vec<ParseError>,
}

/// Evidence from one collection round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub collected_at: DateTime<Utc>,
    pub raw: BTreeMap<String, StepOutput>,
    pub parsed: ParsedEvidence,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl EvidenceBundle {
    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_number)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.metrics.get(name).and_then(MetricValue::as_text)
    }

    pub fn step(&self, step_id: &str) -> Option<&StepOutput> {
        self.raw.get(step_id)
    }
}

/// Build an evidence bundle from raw step outputs.
///
/// Parsers are selected by step id. Steps with empty stdout are not parsed
/// and parse failures are recorded in `parsed.parse_errors`.
pub fn build_evidence(raw: BTreeMap<String, StepOutput>) -> EvidenceBundle {
    let mut parsed = ParsedEvidence::default();

    for (step_id, output) in &raw {
        if output.stdout.trim().is_empty() {
            continue;
        }
        let stdout = output.stdout.as_str();
        let result = match step_id.as_str() {
            "uptime" => parse_uptime(step_id, stdout).map(|u| parsed.uptime = Some(u)),
            "loadavg" => parse_loadavg(step_id, stdout).map(|l| parsed.load = Some(l)),
            "ps" => parse_ps(step_id, stdout).map(|p| parsed.processes = p),
            "free" => parse_free(step_id, stdout).map(|m| parsed.memory = Some(m)),
            "df" => parse_df(step_id, stdout).map(|d| parsed.disks = d),
            "sensors" => parse_sensors(step_id, stdout).map(|s| parsed.sensors = Some(s)),
            _ => Ok(()),
        };
        if let Err(e) = result {
            debug!("Parse failure: {}", e);
            parsed.parse_errors.push(e);
        }
    }

    let mut metrics = derive_metrics(&parsed);
    let failed = raw.values().filter(|o| o.is_soft_failure()).count();
    metrics.insert(metric::FAILED_STEPS.to_string(), MetricValue::Number(failed as f64));

    EvidenceBundle {
        collected_at: Utc::now(),
        raw,
        parsed,
        metrics,
    }
}

fn derive_metrics(parsed: &ParsedEvidence) -> BTreeMap<String, MetricValue> {
    let mut metrics = BTreeMap::new();
    let mut put = |name: &str, value: MetricValue| {
        metrics.insert(name.to_string(), value);
    };

    // /proc/loadavg is more precise than the uptime line
    if let Some(load) = parsed.load.as_ref().or(parsed.uptime.as_ref().map(|u| &u.load)) {
        put(metric::LOAD1, load.one.into());
        put(metric::LOAD5, load.five.into());
        put(metric::LOAD15, load.fifteen.into());
    }

    if let Some(mem) = &parsed.memory {
        put(metric::MEM_USED_PERCENT, mem.used_percent().into());
        if let Some(swap) = mem.swap_used_percent() {
            put(metric::SWAP_USED_PERCENT, swap.into());
        }
    }

    if let Some(disk) = fullest_mount(&parsed.disks) {
        put(metric::DISK_USE_PERCENT, f64::from(disk.percent_used).into());
        put(metric::DISK_WORST_MOUNT, disk.mount.as_str().into());
    }

    if let Some(sensors) = &parsed.sensors {
        if let Some(temp) = sensors.cpu_temp() {
            put(metric::CPU_TEMP, temp.into());
        }
        if let Some(rpm) = sensors.slowest_fan_rpm() {
            put(metric::FAN_RPM_MIN, f64::from(rpm).into());
        }
    }

    if !parsed.processes.is_empty() {
        put(metric::PROCESS_COUNT, (parsed.processes.len() as f64).into());
    }
    if let Some(top) = top_by_cpu(&parsed.processes) {
        put(metric::TOP_CPU_PERCENT, top.cpu_percent.into());
        put(metric::TOP_PROCESS, top.command.as_str().into());
        put(metric::TOP_PID, f64::from(top.pid).into());
    }
    if let Some(top) = top_by_mem(&parsed.processes) {
        put(metric::TOP_MEM_PERCENT, top.mem_percent.into());
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(stdout: &str) -> StepOutput {
        StepOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    fn raw(entries: &[(&str, StepOutput)]) -> BTreeMap<String, StepOutput> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_build_evidence_metrics() {
        let bundle = build_evidence(raw(&[
            ("loadavg", ok("4.20 3.10 2.00 5/900 1234\n")),
            ("free", ok("Mem: 16Gi 15Gi 200Mi 0B 1Gi 1Gi\nSwap: 2Gi 1Gi 1Gi\n")),
            ("df", ok("Filesystem Size Used Avail Use% Mounted on\n/dev/sda1 100G 96G 4G 96% /\n")),
            ("ps", ok("PID PPID %CPU %MEM COMMAND\n4242 1 150.0 3.0 stress\n")),
            ("sensors", ok("coretemp-isa-0000\nPackage id 0: +91.0°C\n")),
        ]));

        assert_eq!(bundle.number(metric::LOAD1), Some(4.2));
        assert_eq!(bundle.number(metric::MEM_USED_PERCENT), Some(93.8));
        assert_eq!(bundle.number(metric::SWAP_USED_PERCENT), Some(50.0));
        assert_eq!(bundle.number(metric::DISK_USE_PERCENT), Some(96.0));
        assert_eq!(bundle.text(metric::DISK_WORST_MOUNT), Some("/"));
        assert_eq!(bundle.number(metric::CPU_TEMP), Some(91.0));
        assert_eq!(bundle.number(metric::TOP_CPU_PERCENT), Some(150.0));
        assert_eq!(bundle.text(metric::TOP_PROCESS), Some("stress"));
        assert_eq!(bundle.number(metric::TOP_PID), Some(4242.0));
        assert_eq!(bundle.number(metric::FAILED_STEPS), Some(0.0));
        assert!(bundle.parsed.parse_errors.is_empty());
    }

    #[test]
    fn test_uptime_fallback_for_load() {
        let bundle = build_evidence(raw(&[(
            "uptime",
            ok("10:00 up 1 day, 3 users, load average: 1.50, 1.00, 0.50\n"),
        )]));
        assert_eq!(bundle.number(metric::LOAD1), Some(1.5));
        assert_eq!(bundle.number(metric::LOAD15), Some(0.5));
    }

    #[test]
    fn test_soft_failures_are_counted_not_parsed() {
        let bundle = build_evidence(raw(&[
            ("sensors", StepOutput::soft_failure("Command not in allowlist")),
            ("df", ok("garbage\n")),
        ]));
        assert_eq!(bundle.number(metric::FAILED_STEPS), Some(1.0));
        assert!(bundle.parsed.sensors.is_none());
        assert_eq!(bundle.parsed.parse_errors.len(), 1);
        assert_eq!(bundle.parsed.parse_errors[0].step_id, "df");
        assert!(bundle.metric(metric::CPU_TEMP).is_none());
    }

    #[test]
    fn test_unknown_steps_are_kept_raw() {
        let bundle = build_evidence(raw(&[("vmstat", ok("procs ---memory---\n"))]));
        assert!(bundle.step("vmstat").is_some());
        assert!(bundle.parsed.parse_errors.is_empty());
    }
}
