//! Built-in catalogs.
//!
//! Base inspection steps, per-playbook diagnosis candidates, per-cause fix
//! options, verification checks and prevention tips. The engine takes all of
//! these as arguments; this module is what the CLI passes in.

use crate::diagnosis::CandidateSpec;
use crate::evidence::{metric, EvidenceBundle};
use crate::fixes::FixSpec;
use crate::plan::ToolStep;
use crate::risk::Risk;
use crate::verify::VerificationCheck;

/// Steps every inspection plan starts with
pub fn base_inspect_steps() -> Vec<ToolStep> {
    vec![
        ToolStep::read("uptime", "uptime", "Load average"),
        ToolStep::read("loadavg", "cat /proc/loadavg", "Load details"),
        ToolStep::read(
            "ps",
            "ps -eo pid,ppid,pcpu,pmem,comm --sort=-pcpu | head -n 20",
            "Top processes",
        ),
        ToolStep::read("free", "free -h", "Memory usage"),
        ToolStep::read("df", "df -h", "Disk usage"),
    ]
}

/// Candidate causes for a playbook. Unknown playbooks get none.
pub fn diagnosis_candidates(playbook: &str) -> Vec<CandidateSpec> {
    match playbook {
        "hot" => vec![
            CandidateSpec::new("cpu_runaway", "Runaway CPU process", &["runaway_process", "High CPU Load"]),
            CandidateSpec::new("thermal_hardware", "Hardware thermal issue", &["High Temperature"]),
            CandidateSpec::new("fan_blocked", "Blocked cooling fan", &["High Temperature", "fan_stalled"]),
        ],
        "slow" => vec![
            CandidateSpec::new("high_memory", "High memory usage", &["High Memory Usage"]),
            CandidateSpec::new("disk_io", "Disk I/O bottleneck", &["High CPU Load"]),
            CandidateSpec::new("cpu_pressure", "CPU pressure", &["High CPU Load"]),
        ],
        "disk" => vec![
            CandidateSpec::new("log_bloat", "Large log files", &["Disk Nearly Full"]),
            CandidateSpec::new("temp_files", "Temporary files accumulation", &["Disk Nearly Full"]),
            CandidateSpec::new("docker_bloat", "Docker data accumulation", &["Disk Nearly Full"]),
        ],
        "memory" => vec![
            CandidateSpec::new(
                "high_memory",
                "High memory usage",
                &["mem_high_usage", "mem_critical", "swap_pressure"],
            ),
            CandidateSpec::new("memory_swap_thrash", "Swap thrashing", &["swap_pressure"])
                .disconfirmed_by(&["mem_critical"]),
        ],
        _ => Vec::new(),
    }
}

/// Remedies for a cause. Process-targeted remedies need `top_pid`.
pub fn fix_options(cause_id: &str, evidence: &EvidenceBundle) -> Vec<FixSpec> {
    let pid = evidence.number(metric::TOP_PID).map(|p| p as u32);
    let process = evidence.text(metric::TOP_PROCESS).unwrap_or("top process");

    match cause_id {
        "cpu_runaway" | "cpu_pressure" => {
            let Some(pid) = pid else {
                return Vec::new();
            };
            vec![
                FixSpec {
                    label: format!("Terminate {} (PID {})", process, pid),
                    why: "Stops the process consuming the most CPU.".to_string(),
                    risk: Risk::HighImpact,
                    commands: vec![format!("kill -15 {}", pid)],
                },
                FixSpec {
                    label: format!("Lower priority of {} (PID {})", process, pid),
                    why: "Keeps the process running but yields CPU to everything else.".to_string(),
                    risk: Risk::SafeWrite,
                    commands: vec![format!("renice -n 10 -p {}", pid)],
                },
                FixSpec {
                    label: format!("Show details for PID {}", pid),
                    why: "Confirms what the process is before acting on it.".to_string(),
                    risk: Risk::Read,
                    commands: vec![format!("ps -o pid,ppid,pcpu,pmem,etime,args -p {}", pid)],
                },
            ]
        }
        "thermal_hardware" | "fan_blocked" => vec![
            FixSpec::new(
                "Switch CPU governor to powersave",
                "Reduces clock speed and heat output until the cooling problem is fixed.",
                Risk::SafeWrite,
                &["cpupower frequency-set -g powersave"],
            ),
            FixSpec::new(
                "Re-read sensors",
                "Confirms the temperature trend after a short pause.",
                Risk::Read,
                &["sensors"],
            ),
        ],
        "high_memory" | "memory_swap_thrash" => {
            let mut specs = vec![FixSpec::new(
                "Drop filesystem caches",
                "Releases page cache so applications get memory back.",
                Risk::HighImpact,
                &["sync", "sysctl -w vm.drop_caches=3"],
            )];
            if let Some(pid) = pid {
                specs.push(FixSpec {
                    label: format!("Lower priority of {} (PID {})", process, pid),
                    why: "Reduces contention from the busiest process.".to_string(),
                    risk: Risk::SafeWrite,
                    commands: vec![format!("renice -n 10 -p {}", pid)],
                });
            }
            specs
        }
        "disk_io" => vec![FixSpec::new(
            "Sample I/O wait",
            "Shows whether processes are blocked on disk.",
            Risk::Read,
            &["vmstat 1 5"],
        )],
        "log_bloat" => vec![
            FixSpec::new(
                "Vacuum the systemd journal",
                "Shrinks archived journal files to 200 MB.",
                Risk::SafeWrite,
                &["journalctl --vacuum-size=200M"],
            ),
            FixSpec::new(
                "Measure journal size",
                "Shows how much space logs occupy.",
                Risk::Read,
                &["journalctl --disk-usage"],
            ),
        ],
        "temp_files" => vec![FixSpec::new(
            "Delete week-old temporary files",
            "Removes files under /tmp not accessed in 7 days.",
            Risk::HighImpact,
            &["find /tmp -type f -atime +7 -delete"],
        )],
        "docker_bloat" => vec![
            FixSpec::new(
                "Prune unused Docker data",
                "Removes stopped containers, dangling images and build cache.",
                Risk::HighImpact,
                &["docker system prune -f"],
            ),
            FixSpec::new(
                "Show Docker disk usage",
                "Breaks down space used by images, containers and volumes.",
                Risk::Read,
                &["docker system df"],
            ),
        ],
        _ => Vec::new(),
    }
}

/// Post-fix checks for a cause
pub fn verification_checks(cause_id: &str) -> Vec<VerificationCheck> {
    match cause_id {
        "cpu_runaway" | "cpu_pressure" | "disk_io" => vec![
            VerificationCheck::metric_dropped("Load decreased", metric::LOAD1),
            VerificationCheck::metric_dropped("Top process CPU decreased", metric::TOP_CPU_PERCENT),
        ],
        "thermal_hardware" | "fan_blocked" => vec![VerificationCheck::metric_dropped(
            "Temperature decreased",
            metric::CPU_TEMP,
        )],
        "high_memory" | "memory_swap_thrash" => vec![VerificationCheck::metric_dropped(
            "Memory usage decreased",
            metric::MEM_USED_PERCENT,
        )],
        "log_bloat" | "temp_files" | "docker_bloat" => vec![VerificationCheck::metric_dropped(
            "Disk usage decreased",
            metric::DISK_USE_PERCENT,
        )],
        _ => vec![VerificationCheck::new("No new failed steps", |before, after| {
            after.number(metric::FAILED_STEPS).unwrap_or(0.0) <= before.number(metric::FAILED_STEPS).unwrap_or(0.0)
        })],
    }
}

/// Cause-id fragment → tips
pub const PREVENTION_TIPS: &[(&str, &[&str])] = &[
    (
        "disk",
        &["Monitor disk usage weekly", "Set up automated cleanup for temporary files"],
    ),
    (
        "memory",
        &["Monitor memory usage with alerts", "Consider adding RAM if consistently high"],
    ),
    (
        "thermal",
        &["Clean dust from vents regularly", "Ensure proper ventilation"],
    ),
];

/// Tips for every key contained in the cause id, in table order
pub fn prevention_tips(cause_id: &str) -> Vec<String> {
    PREVENTION_TIPS
        .iter()
        .filter(|(key, _)| cause_id.contains(key))
        .flat_map(|(_, tips)| tips.iter().map(|t| t.to_string()))
        .collect()
}
