//! Text rendering for terminal output.
//!
//! Every function returns the block as a string; callers decide where it goes.
//! Section headers follow the bracketed `[SECTION]` style.

use doctor_core::{
    DiagnosisBundle, Finding, FixOption, OutcomeCard, OutcomeStatus, Risk, Rule, Severity, Stream, TriageResult,
};
use owo_colors::OwoColorize;

fn risk_tag(risk: Risk) -> String {
    match risk {
        Risk::Read => risk.indicator().bright_green().to_string(),
        Risk::SafeWrite => risk.indicator().yellow().to_string(),
        Risk::HighImpact => risk.indicator().bright_red().to_string(),
    }
}

fn severity_tag(severity: Severity) -> String {
    let label = format!("{:<8}", severity.as_str());
    match severity {
        Severity::Critical => label.bright_red().bold().to_string(),
        Severity::Warn => label.yellow().to_string(),
        Severity::Info => label.cyan().to_string(),
    }
}

fn confirmation_hint(risk: Risk) -> &'static str {
    match risk {
        Risk::HighImpact => "(needs --yes --confirm-text YES)",
        _ => "(needs --yes)",
    }
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

pub fn triage(result: &TriageResult) -> String {
    let mut lines = vec![
        "[TRIAGE]".bold().to_string(),
        format!("  Playbook: {}", result.matched_playbook.cyan()),
    ];
    if result.symptom_keywords.is_empty() {
        lines.push(format!("  Keywords: {}", "none".dimmed()));
    } else {
        lines.push(format!("  Keywords: {}", result.symptom_keywords.join(", ")));
    }
    lines.push(String::new());
    lines.push("[PLAN]".bold().to_string());
    for step in &result.suggested_steps {
        lines.push(format!(
            "  {} {:<10} {}",
            risk_tag(step.risk),
            step.id,
            step.command.dimmed()
        ));
    }
    lines.join("\n")
}

pub fn findings(findings: &[Finding]) -> String {
    let mut lines = vec!["[FINDINGS]".bold().to_string()];
    if findings.is_empty() {
        lines.push(format!("  {}", "Nothing abnormal in the collected evidence".bright_green()));
        return lines.join("\n");
    }
    for finding in findings {
        lines.push(format!(
            "  {} {} {}",
            severity_tag(finding.severity),
            finding.title,
            format!("({})", percent(finding.confidence)).dimmed()
        ));
        lines.push(format!("           {}", finding.explanation));
        for evidence in &finding.evidence_refs {
            let source = evidence
                .step_id
                .as_deref()
                .or(evidence.metric_key.as_deref())
                .unwrap_or("evidence");
            lines.push(format!(
                "           {} {}",
                format!("{}:", source).dimmed(),
                evidence.excerpt.replace('\n', " ").dimmed()
            ));
        }
    }
    lines.join("\n")
}

pub fn diagnosis(diagnosis: &DiagnosisBundle) -> String {
    let primary = &diagnosis.primary;
    let mut lines = vec![
        "[DIAGNOSIS]".bold().to_string(),
        format!(
            "  Most likely: {} {}",
            primary.label.bright_white().bold(),
            format!("(score {:.2})", primary.score).dimmed()
        ),
    ];
    if !primary.supporting_findings.is_empty() {
        lines.push(format!("  Supported by: {}", primary.supporting_findings.join(", ")));
    }
    if !primary.disconfirming_findings.is_empty() {
        lines.push(format!(
            "  Argues against: {}",
            primary.disconfirming_findings.join(", ").yellow()
        ));
    }
    if !diagnosis.differential.is_empty() {
        lines.push("  Also considered:".to_string());
        for candidate in &diagnosis.differential {
            lines.push(format!(
                "    - {} {}",
                candidate.label,
                format!("(score {:.2})", candidate.score).dimmed()
            ));
        }
    }
    lines.push(String::new());
    lines.push("[NOTE]".bold().to_string());
    lines.push(format!("  {}", diagnosis.notes));
    lines.join("\n")
}

pub fn fix_menu(options: &[FixOption]) -> String {
    let mut lines = vec!["[FIXES]".bold().to_string()];
    if options.is_empty() {
        lines.push(format!("  {}", "No fixes available for this diagnosis".dimmed()));
        return lines.join("\n");
    }
    for (i, option) in options.iter().enumerate() {
        let mut header = format!("  {}. {} {}", i + 1, risk_tag(option.risk), option.label.bold());
        if option.risk.requires_confirmation() {
            header.push(' ');
            header.push_str(&confirmation_hint(option.risk).dimmed().to_string());
        }
        lines.push(header);
        lines.push(format!("       {}", option.why));
        for step in &option.plan.steps {
            lines.push(format!("       $ {}", step.command.cyan()));
        }
    }
    lines.push(String::new());
    lines.push(
        "  Apply one with --fix N. Write steps need --yes; [!] steps also need --confirm-text YES."
            .dimmed()
            .to_string(),
    );
    lines.join("\n")
}

pub fn outcome(card: &OutcomeCard) -> String {
    let status = match card.status {
        OutcomeStatus::Resolved => card.status.as_str().bright_green().bold().to_string(),
        OutcomeStatus::Improved => card.status.as_str().yellow().bold().to_string(),
        OutcomeStatus::Unchanged => card.status.as_str().dimmed().to_string(),
        OutcomeStatus::Failed => card.status.as_str().bright_red().bold().to_string(),
    };
    let mut lines = vec![
        "[OUTCOME]".bold().to_string(),
        format!(
            "  Status: {} {}",
            status,
            format!("(confidence {})", percent(card.confidence)).dimmed()
        ),
        format!("  Root cause: {}", card.root_cause),
    ];
    if !card.actions_taken.is_empty() {
        lines.push("  Actions:".to_string());
        for action in &card.actions_taken {
            lines.push(format!("    {} {}", risk_tag(action.risk), action.label));
        }
    }
    if !card.results.is_empty() {
        lines.push("  Checks:".to_string());
        for result in &card.results {
            lines.push(format!("    - {}", result));
        }
    }
    if !card.prevention_tips.is_empty() {
        lines.push("  Prevention:".to_string());
        for tip in &card.prevention_tips {
            lines.push(format!("    * {}", tip));
        }
    }
    lines.join("\n")
}

pub fn rules(rules: &[Rule]) -> String {
    let mut lines = vec![format!("[RULES] {}", format!("({})", rules.len()).dimmed())];
    for rule in rules {
        lines.push(format!(
            "  {} {:<24} {}",
            severity_tag(rule.emit.severity),
            rule.id,
            rule.emit.title
        ));
        lines.push(format!("           {}", rule.condition.summary().dimmed()));
    }
    lines.join("\n")
}

/// Live output of a fix step
pub fn stream_chunk(chunk: &str, stream: Stream) {
    match stream {
        Stream::Stdout => print!("{}", chunk),
        Stream::Stderr => eprint!("{}", chunk.dimmed()),
    }
}

pub fn error(message: &str) -> String {
    format!("{} {}", "[ERROR]".bright_red().bold(), message.red())
}
