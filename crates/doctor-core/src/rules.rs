//! Rule engine: deterministic finding generation.
//!
//! A rule is a condition over an evidence bundle plus the finding it emits
//! when the condition holds. Rules are pure: each produces zero or one
//! finding, and no rule sees another rule's output.

use crate::error::{DoctorError, Result};
use crate::evidence::{metric, EvidenceBundle, MetricValue};
use crate::executor::Stream;
use crate::transcript::preview;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Characters of step output quoted in a finding's evidence reference
pub const EXCERPT_CHARS: usize = 200;

/// Confidence attached to a finding when the rule does not set one
pub const DEFAULT_CONFIDENCE: f64 = 0.85;

// =============================================================================
// Findings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Critical => "critical",
        }
    }

    /// Sort key: critical first
    pub fn order(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warn => 1,
            Severity::Info => 2,
        }
    }

    /// Weight a supporting finding of this severity adds to a diagnosis
    pub fn support_weight(&self) -> f64 {
        match self {
            Severity::Critical => 1.5,
            Severity::Warn => 1.0,
            Severity::Info => 0.5,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pointer from a finding back to the evidence that triggered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_key: Option<String>,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Id of the rule that emitted this finding
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub explanation: String,
    pub evidence_refs: Vec<EvidenceRef>,
    pub confidence: f64,
}

// =============================================================================
// Expressions
// =============================================================================

/// Expression over the metric map.
///
/// Numeric comparisons treat a missing or non-numeric metric as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuleExpression {
    Gt { lhs: String, rhs: f64 },
    Gte { lhs: String, rhs: f64 },
    Lt { lhs: String, rhs: f64 },
    Lte { lhs: String, rhs: f64 },
    Eq { lhs: String, rhs: MetricValue },
    Neq { lhs: String, rhs: MetricValue },
    And { expressions: Vec<RuleExpression> },
    Or { expressions: Vec<RuleExpression> },
    Exists { path: String },
    Matches { path: String, pattern: String },
}

impl RuleExpression {
    pub fn gt(lhs: &str, rhs: f64) -> Self {
        Self::Gt { lhs: lhs.to_string(), rhs }
    }

    pub fn gte(lhs: &str, rhs: f64) -> Self {
        Self::Gte { lhs: lhs.to_string(), rhs }
    }

    pub fn lt(lhs: &str, rhs: f64) -> Self {
        Self::Lt { lhs: lhs.to_string(), rhs }
    }

    pub fn lte(lhs: &str, rhs: f64) -> Self {
        Self::Lte { lhs: lhs.to_string(), rhs }
    }

    pub fn exists(path: &str) -> Self {
        Self::Exists { path: path.to_string() }
    }

    pub fn matches(path: &str, pattern: &str) -> Self {
        Self::Matches {
            path: path.to_string(),
            pattern: pattern.to_string(),
        }
    }

    pub fn and(expressions: Vec<RuleExpression>) -> Self {
        Self::And { expressions }
    }

    pub fn or(expressions: Vec<RuleExpression>) -> Self {
        Self::Or { expressions }
    }

    pub fn evaluate(&self, metrics: &BTreeMap<String, MetricValue>) -> Result<bool> {
        let num = |key: &str| metrics.get(key).and_then(MetricValue::as_number).unwrap_or(0.0);

        Ok(match self {
            Self::Gt { lhs, rhs } => num(lhs) > *rhs,
            Self::Gte { lhs, rhs } => num(lhs) >= *rhs,
            Self::Lt { lhs, rhs } => num(lhs) < *rhs,
            Self::Lte { lhs, rhs } => num(lhs) <= *rhs,
            Self::Eq { lhs, rhs } => metrics.get(lhs) == Some(rhs),
            Self::Neq { lhs, rhs } => metrics.get(lhs) != Some(rhs),
            Self::And { expressions } => {
                for e in expressions {
                    if !e.evaluate(metrics)? {
                        return Ok(false);
                    }
                }
                true
            }
            Self::Or { expressions } => {
                for e in expressions {
                    if e.evaluate(metrics)? {
                        return Ok(true);
                    }
                }
                false
            }
            Self::Exists { path } => metrics.contains_key(path),
            Self::Matches { path, pattern } => match metrics.get(path).and_then(MetricValue::as_text) {
                Some(value) => compile(pattern)?.is_match(value),
                None => false,
            },
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| DoctorError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Rules
// =============================================================================

pub type RulePredicate = Arc<dyn Fn(&EvidenceBundle) -> bool + Send + Sync>;

/// When a rule fires
#[derive(Clone)]
pub enum RuleCondition {
    /// Expression over derived metrics
    Expression(RuleExpression),
    /// Regex over a step's raw output; `stream: None` tests both streams
    Output {
        step_id: String,
        stream: Option<Stream>,
        pattern: String,
    },
    /// Arbitrary function of the bundle
    Predicate(RulePredicate),
}

impl std::fmt::Debug for RuleCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expression(e) => f.debug_tuple("Expression").field(e).finish(),
            Self::Output { step_id, stream, pattern } => f
                .debug_struct("Output")
                .field("step_id", step_id)
                .field("stream", stream)
                .field("pattern", pattern)
                .finish(),
            Self::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

impl RuleCondition {
    /// One-line description for listings
    pub fn summary(&self) -> String {
        match self {
            Self::Expression(expr) => serde_json::to_string(expr).unwrap_or_else(|_| "expression".to_string()),
            Self::Output { step_id, stream, pattern } => match stream {
                Some(s) => format!("{}.{} =~ /{}/", step_id, s, pattern),
                None => format!("{} =~ /{}/", step_id, pattern),
            },
            Self::Predicate(_) => "custom predicate".to_string(),
        }
    }

    fn holds(&self, evidence: &EvidenceBundle) -> Result<bool> {
        match self {
            Self::Expression(expr) => expr.evaluate(&evidence.metrics),
            Self::Output { step_id, stream, pattern } => {
                let Some(output) = evidence.raw.get(step_id) else {
                    return Ok(false);
                };
                let re = compile(pattern)?;
                Ok(match stream {
                    Some(Stream::Stdout) => re.is_match(&output.stdout),
                    Some(Stream::Stderr) => re.is_match(&output.stderr),
                    None => re.is_match(&output.stdout) || re.is_match(&output.stderr),
                })
            }
            Self::Predicate(f) => Ok(f(evidence)),
        }
    }
}

/// What a rule emits
#[derive(Debug, Clone)]
pub struct FindingTemplate {
    pub severity: Severity,
    pub title: String,
    pub explanation: String,
    pub confidence: f64,
    /// Step whose output is quoted in the evidence reference
    pub step_id: Option<String>,
    /// Metric whose value is quoted in the evidence reference
    pub metric_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub condition: RuleCondition,
    pub emit: FindingTemplate,
}

impl Rule {
    pub fn new(
        id: &str,
        condition: RuleCondition,
        severity: Severity,
        title: &str,
        explanation: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            condition,
            emit: FindingTemplate {
                severity,
                title: title.to_string(),
                explanation: explanation.to_string(),
                confidence: DEFAULT_CONFIDENCE,
                step_id: None,
                metric_key: None,
            },
        }
    }

    /// Rule over a metric expression
    pub fn when(
        id: &str,
        expr: RuleExpression,
        severity: Severity,
        title: &str,
        explanation: &str,
    ) -> Self {
        Self::new(id, RuleCondition::Expression(expr), severity, title, explanation)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.emit.confidence = confidence;
        self
    }

    pub fn with_step(mut self, step_id: &str) -> Self {
        self.emit.step_id = Some(step_id.to_string());
        self
    }

    pub fn with_metric(mut self, metric_key: &str) -> Self {
        self.emit.metric_key = Some(metric_key.to_string());
        self
    }

    /// Evaluate the rule, returning the finding it emits if it fires.
    pub fn evaluate(&self, evidence: &EvidenceBundle) -> Result<Option<Finding>> {
        if !self.condition.holds(evidence)? {
            return Ok(None);
        }

        let mut evidence_refs = Vec::new();
        if let Some(step_id) = &self.emit.step_id {
            if let Some(output) = evidence.raw.get(step_id) {
                evidence_refs.push(EvidenceRef {
                    step_id: Some(step_id.clone()),
                    metric_key: None,
                    excerpt: preview(&output.stdout, EXCERPT_CHARS),
                });
            }
        }
        if let Some(key) = &self.emit.metric_key {
            if let Some(value) = evidence.metrics.get(key) {
                evidence_refs.push(EvidenceRef {
                    step_id: None,
                    metric_key: Some(key.clone()),
                    excerpt: value.to_string(),
                });
            }
        }

        Ok(Some(Finding {
            id: self.id.clone(),
            severity: self.emit.severity,
            title: self.emit.title.clone(),
            explanation: self.emit.explanation.clone(),
            evidence_refs,
            confidence: self.emit.confidence,
        }))
    }
}

/// Run every rule against the bundle.
///
/// A rule that fails to evaluate is skipped. Findings come back
/// stable-sorted by severity, critical first.
pub fn generate_findings(rules: &[Rule], evidence: &EvidenceBundle) -> Vec<Finding> {
    let mut findings: Vec<Finding> = rules
        .iter()
        .filter_map(|rule| match rule.evaluate(evidence) {
            Ok(finding) => finding,
            Err(e) => {
                warn!("Rule {} evaluation failed: {}", rule.id, e);
                None
            }
        })
        .collect();

    findings.sort_by_key(|f| f.severity.order());
    findings
}

// =============================================================================
// Registry
// =============================================================================

/// Read-only collection of rules, keyed by id in insertion order
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Registry preloaded with `common_rules()`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.load_rules(common_rules());
        registry
    }

    /// Add a rule. A rule with an existing id replaces it in place.
    pub fn add_rule(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn load_rules(&mut self, rules: impl IntoIterator<Item = Rule>) {
        for rule in rules {
            self.add_rule(rule);
        }
    }

    pub fn get_rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn all_rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Default rule set
pub fn common_rules() -> Vec<Rule> {
    use RuleExpression as E;

    vec![
        Rule::when(
            "cpu_sustained_overload",
            E::gte(metric::LOAD1, 2.0),
            Severity::Warn,
            "High CPU Load",
            "System load exceeds number of CPU cores, indicating CPU pressure.",
        )
        .with_confidence(0.9)
        .with_metric(metric::LOAD1),
        Rule::when(
            "cpu_critical_overload",
            E::gte(metric::LOAD1, 4.0),
            Severity::Critical,
            "Critical CPU Load",
            "System is severely overloaded. Processes may be starved.",
        )
        .with_confidence(0.95)
        .with_metric(metric::LOAD1),
        Rule::when(
            "mem_high_usage",
            E::gte(metric::MEM_USED_PERCENT, 85.0),
            Severity::Warn,
            "High Memory Usage",
            "Memory usage is above 85%. System may be thrashing.",
        )
        .with_metric(metric::MEM_USED_PERCENT),
        Rule::when(
            "mem_critical",
            E::gte(metric::MEM_USED_PERCENT, 95.0),
            Severity::Critical,
            "Critical Memory",
            "Memory is nearly exhausted. Risk of OOM kills.",
        )
        .with_confidence(0.95)
        .with_metric(metric::MEM_USED_PERCENT),
        Rule::when(
            "swap_pressure",
            E::gte(metric::SWAP_USED_PERCENT, 50.0),
            Severity::Warn,
            "Heavy Swap Usage",
            "More than half of swap is in use. Expect sluggish response.",
        )
        .with_confidence(0.8)
        .with_metric(metric::SWAP_USED_PERCENT),
        Rule::when(
            "disk_near_full",
            E::gte(metric::DISK_USE_PERCENT, 85.0),
            Severity::Warn,
            "Disk Nearly Full",
            "Disk usage above 85%. May cause write failures.",
        )
        .with_confidence(0.9)
        .with_metric(metric::DISK_USE_PERCENT),
        Rule::when(
            "disk_critical",
            E::gte(metric::DISK_USE_PERCENT, 95.0),
            Severity::Critical,
            "Disk Critical",
            "Disk is critically full. Immediate cleanup needed.",
        )
        .with_confidence(0.95)
        .with_metric(metric::DISK_USE_PERCENT),
        Rule::when(
            "thermal_high",
            E::gte(metric::CPU_TEMP, 80.0),
            Severity::Warn,
            "High Temperature",
            "CPU temperature above 80°C. Risk of throttling.",
        )
        .with_metric(metric::CPU_TEMP),
        Rule::when(
            "thermal_critical",
            E::gte(metric::CPU_TEMP, 90.0),
            Severity::Critical,
            "Critical Temperature",
            "CPU temperature above 90°C. Risk of thermal damage.",
        )
        .with_confidence(0.95)
        .with_metric(metric::CPU_TEMP),
        Rule::when(
            "fan_stalled",
            E::and(vec![E::exists(metric::FAN_RPM_MIN), E::lte(metric::FAN_RPM_MIN, 0.0)]),
            Severity::Warn,
            "Fan Not Spinning",
            "A fan reports 0 RPM. It may be blocked, failed or idle.",
        )
        .with_confidence(0.7)
        .with_step("sensors"),
        Rule::when(
            "runaway_process",
            E::gt(metric::TOP_CPU_PERCENT, 100.0),
            Severity::Warn,
            "Runaway Process Detected",
            "A single process using >100% CPU (multi-core).",
        )
        .with_confidence(0.9)
        .with_metric(metric::TOP_CPU_PERCENT)
        .with_step("ps"),
        Rule::new(
            "sensors_unavailable",
            RuleCondition::Output {
                step_id: "sensors".to_string(),
                stream: None,
                pattern: r"(?i)no sensors found|command not found|not in allowlist".to_string(),
            },
            Severity::Info,
            "Temperature Sensors Unavailable",
            "Temperature readings could not be collected. Thermal causes cannot be confirmed.",
        )
        .with_confidence(0.6),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{build_evidence, StepOutput};

    fn bundle_with(metrics: &[(&str, MetricValue)]) -> EvidenceBundle {
        let mut bundle = build_evidence(BTreeMap::new());
        for (k, v) in metrics {
            bundle.metrics.insert(k.to_string(), v.clone());
        }
        bundle
    }

    #[test]
    fn test_expression_missing_metric_is_zero() {
        let metrics = BTreeMap::new();
        assert!(!RuleExpression::gte("load1", 2.0).evaluate(&metrics).unwrap());
        assert!(RuleExpression::lt("load1", 1.0).evaluate(&metrics).unwrap());
        assert!(!RuleExpression::exists("load1").evaluate(&metrics).unwrap());
    }

    #[test]
    fn test_expression_combinators() {
        let bundle = bundle_with(&[("load1", 3.0.into()), ("top_process", "node".into())]);
        let m = &bundle.metrics;
        assert!(RuleExpression::and(vec![
            RuleExpression::gte("load1", 2.0),
            RuleExpression::matches("top_process", "^no"),
        ])
        .evaluate(m)
        .unwrap());
        assert!(RuleExpression::or(vec![
            RuleExpression::gt("load1", 10.0),
            RuleExpression::Eq { lhs: "top_process".into(), rhs: "node".into() },
        ])
        .evaluate(m)
        .unwrap());
        assert!(RuleExpression::Neq { lhs: "top_process".into(), rhs: "java".into() }
            .evaluate(m)
            .unwrap());
        // matches on a numeric metric is false, not an error
        assert!(!RuleExpression::matches("load1", ".*").evaluate(m).unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let bundle = bundle_with(&[("top_process", "node".into())]);
        let result = RuleExpression::matches("top_process", "(").evaluate(&bundle.metrics);
        assert!(matches!(result, Err(DoctorError::InvalidPattern { .. })));
    }

    #[test]
    fn test_expression_serde_shape() {
        let json = serde_json::to_value(RuleExpression::gte("cpu_temp", 80.0)).unwrap();
        assert_eq!(json["op"], "gte");
        assert_eq!(json["lhs"], "cpu_temp");
        let parsed: RuleExpression =
            serde_json::from_str(r#"{"op":"and","expressions":[{"op":"exists","path":"x"}]}"#).unwrap();
        assert_eq!(parsed, RuleExpression::and(vec![RuleExpression::exists("x")]));
    }

    #[test]
    fn test_findings_sorted_by_severity_with_refs() {
        let bundle = bundle_with(&[("load1", 5.0.into())]);
        let findings = generate_findings(&common_rules(), &bundle);
        let ids: Vec<&str> = findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["cpu_critical_overload", "cpu_sustained_overload"]);
        assert_eq!(findings[0].evidence_refs[0].metric_key.as_deref(), Some("load1"));
        assert_eq!(findings[0].evidence_refs[0].excerpt, "5");
        assert_eq!(findings[1].confidence, 0.9);
    }

    #[test]
    fn test_output_condition() {
        let mut raw = BTreeMap::new();
        raw.insert(
            "sensors".to_string(),
            StepOutput {
                stdout: String::new(),
                stderr: "sh: sensors: command not found".to_string(),
                exit_code: Some(127),
            },
        );
        let bundle = build_evidence(raw);
        let findings = generate_findings(&common_rules(), &bundle);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "sensors_unavailable");
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_predicate_rule_and_bad_rule_skipped() {
        let bundle = bundle_with(&[("top_process", "chrome".into())]);
        let rules = vec![
            Rule::new(
                "many_failures",
                RuleCondition::Predicate(Arc::new(|b: &EvidenceBundle| b.text("top_process") == Some("chrome"))),
                Severity::Info,
                "Browser On Top",
                "A browser is the top CPU consumer.",
            ),
            Rule::when("broken", RuleExpression::matches("top_process", "["), Severity::Warn, "x", "y"),
        ];
        let findings = generate_findings(&rules, &bundle);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Browser On Top");
    }

    #[test]
    fn test_registry_replaces_in_place() {
        let mut registry = RuleRegistry::with_defaults();
        let count = registry.len();
        let first_id = registry.all_rules()[0].id.clone();
        registry.add_rule(Rule::when(&first_id, RuleExpression::gte("load1", 8.0), Severity::Critical, "Replaced", "r"));
        assert_eq!(registry.len(), count);
        assert_eq!(registry.all_rules()[0].emit.title, "Replaced");
        assert!(registry.get_rule("disk_critical").is_some());
        assert!(registry.get_rule("nope").is_none());
    }
}
