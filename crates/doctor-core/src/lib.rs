//! Doctor Core - Staged system diagnosis and remediation
//!
//! Turns a free-text complaint about a machine into read-only inspection,
//! rule-derived findings, a ranked diagnosis, gated fixes, before/after
//! verification and an outcome report, all recorded in a session transcript.

pub mod catalog;
pub mod config;
pub mod diagnosis;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod executor;
pub mod fixes;
pub mod gate;
pub mod normalizer;
pub mod parsers;
pub mod plan;
pub mod report;
pub mod risk;
pub mod rules;
pub mod stage;
pub mod transcript;
pub mod triage;
pub mod verify;

pub use config::{DoctorConfig, Platform};
pub use diagnosis::{CandidateSpec, DiagnosisBundle, DiagnosisCandidate};
pub use engine::{actions_for, ExecuteOptions, SystemDoctorEngine, NOT_ALLOWED_MESSAGE};
pub use error::{DoctorError, Result};
pub use evidence::{build_evidence, metric, EvidenceBundle, MetricValue, StepOutput};
pub use executor::{CommandExecutor, ScriptedExecutor, ShellExecutor, Stream, StreamCallback};
pub use fixes::{FixOption, FixSpec};
pub use gate::{gate, CONFIRMATION_PHRASE};
pub use normalizer::{normalize_command, Allowlist, NormalizedCommand};
pub use plan::{build_inspect_plan, AgentPlan, PlanStage, ToolStep};
pub use report::{ActionTaken, OutcomeCard, OutcomeStatus};
pub use risk::{classify_risk, Risk};
pub use rules::{Finding, Rule, RuleCondition, RuleExpression, RuleRegistry, Severity};
pub use stage::Stage;
pub use transcript::{ExportFormat, SessionMetadata, TranscriptDocument, TranscriptEvent, TranscriptEventKind};
pub use triage::{triage, TriageResult};
pub use verify::{CheckResult, VerificationCheck, VerificationResult};
