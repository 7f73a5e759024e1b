//! System doctor engine.
//!
//! One engine owns one session: Intake → Triage → Plan → Collect →
//! Interpret → Diagnose → Recommend → Gate → Execute → Verify → Report.
//! Every stage takes the previous stage's output as an argument; the only
//! state the engine keeps is the transcript and the stage tracker.

use crate::config::DoctorConfig;
use crate::diagnosis::{build_diagnosis, CandidateSpec, DiagnosisBundle};
use crate::error::{DoctorError, Result};
use crate::evidence::{build_evidence, EvidenceBundle, StepOutput};
use crate::executor::{CommandExecutor, Stream, StreamCallback};
use crate::fixes::{build_fix_options, FixOption, FixSpec};
use crate::gate::gate;
use crate::normalizer::{normalize_command, Allowlist};
use crate::plan::{inspect_plan_from_triage, AgentPlan, ToolStep};
use crate::report::{build_outcome, ActionTaken, OutcomeCard};
use crate::rules::{generate_findings, Finding, Rule, RuleRegistry};
use crate::stage::{Stage, StageTracker};
use crate::transcript::{
    self, preview, ExportFormat, SessionMetadata, Transcript, TranscriptEvent, TranscriptEventKind,
};
use crate::triage::{triage, TriageResult};
use crate::verify::{run_checks, VerificationCheck, VerificationResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stderr recorded for a step the allowlist rejected
pub const NOT_ALLOWED_MESSAGE: &str = "Command not in allowlist";

/// Options for `execute_fix`
#[derive(Default, Clone, Copy)]
pub struct ExecuteOptions<'a> {
    pub confirmed: bool,
    pub confirmation_text: Option<&'a str>,
    pub stream: Option<&'a StreamCallback>,
}

impl<'a> ExecuteOptions<'a> {
    pub fn confirmed(confirmation_text: Option<&'a str>) -> Self {
        Self {
            confirmed: true,
            confirmation_text,
            stream: None,
        }
    }

    pub fn with_stream(mut self, stream: &'a StreamCallback) -> Self {
        self.stream = Some(stream);
        self
    }
}

pub struct SystemDoctorEngine {
    config: DoctorConfig,
    allowlist: Allowlist,
    registry: Arc<RuleRegistry>,
    executor: Arc<dyn CommandExecutor>,
    session: SessionMetadata,
    transcript: Transcript,
    tracker: StageTracker,
}

impl SystemDoctorEngine {
    /// New session with the default rule registry.
    ///
    /// Fails only if the configured allowlist contains an invalid regex.
    pub fn new(config: DoctorConfig, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        Self::with_registry(config, executor, Arc::new(RuleRegistry::with_defaults()))
    }

    pub fn with_registry(
        config: DoctorConfig,
        executor: Arc<dyn CommandExecutor>,
        registry: Arc<RuleRegistry>,
    ) -> Result<Self> {
        let allowlist = config.compile_allowlist()?;
        let session = SessionMetadata::new();
        info!("Starting doctor session {}", session.session_id);

        Ok(Self {
            config,
            allowlist,
            registry,
            executor,
            session,
            transcript: Transcript::new(),
            tracker: StageTracker::new(),
        })
    }

    pub fn session(&self) -> &SessionMetadata {
        &self.session
    }

    pub fn config(&self) -> &DoctorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Furthest stage reached so far
    pub fn stage(&self) -> Option<Stage> {
        self.tracker.current()
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Record the user's complaint.
    pub fn intake(&mut self, intent: &str) {
        self.tracker.enter(Stage::Intake);
        self.transcript.push(TranscriptEventKind::Intent {
            text: intent.to_string(),
        });
    }

    pub fn triage(&mut self, intent: &str) -> TriageResult {
        self.tracker.enter(Stage::Triage);
        let result = triage(intent);
        info!(
            "Triage matched playbook '{}' ({} steps)",
            result.matched_playbook,
            result.suggested_steps.len()
        );
        result
    }

    pub fn build_inspect_plan(&mut self, intent: &str, playbook_id: Option<&str>) -> AgentPlan {
        let triaged = self.triage(intent);
        self.tracker.enter(Stage::Plan);
        inspect_plan_from_triage(intent, playbook_id, triaged)
    }

    /// Run inspection steps in order and build an evidence bundle.
    ///
    /// Disallowed or failing steps are recorded as soft failures; nothing
    /// here returns an error.
    pub async fn collect_evidence(
        &mut self,
        steps: &[ToolStep],
        stream: Option<&StreamCallback>,
    ) -> EvidenceBundle {
        let stage = self.tracker.collect_stage();
        self.tracker.enter(stage);
        info!("Collecting evidence: {} steps ({})", steps.len(), stage);

        let mut raw = BTreeMap::new();
        for step in steps {
            let output = self.run_inspect_step(step, stream).await;
            self.transcript.push(TranscriptEventKind::Exec {
                step_id: step.id.clone(),
                command: step.command.clone(),
                risk: step.risk,
            });
            self.transcript.push(TranscriptEventKind::Output {
                step_id: step.id.clone(),
                stream: Stream::Stdout,
                data: preview(&output.stdout, self.config.output_preview_chars),
            });
            raw.insert(step.id.clone(), output);
        }

        build_evidence(raw)
    }

    async fn run_inspect_step(&self, step: &ToolStep, stream: Option<&StreamCallback>) -> StepOutput {
        if !self.allowlist.is_allowed(&step.command) {
            warn!("Step {} not in allowlist: {}", step.id, step.command);
            return StepOutput::soft_failure(NOT_ALLOWED_MESSAGE);
        }

        let normalized = normalize_command(&step.command).normalized;
        let timeout = self.config.timeout_for(step.risk);
        debug!("Step {}: {} (timeout {:?})", step.id, normalized, timeout);

        match self.executor.execute(&normalized, timeout, stream).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Step {} failed: {}", step.id, e);
                StepOutput::soft_failure(e.to_string())
            }
        }
    }

    /// Run rules against the evidence. `None` runs the whole registry.
    pub fn interpret(&mut self, evidence: &EvidenceBundle, rules: Option<&[Rule]>) -> Vec<Finding> {
        self.tracker.enter(Stage::Interpret);
        let registry = Arc::clone(&self.registry);
        let rules = rules.unwrap_or_else(|| registry.all_rules());

        let findings = generate_findings(rules, evidence);
        info!("Interpret: {} rules, {} findings", rules.len(), findings.len());
        for finding in &findings {
            self.transcript.push(TranscriptEventKind::Finding {
                finding: finding.clone(),
            });
        }
        findings
    }

    pub fn diagnose(&mut self, findings: &[Finding], candidates: &[CandidateSpec]) -> DiagnosisBundle {
        self.tracker.enter(Stage::Diagnose);
        let diagnosis = build_diagnosis(findings, candidates);
        info!(
            "Diagnosis: {} (score {:.2}, {} alternatives)",
            diagnosis.primary.cause_id,
            diagnosis.primary.score,
            diagnosis.differential.len()
        );
        self.transcript.push(TranscriptEventKind::Diagnosis {
            diagnosis: diagnosis.clone(),
        });
        diagnosis
    }

    pub fn recommend(&mut self, diagnosis: &DiagnosisBundle, fixes: &[FixSpec]) -> Vec<FixOption> {
        self.tracker.enter(Stage::Recommend);
        build_fix_options(diagnosis, fixes)
    }

    /// Authorization decision for one step. No transcript event.
    pub fn gate(&mut self, step: &ToolStep, confirmed: bool, confirmation_text: Option<&str>) -> bool {
        self.tracker.enter(Stage::Gate);
        gate(step, confirmed, confirmation_text)
    }

    /// Execute a fix plan step by step.
    ///
    /// A gate denial records `approval{approved:false}` and aborts the rest
    /// of the plan with `GateDenied`. A failing command is recorded with
    /// exit code -1 and the next step still runs.
    pub async fn execute_fix(
        &mut self,
        plan: &AgentPlan,
        options: ExecuteOptions<'_>,
    ) -> Result<BTreeMap<String, StepOutput>> {
        info!(
            "Executing fix plan {} ({} steps, max risk {})",
            plan.id,
            plan.steps.len(),
            plan.max_risk()
        );
        let mut results = BTreeMap::new();

        // Gate and Execute alternate per step; the tracker only records the furthest.
        for step in &plan.steps {
            self.tracker.advance_to(Stage::Gate);
            if !gate(step, options.confirmed, options.confirmation_text) {
                warn!("Gate denied step {} ({})", step.id, step.risk);
                self.transcript.push(TranscriptEventKind::Approval {
                    step_id: step.id.clone(),
                    approved: false,
                    typed: None,
                });
                return Err(DoctorError::GateDenied {
                    step_id: step.id.clone(),
                    risk: step.risk,
                });
            }

            self.transcript.push(TranscriptEventKind::Approval {
                step_id: step.id.clone(),
                approved: true,
                typed: options.confirmation_text.map(str::to_string),
            });

            self.tracker.advance_to(Stage::Execute);
            let output = match self
                .executor
                .execute(&step.command, self.config.write_timeout(), options.stream)
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    warn!("Fix step {} failed: {}", step.id, e);
                    StepOutput::soft_failure(e.to_string())
                }
            };

            self.transcript.push(TranscriptEventKind::Exec {
                step_id: step.id.clone(),
                command: step.command.clone(),
                risk: step.risk,
            });
            results.insert(step.id.clone(), output);
        }

        Ok(results)
    }

    pub fn verify(
        &mut self,
        before: &EvidenceBundle,
        after: &EvidenceBundle,
        checks: &[VerificationCheck],
    ) -> VerificationResult {
        self.tracker.enter(Stage::Verify);
        let result = run_checks(before, after, checks);
        info!(
            "Verification {}: {}/{} checks passed",
            if result.ok { "passed" } else { "failed" },
            result.checks.iter().filter(|c| c.ok).count(),
            result.checks.len()
        );
        self.transcript.push(TranscriptEventKind::Verification {
            verification: result.clone(),
        });
        result
    }

    pub fn report(
        &mut self,
        diagnosis: &DiagnosisBundle,
        verification: &VerificationResult,
        actions: &[ActionTaken],
    ) -> OutcomeCard {
        self.tracker.enter(Stage::Report);
        let outcome = build_outcome(diagnosis, verification, actions);
        info!("Outcome: {} (confidence {:.2})", outcome.status, outcome.confidence);
        self.transcript.push(TranscriptEventKind::Summary {
            summary: outcome.clone(),
        });
        outcome
    }

    // =========================================================================
    // Transcript
    // =========================================================================

    /// Snapshot of every event so far
    pub fn transcript(&self) -> Vec<TranscriptEvent> {
        self.transcript.events().to_vec()
    }

    pub fn export_transcript(&self, format: ExportFormat) -> Result<String> {
        transcript::export(&self.session, self.transcript.events(), format)
    }
}

impl From<&FixOption> for ActionTaken {
    fn from(option: &FixOption) -> Self {
        ActionTaken {
            label: option.label.clone(),
            risk: option.risk,
        }
    }
}

/// Actions for the steps of a plan that actually ran
pub fn actions_for(option: &FixOption, results: &BTreeMap<String, StepOutput>) -> Vec<ActionTaken> {
    option
        .plan
        .steps
        .iter()
        .filter(|s| results.get(&s.id).is_some_and(|r| !r.is_soft_failure()))
        .map(|s| ActionTaken {
            label: s.command.clone(),
            risk: s.risk,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptedExecutor;
    use crate::plan::PlanStage;
    use crate::risk::Risk;

    #[tokio::test]
    async fn test_multi_step_fix_moves_forward_only() {
        let exec = Arc::new(ScriptedExecutor::new().respond("sync", "").respond("sysctl -w vm.drop_caches=3", ""));
        let mut engine = SystemDoctorEngine::new(DoctorConfig::default(), exec).unwrap();
        let plan = AgentPlan {
            id: "fix_0".to_string(),
            intent: "memory".to_string(),
            playbook_id: "memory".to_string(),
            stage: PlanStage::Fix,
            reasoning: "drop caches".to_string(),
            steps: vec![
                ToolStep::terminal("fix_0_s0", "sync", Risk::SafeWrite, "flush"),
                ToolStep::terminal("fix_0_s1", "sysctl -w vm.drop_caches=3", Risk::SafeWrite, "drop caches"),
            ],
        };

        let results = engine.execute_fix(&plan, ExecuteOptions::confirmed(None)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(engine.stage(), Some(Stage::Execute));
        assert_eq!(engine.tracker.refused(), 0);

        // a second fix in the same session is not a rewind either
        engine.execute_fix(&plan, ExecuteOptions::confirmed(None)).await.unwrap();
        assert_eq!(engine.tracker.refused(), 0);
    }
}
