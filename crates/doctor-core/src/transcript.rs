//! Session transcript.
//!
//! Append-only, time-ordered audit log of one diagnostic session. Every
//! event is one variant per pipeline activity; export renders the log as
//! JSON or as a plain text report.

use crate::diagnosis::DiagnosisBundle;
use crate::error::{DoctorError, Result};
use crate::executor::Stream;
use crate::report::OutcomeCard;
use crate::risk::Risk;
use crate::rules::Finding;
use crate::verify::VerificationResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Width of the rule under the text report title
const TEXT_RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

impl SessionMetadata {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEventKind {
    Intent {
        text: String,
    },
    Exec {
        step_id: String,
        command: String,
        risk: Risk,
    },
    Output {
        step_id: String,
        stream: Stream,
        data: String,
    },
    Finding {
        finding: Finding,
    },
    Diagnosis {
        diagnosis: DiagnosisBundle,
    },
    Approval {
        step_id: String,
        approved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        typed: Option<String>,
    },
    Verification {
        verification: VerificationResult,
    },
    Summary {
        summary: OutcomeCard,
    },
}

impl TranscriptEventKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Intent { .. } => "intent",
            Self::Exec { .. } => "exec",
            Self::Output { .. } => "output",
            Self::Finding { .. } => "finding",
            Self::Diagnosis { .. } => "diagnosis",
            Self::Approval { .. } => "approval",
            Self::Verification { .. } => "verification",
            Self::Summary { .. } => "summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TranscriptEventKind,
}

impl TranscriptEvent {
    pub fn now(kind: TranscriptEventKind) -> Self {
        Self { ts: Utc::now(), kind }
    }

    pub fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    events: Vec<TranscriptEvent>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: TranscriptEventKind) {
        self.events.push(TranscriptEvent::now(kind));
    }

    pub fn events(&self) -> &[TranscriptEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event type tags in append order
    pub fn types(&self) -> Vec<&'static str> {
        self.events.iter().map(TranscriptEvent::type_tag).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

impl FromStr for ExportFormat {
    type Err = DoctorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            _ => Err(DoctorError::UnknownFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Text => write!(f, "text"),
        }
    }
}

#[derive(Serialize)]
struct TranscriptExport<'a> {
    session: &'a SessionMetadata,
    transcript: &'a [TranscriptEvent],
}

/// Parsed form of a JSON export
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptDocument {
    pub session: SessionMetadata,
    pub transcript: Vec<TranscriptEvent>,
}

impl TranscriptDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub fn export(session: &SessionMetadata, events: &[TranscriptEvent], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&TranscriptExport {
            session,
            transcript: events,
        })?),
        ExportFormat::Text => export_text(session, events),
    }
}

fn export_text(session: &SessionMetadata, events: &[TranscriptEvent]) -> Result<String> {
    let mut text = String::from("System Doctor Report\n");
    text.push_str(&"=".repeat(TEXT_RULE_WIDTH));
    text.push('\n');
    text.push_str(&format!("Session: {}\n", session.session_id));
    text.push_str(&format!("Started: {}\n\n", rfc3339(&session.started_at)));

    for event in events {
        text.push_str(&format!(
            "\n[{}] {}\n",
            event.type_tag().to_uppercase(),
            rfc3339(&event.ts)
        ));
        text.push_str(&serde_json::to_string_pretty(event)?);
        text.push('\n');
    }

    Ok(text)
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// First `max_chars` characters of `text`
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SessionMetadata, Transcript) {
        let mut t = Transcript::new();
        t.push(TranscriptEventKind::Intent { text: "disk is full".to_string() });
        t.push(TranscriptEventKind::Exec {
            step_id: "df".to_string(),
            command: "df -h".to_string(),
            risk: Risk::Read,
        });
        t.push(TranscriptEventKind::Output {
            step_id: "df".to_string(),
            stream: Stream::Stdout,
            data: "Filesystem Size".to_string(),
        });
        t.push(TranscriptEventKind::Approval {
            step_id: "fix_0_s0".to_string(),
            approved: false,
            typed: None,
        });
        (SessionMetadata::new(), t)
    }

    #[test]
    fn test_event_wire_shape() {
        let (_, t) = sample();
        let json = serde_json::to_value(&t.events()[1]).unwrap();
        assert_eq!(json["type"], "exec");
        assert_eq!(json["step_id"], "df");
        assert_eq!(json["risk"], "read");
        assert!(json["ts"].is_string());

        let approval = serde_json::to_value(&t.events()[3]).unwrap();
        assert!(approval.get("typed").is_none());
    }

    #[test]
    fn test_json_export_parses_back() {
        let (session, t) = sample();
        let out = export(&session, t.events(), ExportFormat::Json).unwrap();
        let doc = TranscriptDocument::from_json(&out).unwrap();
        assert_eq!(doc.session, session);
        assert_eq!(doc.transcript.len(), t.len());
        let types: Vec<&str> = doc.transcript.iter().map(|e| e.type_tag()).collect();
        assert_eq!(types, t.types());
    }

    #[test]
    fn test_text_export_layout() {
        let (session, t) = sample();
        let out = export(&session, t.events(), ExportFormat::Text).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "System Doctor Report");
        assert_eq!(lines[1], "=".repeat(50));
        assert_eq!(lines[2], format!("Session: {}", session.session_id));
        assert!(lines[3].starts_with("Started: "));
        assert!(out.contains("\n[INTENT] "));
        assert!(out.contains("\n[APPROVAL] "));
        let exec_at = out.find("[EXEC]").unwrap();
        let output_at = out.find("[OUTPUT]").unwrap();
        assert!(exec_at < output_at);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("text".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!(matches!("xml".parse::<ExportFormat>(), Err(DoctorError::UnknownFormat(_))));
    }

    #[test]
    fn test_preview_counts_chars() {
        assert_eq!(preview("°C°C°C", 3), "°C°");
        assert_eq!(preview("ab", 10), "ab");
    }
}
