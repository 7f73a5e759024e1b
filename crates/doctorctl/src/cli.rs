//! Argument definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use doctor_core::ExportFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "doctorctl")]
#[command(about = "System Doctor - inspect, diagnose and fix this machine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: user config, then /etc/doctor/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which playbook a complaint maps to
    Triage {
        #[arg(required = true, num_args = 1..)]
        intent: Vec<String>,
    },

    /// Inspect, diagnose and optionally apply a fix
    Diagnose(DiagnoseArgs),

    /// List the built-in rules
    Rules,

    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    /// What is wrong, in your own words
    #[arg(required = true, num_args = 1..)]
    pub intent: Vec<String>,

    /// Apply the N-th fix from the menu (1-based)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(usize))]
    pub fix: Option<usize>,

    /// Confirm write steps
    #[arg(long)]
    pub yes: bool,

    /// Confirmation text for high-impact steps (must be YES)
    #[arg(long, value_name = "TEXT")]
    pub confirm_text: Option<String>,

    /// Transcript export format
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,

    /// Write the session transcript to this file
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

impl DiagnoseArgs {
    pub fn intent_text(&self) -> String {
        self.intent.join(" ")
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => ExportFormat::Text,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnose_defaults() {
        let cli = Cli::try_parse_from(["doctorctl", "diagnose", "my", "laptop", "is", "hot"]).unwrap();
        assert!(!cli.json);
        match cli.command {
            Commands::Diagnose(args) => {
                assert_eq!(args.intent_text(), "my laptop is hot");
                assert_eq!(args.fix, None);
                assert!(!args.yes);
                assert_eq!(args.format, FormatArg::Text);
                assert!(args.export.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_diagnose_with_fix() {
        let cli = Cli::try_parse_from([
            "doctorctl",
            "diagnose",
            "disk full",
            "--fix",
            "2",
            "--yes",
            "--confirm-text",
            "YES",
            "--format",
            "json",
            "--export",
            "/tmp/session.json",
        ])
        .unwrap();
        let Commands::Diagnose(args) = cli.command else {
            panic!("expected diagnose");
        };
        assert_eq!(args.fix, Some(2));
        assert!(args.yes);
        assert_eq!(args.confirm_text.as_deref(), Some("YES"));
        assert_eq!(ExportFormat::from(args.format), ExportFormat::Json);
        assert_eq!(args.export, Some(PathBuf::from("/tmp/session.json")));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["doctorctl", "rules", "--json", "--config", "/etc/doctor.toml"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/doctor.toml")));
        assert!(matches!(cli.command, Commands::Rules));
    }

    #[test]
    fn test_rejects_missing_intent_and_bad_format() {
        assert!(Cli::try_parse_from(["doctorctl", "diagnose"]).is_err());
        assert!(Cli::try_parse_from(["doctorctl", "triage"]).is_err());
        assert!(Cli::try_parse_from(["doctorctl", "diagnose", "slow", "--format", "xml"]).is_err());
        assert!(Cli::try_parse_from(["doctorctl", "diagnose", "slow", "--fix", "two"]).is_err());
    }
}
