use clap::CommandFactory;
use doctor_core::{ActionTaken, OutcomeCard, OutcomeStatus, Risk};
use doctorctl::cli::{Cli, Commands};
use doctorctl::render;

#[test]
fn test_command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn test_triage_joins_words() {
    let cli = <Cli as clap::Parser>::try_parse_from(["doctorctl", "triage", "computer", "is", "slow"]).unwrap();
    match cli.command {
        Commands::Triage { intent } => assert_eq!(intent.join(" "), "computer is slow"),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_outcome_card_rendering() {
    let card = OutcomeCard {
        status: OutcomeStatus::Resolved,
        root_cause: "Runaway process".to_string(),
        actions_taken: vec![ActionTaken {
            label: "renice -n 10 -p 4242".to_string(),
            risk: Risk::SafeWrite,
        }],
        results: vec!["Load decreased: OK".to_string()],
        prevention_tips: vec!["Watch for processes stuck in a loop".to_string()],
        confidence: 0.9,
    };
    let text = render::outcome(&card);
    assert!(text.contains("resolved"));
    assert!(text.contains("Runaway process"));
    assert!(text.contains("renice -n 10 -p 4242"));
    assert!(text.contains("Load decreased: OK"));
    assert!(text.contains("90%"));
}
