//! Subcommand handlers.

use crate::cli::{Cli, Commands, DiagnoseArgs};
use crate::render;
use anyhow::{bail, Context, Result};
use doctor_core::catalog;
use doctor_core::{
    actions_for, triage, DoctorConfig, DoctorError, ExecuteOptions, ExportFormat, RuleRegistry, ShellExecutor,
    Stream, StreamCallback, SystemDoctorEngine,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Triage { ref intent } => run_triage(&intent.join(" "), cli.json),
        Commands::Diagnose(ref args) => run_diagnose(cli.config.as_deref(), args, cli.json).await,
        Commands::Rules => run_rules(cli.json),
        Commands::Config => run_config(cli.config.as_deref(), cli.json),
    }
}

fn load_config(path: Option<&Path>) -> Result<DoctorConfig> {
    DoctorConfig::load(path).context("Failed to load configuration")
}

fn run_triage(intent: &str, json: bool) -> Result<()> {
    let result = triage(intent);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render::triage(&result));
    }
    Ok(())
}

fn run_rules(json: bool) -> Result<()> {
    let registry = RuleRegistry::with_defaults();
    if json {
        let listing: Vec<serde_json::Value> = registry
            .all_rules()
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "id": rule.id,
                    "severity": rule.emit.severity,
                    "title": rule.emit.title,
                    "explanation": rule.emit.explanation,
                    "confidence": rule.emit.confidence,
                    "condition": rule.condition.summary(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        println!("{}", render::rules(registry.all_rules()));
    }
    Ok(())
}

fn run_config(path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", config.to_toml().context("Failed to serialize configuration")?);
    }
    Ok(())
}

fn write_export(engine: &SystemDoctorEngine, args: &DiagnoseArgs) -> Result<()> {
    let Some(path) = &args.export else {
        return Ok(());
    };
    let format = ExportFormat::from(args.format);
    let body = engine
        .export_transcript(format)
        .context("Failed to export transcript")?;
    std::fs::write(path, body).with_context(|| format!("Failed to write transcript to {}", path.display()))?;
    info!("Transcript written to {} ({})", path.display(), format);
    Ok(())
}

async fn run_diagnose(config_path: Option<&Path>, args: &DiagnoseArgs, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let mut engine = SystemDoctorEngine::new(config, Arc::new(ShellExecutor::new()))
        .context("Failed to start doctor session")?;
    let intent = args.intent_text();

    // Inspect
    engine.intake(&intent);
    let plan = engine.build_inspect_plan(&intent, None);
    let before = engine.collect_evidence(&plan.steps, None).await;
    let findings = engine.interpret(&before, None);
    let candidates = catalog::diagnosis_candidates(&plan.playbook_id);
    let diagnosis = engine.diagnose(&findings, &candidates);
    let fixes = catalog::fix_options(&diagnosis.primary.cause_id, &before);
    let options = engine.recommend(&diagnosis, &fixes);

    let Some(choice) = args.fix else {
        if json {
            let summary = serde_json::json!({
                "session": engine.session(),
                "playbook": plan.playbook_id,
                "findings": findings,
                "diagnosis": diagnosis,
                "fixes": options,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{}\n", render::findings(&findings));
            println!("{}\n", render::diagnosis(&diagnosis));
            println!("{}", render::fix_menu(&options));
        }
        return write_export(&engine, args);
    };

    let Some(option) = choice.checked_sub(1).and_then(|i| options.get(i)) else {
        write_export(&engine, args)?;
        bail!("No fix #{} (the menu has {} options)", choice, options.len());
    };

    if !json {
        println!("{}\n", render::diagnosis(&diagnosis));
        println!("Applying: {} {}", option.risk.indicator(), option.label);
    }

    // Execute
    let printer = |chunk: &str, stream: Stream| render::stream_chunk(chunk, stream);
    let stream: Option<&StreamCallback> = if json { None } else { Some(&printer) };
    let execute = ExecuteOptions {
        confirmed: args.yes,
        confirmation_text: args.confirm_text.as_deref(),
        stream,
    };
    let results = match engine.execute_fix(&option.plan, execute).await {
        Ok(results) => results,
        Err(e @ DoctorError::GateDenied { .. }) => {
            eprintln!("{}", option.risk.describe());
            write_export(&engine, args)?;
            return Err(e.into());
        }
        Err(e) => {
            write_export(&engine, args)?;
            return Err(e).context("Fix execution failed");
        }
    };

    // Verify
    let after = engine.collect_evidence(&plan.steps, None).await;
    let checks = catalog::verification_checks(&diagnosis.primary.cause_id);
    let verification = engine.verify(&before, &after, &checks);
    let actions = actions_for(option, &results);
    let outcome = engine.report(&diagnosis, &verification, &actions);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("\n{}", render::outcome(&outcome));
    }
    write_export(&engine, args)
}
