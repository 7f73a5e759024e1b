//! doctorctl - System Doctor CLI

use clap::Parser;
use doctorctl::cli::Cli;
use doctorctl::{commands, render};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("DOCTOR_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = commands::run(cli).await {
        eprintln!("{}", render::error(&format!("{:#}", e)));
        std::process::exit(1);
    }
}
