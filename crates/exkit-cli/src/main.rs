use std::process::ExitCode;

use clap::Parser;

use exkit_cli::{ContextOptions, Scenario, run_main};
use exkit_core::Sink;

/// Exit status for setup failures (bad config, bad flags), distinct from
/// the configurable status of unhandled errors.
const SETUP_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "exkit",
    about = "exkit: run structured-error scenarios through the try/except/finally engine",
    version
)]
pub struct Cli {
    /// Scenario to run
    #[arg(value_enum)]
    scenario: Scenario,

    #[command(flatten)]
    context: ContextOptions,
}

pub fn run(args: Cli) -> ExitCode {
    // Initialize tracing subscriber for logging
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    // panics inside a dispatcher are normalized there; report the rest as usual
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if exkit_core::in_dispatch() {
            tracing::debug!(%info, "panic intercepted");
        } else {
            previous(info);
        }
    }));

    let outcome = match run_main(&args.context, args.scenario, Sink::stderr()) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {e}");
            tracing::error!(error = %e, "setup failed");
            return ExitCode::from(SETUP_FAILURE);
        }
    };

    match outcome.report(&mut std::io::stdout()) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "cannot write output");
            ExitCode::FAILURE
        }
    }
}

pub fn main() -> ExitCode {
    let args = Cli::parse();
    run(args)
}
