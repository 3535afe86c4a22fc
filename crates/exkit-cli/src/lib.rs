//! exkit command-line interface.
//!
//! Builds an engine context from a config file, `EXKIT_*` variables and
//! flags, runs a named scenario in it and reports the outcome.

pub mod options;
pub mod scenario;

use std::io::{self, Write};
use std::process::ExitCode;

use exkit_core::{Context, ContextConfig, DisplayChain, ErrorRecord, JsonDisplay, KindId, Sink};
use exkit_error::Result;

pub use options::{ContextOptions, OutputFormat};
pub use scenario::{SCENARIO_KINDS, Scenario};

/// Build the context a scenario runs in.
///
/// Settings are layered: config file, then `EXKIT_*` variables, then
/// command-line flags.
pub fn build_context(opts: &ContextOptions, sink: Sink) -> Result<Context> {
    let config = match &opts.config {
        Some(path) => ContextConfig::from_path(path)?,
        None => ContextConfig::default(),
    };
    let mut config = config.apply_env()?;
    if let Some(level) = opts.debug_level {
        config.debug_level = level;
    }
    if let Some(code) = opts.exit_code {
        config.exit_code = code;
    }

    let mut ctx = Context::from_config(&config)?.with_sink(sink);
    for (name, parent) in SCENARIO_KINDS {
        if !ctx.kinds().contains(&KindId::new(*name)) {
            ctx.register_kind(name, *parent)?;
        }
    }

    if opts.format == OutputFormat::Json {
        let mut chain = DisplayChain::empty();
        chain.push(JsonDisplay);
        let template = ctx.template().clone().with_display_chain(chain);
        ctx = ctx.with_template(template);
    }
    tracing::debug!(?config, format = ?opts.format, "context ready");
    Ok(ctx)
}

/// Main entry point: run `scenario` in a context built from `opts`.
pub fn run_main(opts: &ContextOptions, scenario: Scenario, sink: Sink) -> Result<RunOutcome> {
    let ctx = build_context(opts, sink)?;
    let result = scenario.run(&ctx);
    Ok(RunOutcome { ctx, result })
}

/// A finished scenario and the context it ran in.
#[derive(Debug)]
pub struct RunOutcome {
    pub ctx: Context,
    pub result: std::result::Result<String, ErrorRecord>,
}

impl RunOutcome {
    /// Print the returned value to `out`, or deliver the residual failure
    /// through the context's display chain.
    pub fn report(&self, out: &mut dyn Write) -> io::Result<ExitCode> {
        match &self.result {
            Ok(output) => {
                writeln!(out, "{output}")?;
                Ok(ExitCode::SUCCESS)
            }
            Err(error) => Ok(self.ctx.deliver(error)),
        }
    }
}
