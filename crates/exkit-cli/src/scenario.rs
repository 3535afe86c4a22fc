//! Canned programs that drive the dispatcher through its main paths.

use clap::ValueEnum;

use exkit_core::{Clause, Context, ErrorRecord, MatchPredicate, Try, frame};

/// Kinds every scenario relies on, registered when the config does not
/// declare them.
pub const SCENARIO_KINDS: &[(&str, Option<&str>)] = &[
    ("io", Some("runtime")),
    ("io.open", Some("io")),
    ("cleanup", None),
];

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// A matching clause handles the failure and a finally block decorates the result.
    Handled,
    /// An inner dispatcher re-raises; the outer one handles it by kind ancestry.
    Nested,
    /// The body fails unhandled and a finally block fails as well.
    Cascade,
    /// No clause matches; the failure reaches the top level.
    Unhandled,
    /// A panic in the body is normalized and handled as a runtime failure.
    Panic,
}

impl Scenario {
    pub fn run(self, ctx: &Context) -> Result<String, ErrorRecord> {
        tracing::debug!(scenario = ?self, "running scenario");
        match self {
            Scenario::Handled => handled(ctx),
            Scenario::Nested => nested(ctx),
            Scenario::Cascade => cascade(ctx),
            Scenario::Unhandled => unhandled(ctx),
            Scenario::Panic => panicking(ctx),
        }
    }
}

fn open_settings(ctx: &Context, path: &str) -> Result<String, ErrorRecord> {
    let _frame = frame!("open_settings", args);
    Err(ctx.raise(
        ctx.error("io.open", "cannot open file")
            .with_id("E_OPEN")
            .with_property("path", path),
    ))
}

fn handled(ctx: &Context) -> Result<String, ErrorRecord> {
    let _frame = frame!("handled");
    Try::new(|| open_settings(ctx, "/etc/exkit/settings.toml"))
        .except(Clause::when(MatchPredicate::kind("io.open")).then(|_, value: Option<String>| {
            Ok(value.unwrap_or_default() + "(handled)")
        }))
        .finally(|_, value| {
            if let Some(value) = value {
                value.push_str("(cleanup)");
            }
            Ok(())
        })
        .run(ctx)
}

fn nested(ctx: &Context) -> Result<String, ErrorRecord> {
    let _frame = frame!("nested");
    Try::new(|| {
        let settings = Try::new(|| open_settings(ctx, "/etc/exkit/settings.toml"))
            .except(Clause::when(MatchPredicate::id("E_OPEN")))
            .run_or_throw(ctx);
        Ok(settings)
    })
    .except(Clause::when(MatchPredicate::kind_of("io")).then(|err, _| {
        Ok(format!("recovered: {}", err.message()))
    }))
    .run(ctx)
}

fn cascade(ctx: &Context) -> Result<String, ErrorRecord> {
    let _frame = frame!("cascade");
    Try::new(|| open_settings(ctx, "/etc/exkit/settings.toml"))
        .except(Clause::when(MatchPredicate::kind("cleanup")).then(|_, _| Ok(String::new())))
        .finally(|_, _| {
            let _frame = frame!("release_lock");
            Err(ctx.raise(ctx.error("cleanup", "cannot release lock")))
        })
        .run(ctx)
}

fn unhandled(ctx: &Context) -> Result<String, ErrorRecord> {
    let _frame = frame!("unhandled");
    Try::new(|| open_settings(ctx, "/etc/exkit/settings.toml"))
        .except(Clause::when(MatchPredicate::literal("permission denied")).then(|_, _| {
            Ok(String::new())
        }))
        .run(ctx)
}

fn panicking(ctx: &Context) -> Result<String, ErrorRecord> {
    let _frame = frame!("panic");
    let values: Vec<u32> = Vec::new();
    Try::new(|| Ok(values[3].to_string()))
        .except(Clause::when(MatchPredicate::kind_of(ctx.runtime_kind())).then(|err, _| {
            Ok(format!("recovered from panic: {}", err.message()))
        }))
        .run(ctx)
}
