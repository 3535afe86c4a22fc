//! Command-line options shared by the exkit binary and its tests.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use exkit_core::DebugLevel;

/// How unhandled errors are written to stderr.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Rendered text, with a stack trace unless capture is off.
    #[default]
    Text,
    /// One JSON object per error.
    Json,
}

/// Options for building the engine context.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextOptions {
    /// TOML file with context settings and kind declarations.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Stack capture level: none, context, stack, all (or 0-3).
    /// Overrides the config file and EXKIT_DEBUG_LEVEL.
    #[arg(long = "debug-level", value_name = "LEVEL", value_parser = DebugLevel::parse)]
    pub debug_level: Option<DebugLevel>,

    /// Exit code for unhandled errors. Overrides the config file and EXKIT_EXIT_CODE.
    #[arg(long = "exit-code", value_name = "CODE")]
    pub exit_code: Option<i32>,

    /// Output format for unhandled errors.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = Some(level);
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        context: ContextOptions,
    }

    #[test]
    fn test_parse_flags() {
        let args = Harness::parse_from([
            "exkit",
            "--debug-level",
            "stack",
            "--exit-code",
            "3",
            "--format",
            "json",
            "-c",
            "exkit.toml",
        ]);
        assert_eq!(args.context.debug_level, Some(DebugLevel::Stack));
        assert_eq!(args.context.exit_code, Some(3));
        assert_eq!(args.context.format, OutputFormat::Json);
        assert_eq!(args.context.config, Some(PathBuf::from("exkit.toml")));
    }

    #[test]
    fn test_rejects_unknown_debug_level() {
        let err = Harness::try_parse_from(["exkit", "--debug-level", "loud"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
