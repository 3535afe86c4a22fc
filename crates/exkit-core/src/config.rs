use std::fs;
use std::path::Path;

use serde::Deserialize;

use exkit_error::{Error, Result};

use crate::kind::RUNTIME_KIND;
use crate::level::DebugLevel;
use crate::record::DEFAULT_EXIT_CODE;

/// Environment variable overriding [`ContextConfig::debug_level`].
pub const DEBUG_LEVEL_VAR: &str = "EXKIT_DEBUG_LEVEL";
/// Environment variable overriding [`ContextConfig::exit_code`].
pub const EXIT_CODE_VAR: &str = "EXKIT_EXIT_CODE";

/// Settings a [`Context`](crate::Context) is built from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    #[serde(default)]
    pub debug_level: DebugLevel,
    #[serde(default = "ContextConfig::default_exit_code")]
    pub exit_code: i32,
    #[serde(default = "ContextConfig::default_runtime_kind")]
    pub runtime_kind: String,
    #[serde(default = "ContextConfig::default_max_arg_len")]
    pub max_arg_len: usize,
    #[serde(default)]
    pub kinds: Vec<KindDecl>,
}

/// A kind declared in configuration, registered in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindDecl {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            debug_level: DebugLevel::default(),
            exit_code: Self::default_exit_code(),
            runtime_kind: Self::default_runtime_kind(),
            max_arg_len: Self::default_max_arg_len(),
            kinds: Vec::new(),
        }
    }
}

impl ContextConfig {
    fn default_exit_code() -> i32 {
        DEFAULT_EXIT_CODE
    }

    fn default_runtime_kind() -> String {
        RUNTIME_KIND.to_string()
    }

    fn default_max_arg_len() -> usize {
        64
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            Error::from(err)
                .with_operation("config::from_path")
                .with_context("path", path.display().to_string())
        })?;
        Self::from_toml_str(&text)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| {
            Error::config_invalid(format!("invalid TOML: {}", err.message()))
                .with_operation("config::from_toml_str")
                .set_source(err)
        })
    }

    /// Apply `EXKIT_DEBUG_LEVEL` and `EXKIT_EXIT_CODE` from the process
    /// environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(level) = lookup(DEBUG_LEVEL_VAR) {
            self.debug_level = DebugLevel::parse(&level)
                .map_err(|err| err.with_operation("config::apply_vars"))?;
        }
        if let Some(code) = lookup(EXIT_CODE_VAR) {
            self.exit_code = code.trim().parse().map_err(|_| {
                Error::config_invalid(format!("{EXIT_CODE_VAR} must be an integer"))
                    .with_operation("config::apply_vars")
                    .with_context("value", code.clone())
            })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exkit_error::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::from_toml_str("").unwrap();
        assert_eq!(config, ContextConfig::default());
        assert_eq!(config.debug_level, DebugLevel::Context);
        assert_eq!(config.exit_code, 255);
        assert_eq!(config.runtime_kind, "runtime");
        assert_eq!(config.max_arg_len, 64);
    }

    #[test]
    fn test_parse_full_config() {
        let config = ContextConfig::from_toml_str(
            r#"
            debug_level = "all"
            exit_code = 3
            max_arg_len = 0

            [[kinds]]
            name = "io"
            parent = "runtime"

            [[kinds]]
            name = "io.open"
            parent = "io"
            "#,
        )
        .unwrap();
        assert_eq!(config.debug_level, DebugLevel::All);
        assert_eq!(config.exit_code, 3);
        assert_eq!(config.max_arg_len, 0);
        assert_eq!(
            config.kinds,
            vec![
                KindDecl { name: "io".into(), parent: Some("runtime".into()) },
                KindDecl { name: "io.open".into(), parent: Some("io".into()) },
            ]
        );
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = ContextConfig::from_toml_str("verbosity = 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert!(err.source_ref().is_some());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exkit.toml");
        fs::write(&path, "debug_level = \"stack\"\n").unwrap();
        assert_eq!(ContextConfig::from_path(&path).unwrap().debug_level, DebugLevel::Stack);

        let missing = ContextConfig::from_path(dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::IoFailed);
        assert_eq!(missing.operation(), "config::from_path");
    }

    #[test]
    fn test_apply_vars() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(DEBUG_LEVEL_VAR, "2"), (EXIT_CODE_VAR, " 9 ")]);
        let config = ContextConfig::default()
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.debug_level, DebugLevel::Stack);
        assert_eq!(config.exit_code, 9);
    }

    #[test]
    fn test_apply_vars_rejects_bad_values() {
        let err = ContextConfig::default()
            .apply_vars(|name| (name == EXIT_CODE_VAR).then(|| "many".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = ContextConfig::default()
            .apply_vars(|name| (name == DEBUG_LEVEL_VAR).then(|| "loud".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDebugLevel);
    }
}
