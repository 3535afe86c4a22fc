//! A single captured call-site.

use serde::Serialize;
use std::fmt;

/// Unit name the engine stamps on its own frames.
///
/// Any frame whose unit is `exkit` or lives under `exkit::` is treated as
/// engine machinery by the capture policy.
pub const ENGINE_UNIT: &str = "exkit";

/// One call-site, immutable once captured.
///
/// Equality compares every field. Two absent values are equal; an absent
/// value never equals a present one. This is what the stack merger relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StackFrame {
    unit: Option<String>,
    source: Option<String>,
    line: Option<u32>,
    activation: Option<String>,
    has_arguments: bool,
    multiple_return: Option<bool>,
}

impl StackFrame {
    pub fn new(
        unit: impl Into<String>,
        source: impl Into<String>,
        line: u32,
        activation: impl Into<String>,
    ) -> Self {
        Self {
            unit: Some(unit.into()),
            source: Some(source.into()),
            line: Some(line),
            activation: Some(activation.into()),
            has_arguments: false,
            multiple_return: None,
        }
    }

    /// A frame with nothing known about it.
    pub fn unknown() -> Self {
        Self {
            unit: None,
            source: None,
            line: None,
            activation: None,
            has_arguments: false,
            multiple_return: None,
        }
    }

    /// A frame belonging to the engine itself.
    pub fn internal(activation: impl Into<String>) -> Self {
        Self {
            unit: Some(ENGINE_UNIT.to_string()),
            source: Some(file!().to_string()),
            line: None,
            activation: Some(activation.into()),
            has_arguments: false,
            multiple_return: None,
        }
    }

    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    pub fn with_activation(mut self, activation: Option<String>) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_arguments(mut self, has_arguments: bool) -> Self {
        self.has_arguments = has_arguments;
        self
    }

    pub fn with_multiple_return(mut self, multiple_return: Option<bool>) -> Self {
        self.multiple_return = multiple_return;
        self
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn activation(&self) -> Option<&str> {
        self.activation.as_deref()
    }

    pub fn has_arguments(&self) -> bool {
        self.has_arguments
    }

    pub fn multiple_return(&self) -> Option<bool> {
        self.multiple_return
    }

    /// Whether this frame belongs to the engine's own machinery.
    pub fn is_internal(&self) -> bool {
        match self.unit.as_deref() {
            Some(unit) => {
                unit == ENGINE_UNIT
                    || unit
                        .strip_prefix(ENGINE_UNIT)
                        .is_some_and(|rest| rest.starts_with("::"))
            }
            None => false,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.unit, &self.activation) {
            (Some(unit), Some(activation)) => write!(f, "{unit}::{activation}")?,
            (None, Some(activation)) => write!(f, "{activation}")?,
            (Some(unit), None) => write!(f, "{unit}")?,
            (None, None) => write!(f, "<unknown>")?,
        }
        if self.has_arguments {
            write!(f, "(..)")?;
        }
        if let Some(source) = &self.source {
            write!(f, " at {source}")?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
        }
        Ok(())
    }
}
