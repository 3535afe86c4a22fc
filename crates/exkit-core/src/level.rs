//! How much stack context a raise captures.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

use exkit_error::{Error, Result};

/// Debug verbosity, ordered from no capture to everything.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// No capture; the record's stack stays absent.
    None = 0,
    /// The raise site only: one frame, the first outside the engine.
    #[default]
    Context = 1,
    /// Every frame from the raise point outward, engine frames excluded.
    Stack = 2,
    /// Every frame, engine frames included.
    All = 3,
}

impl DebugLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse either a level name (`"stack"`) or its number (`"2"`).
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Ok(number) = text.parse::<u8>() {
            return Self::try_from(number);
        }
        text.parse::<DebugLevel>()
            .map_err(|_| Error::invalid_debug_level(text).with_operation("level::parse"))
    }
}

impl TryFrom<u8> for DebugLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DebugLevel::None),
            1 => Ok(DebugLevel::Context),
            2 => Ok(DebugLevel::Stack),
            3 => Ok(DebugLevel::All),
            other => Err(Error::invalid_debug_level(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exkit_error::ErrorKind;

    #[test]
    fn test_parse_names_and_numbers() {
        assert_eq!(DebugLevel::parse("none").unwrap(), DebugLevel::None);
        assert_eq!(DebugLevel::parse("STACK").unwrap(), DebugLevel::Stack);
        assert_eq!(DebugLevel::parse(" 3 ").unwrap(), DebugLevel::All);
        assert_eq!(DebugLevel::parse("1").unwrap(), DebugLevel::Context);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = DebugLevel::parse("7").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDebugLevel);
        let err = DebugLevel::parse("verbose").unwrap_err();
        assert_eq!(err.operation(), "level::parse");
    }

    #[test]
    fn test_ordering_and_display() {
        assert!(DebugLevel::None < DebugLevel::Context);
        assert!(DebugLevel::Stack < DebugLevel::All);
        assert_eq!(DebugLevel::All.as_u8(), 3);
        assert_eq!(DebugLevel::Context.to_string(), "context");
        assert_eq!(DebugLevel::default(), DebugLevel::Context);
    }
}
