//! Error kinds for exkit setup and configuration

use strum_macros::{Display, IntoStaticStr};

/// The kind of misuse that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Kind registry
    // =========================================================================
    /// A kind with this name is already registered
    DuplicateKind,

    /// Referenced kind (usually a parent) is not registered
    UnknownKind,

    // =========================================================================
    // Matching
    // =========================================================================
    /// A text pattern failed to compile
    InvalidPattern,

    // =========================================================================
    // Configuration
    // =========================================================================
    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Debug level outside 0..=3 or not a known level name
    InvalidDebugLevel,

    /// IO operation failed
    IoFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// Whether this kind is raised while loading configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConfigInvalid | ErrorKind::InvalidDebugLevel | ErrorKind::IoFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::InvalidPattern.to_string(), "InvalidPattern");
        assert_eq!(ErrorKind::UnknownKind.as_str(), "UnknownKind");
    }

    #[test]
    fn test_is_config() {
        assert!(ErrorKind::ConfigInvalid.is_config());
        assert!(ErrorKind::InvalidDebugLevel.is_config());
        assert!(!ErrorKind::DuplicateKind.is_config());
        assert!(!ErrorKind::InvalidPattern.is_config());
    }
}
