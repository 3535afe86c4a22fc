//! Conditions a handler clause uses to decide whether it applies.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

use exkit_error::{Error, Result};

use crate::kind::{KindId, KindRegistry};
use crate::record::ErrorRecord;
use crate::value::PropertyValue;

/// What part of a record a text pattern or predicate function looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// All message lines.
    Message,
    /// One named property; records without it never match.
    Property(String),
}

#[derive(Clone)]
pub enum TextPattern {
    /// Equal to a whole message line (or the whole property text).
    Literal(String),
    Regex(Regex),
}

type PredicateFn = Arc<dyn Fn(&PropertyValue) -> bool + Send + Sync>;

/// A stateless condition evaluated against one record.
#[derive(Clone)]
pub enum MatchPredicate {
    /// `error.kind == kind`.
    Kind(KindId),
    /// `error.kind` is `kind` or one of its registered descendants.
    KindOf(KindId),
    /// `error.id == id`.
    Id(String),
    /// Same kind and identifier as a reference record.
    Instance { kind: KindId, id: Option<String> },
    Text { subject: Subject, pattern: TextPattern },
    Predicate { subject: Subject, test: PredicateFn },
}

impl MatchPredicate {
    pub fn kind(kind: impl Into<KindId>) -> Self {
        MatchPredicate::Kind(kind.into())
    }

    pub fn kind_of(kind: impl Into<KindId>) -> Self {
        MatchPredicate::KindOf(kind.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        MatchPredicate::Id(id.into())
    }

    /// Matches records that share `error`'s kind and identifier, which is
    /// what a clone of `error` re-raised elsewhere looks like.
    pub fn instance(error: &ErrorRecord) -> Self {
        MatchPredicate::Instance {
            kind: error.kind().clone(),
            id: error.id().map(str::to_string),
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        MatchPredicate::Text {
            subject: Subject::Message,
            pattern: TextPattern::Literal(text.into()),
        }
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(MatchPredicate::Text {
            subject: Subject::Message,
            pattern: TextPattern::Regex(compile(pattern)?),
        })
    }

    pub fn property_literal(name: impl Into<String>, text: impl Into<String>) -> Self {
        MatchPredicate::Text {
            subject: Subject::Property(name.into()),
            pattern: TextPattern::Literal(text.into()),
        }
    }

    pub fn property_regex(name: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(MatchPredicate::Text {
            subject: Subject::Property(name.into()),
            pattern: TextPattern::Regex(compile(pattern)?),
        })
    }

    /// Call `test` with the message text as a [`PropertyValue::Str`].
    pub fn message<F>(test: F) -> Self
    where
        F: Fn(&PropertyValue) -> bool + Send + Sync + 'static,
    {
        MatchPredicate::Predicate {
            subject: Subject::Message,
            test: Arc::new(test),
        }
    }

    /// Call `test` with the value of property `name`.
    pub fn property<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&PropertyValue) -> bool + Send + Sync + 'static,
    {
        MatchPredicate::Predicate {
            subject: Subject::Property(name.into()),
            test: Arc::new(test),
        }
    }

    pub fn matches(&self, error: &ErrorRecord, kinds: &KindRegistry) -> bool {
        match self {
            MatchPredicate::Kind(kind) => error.kind() == kind,
            MatchPredicate::KindOf(kind) => kinds.is_kind_of(error.kind(), kind),
            MatchPredicate::Id(id) => error.id() == Some(id.as_str()),
            MatchPredicate::Instance { kind, id } => {
                error.kind() == kind && error.id() == id.as_deref()
            }
            MatchPredicate::Text { subject, pattern } => match subject {
                Subject::Message => match pattern {
                    TextPattern::Literal(text) => {
                        error.lines().iter().any(|line| line == text) || error.message() == *text
                    }
                    TextPattern::Regex(regex) => regex.is_match(&error.message()),
                },
                Subject::Property(name) => {
                    let Some(text) = error.property(name).and_then(PropertyValue::as_text) else {
                        return false;
                    };
                    match pattern {
                        TextPattern::Literal(literal) => text == *literal,
                        TextPattern::Regex(regex) => regex.is_match(&text),
                    }
                }
            },
            MatchPredicate::Predicate { subject, test } => match subject {
                Subject::Message => test(&PropertyValue::Str(error.message())),
                Subject::Property(name) => error.property(name).is_some_and(|value| test(value)),
            },
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| {
        Error::invalid_pattern(pattern, err.to_string()).with_operation("matcher::compile")
    })
}

impl fmt::Debug for MatchPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPredicate::Kind(kind) => write!(f, "Kind({kind})"),
            MatchPredicate::KindOf(kind) => write!(f, "KindOf({kind})"),
            MatchPredicate::Id(id) => write!(f, "Id({id})"),
            MatchPredicate::Instance { kind, id } => write!(f, "Instance({kind}, {id:?})"),
            MatchPredicate::Text { subject, pattern } => match pattern {
                TextPattern::Literal(text) => write!(f, "Literal({subject:?}, {text:?})"),
                TextPattern::Regex(regex) => write!(f, "Regex({subject:?}, {:?})", regex.as_str()),
            },
            MatchPredicate::Predicate { subject, .. } => write!(f, "Predicate({subject:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exkit_error::ErrorKind;

    fn kinds() -> KindRegistry {
        let mut kinds = KindRegistry::new();
        kinds.register("io", Some("runtime")).unwrap();
        kinds.register("io.open", Some("io")).unwrap();
        kinds
    }

    fn open_error() -> ErrorRecord {
        ErrorRecord::new("io.open")
            .with_id("E_OPEN")
            .with_line("cannot open file")
            .with_line("while loading settings")
            .with_property("path", "/etc/app.toml")
            .with_property("errno", 2)
    }

    #[test]
    fn test_kind_is_exact() {
        let kinds = kinds();
        let err = open_error();
        assert!(MatchPredicate::kind("io.open").matches(&err, &kinds));
        assert!(!MatchPredicate::kind("io").matches(&err, &kinds));
    }

    #[test]
    fn test_kind_of_follows_parents() {
        let kinds = kinds();
        let err = open_error();
        assert!(MatchPredicate::kind_of("io").matches(&err, &kinds));
        assert!(MatchPredicate::kind_of("runtime").matches(&err, &kinds));
        assert!(!MatchPredicate::kind_of("parse").matches(&err, &kinds));
    }

    #[test]
    fn test_id_and_instance() {
        let kinds = kinds();
        let err = open_error();
        assert!(MatchPredicate::id("E_OPEN").matches(&err, &kinds));
        assert!(!MatchPredicate::id("E_READ").matches(&err, &kinds));

        let reraised = err.clone().with_line("again");
        assert!(MatchPredicate::instance(&err).matches(&reraised, &kinds));

        let other_id = ErrorRecord::new("io.open").with_id("E_READ");
        assert!(!MatchPredicate::instance(&err).matches(&other_id, &kinds));
        let other_kind = ErrorRecord::new("io").with_id("E_OPEN");
        assert!(!MatchPredicate::instance(&err).matches(&other_kind, &kinds));
    }

    #[test]
    fn test_literal_matches_a_whole_line() {
        let kinds = kinds();
        let err = open_error();
        assert!(MatchPredicate::literal("cannot open file").matches(&err, &kinds));
        assert!(MatchPredicate::literal("while loading settings").matches(&err, &kinds));
        assert!(!MatchPredicate::literal("cannot open").matches(&err, &kinds));
    }

    #[test]
    fn test_regex_on_message_and_property() {
        let kinds = kinds();
        let err = open_error();
        assert!(MatchPredicate::regex(r"^cannot \w+ file").unwrap().matches(&err, &kinds));
        assert!(MatchPredicate::regex(r"(?m)^while").unwrap().matches(&err, &kinds));
        assert!(MatchPredicate::property_regex("path", r"\.toml$").unwrap().matches(&err, &kinds));
        assert!(MatchPredicate::property_literal("errno", "2").matches(&err, &kinds));
        assert!(!MatchPredicate::property_regex("missing", ".*").unwrap().matches(&err, &kinds));
    }

    #[test]
    fn test_invalid_regex() {
        let err = MatchPredicate::regex("(unclosed").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
        assert_eq!(err.operation(), "matcher::compile");
        assert_eq!(err.context_value("pattern"), Some("(unclosed"));
    }

    #[test]
    fn test_predicates_bind_subject() {
        let kinds = kinds();
        let err = open_error();
        let on_message = MatchPredicate::message(|v| v.as_str().is_some_and(|s| s.contains("loading")));
        let on_errno = MatchPredicate::property("errno", |v| v.as_int() == Some(2));
        let on_missing = MatchPredicate::property("user", |_| true);
        assert!(on_message.matches(&err, &kinds));
        assert!(on_errno.matches(&err, &kinds));
        assert!(!on_missing.matches(&err, &kinds));
    }
}
