//! Error kinds and the single-parent kind hierarchy.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use exkit_error::{Error, Result};

/// Kind assigned to native failures unless configured otherwise.
pub const RUNTIME_KIND: &str = "runtime";

/// Categorical identity of an error. The empty name is the unknown kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct KindId(String);

impl KindId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn runtime() -> Self {
        Self::new(RUNTIME_KIND)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("unknown")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for KindId {
    fn from(value: &str) -> Self {
        KindId::new(value)
    }
}

impl From<String> for KindId {
    fn from(value: String) -> Self {
        KindId::new(value)
    }
}

impl From<&KindId> for KindId {
    fn from(value: &KindId) -> Self {
        value.clone()
    }
}

/// Parent-link table answering is-a queries between kinds.
///
/// A parent must already be registered when its child is, so the table can
/// never contain a cycle.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    parents: HashMap<KindId, Option<KindId>>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KindRegistry {
    /// Registry holding the built-in roots: unknown and `runtime`.
    pub fn new() -> Self {
        let mut parents = HashMap::new();
        parents.insert(KindId::unknown(), None);
        parents.insert(KindId::runtime(), None);
        Self { parents }
    }

    /// Register `name` under `parent` (or as a root when `None`).
    pub fn register(&mut self, name: &str, parent: Option<&str>) -> Result<KindId> {
        if name.is_empty() {
            return Err(Error::invalid_argument("kind name must not be empty")
                .with_operation("kinds::register"));
        }
        let kind = KindId::new(name);
        if self.parents.contains_key(&kind) {
            return Err(Error::duplicate_kind(name).with_operation("kinds::register"));
        }
        let parent = match parent {
            Some(parent) => {
                let parent = KindId::new(parent);
                if !self.parents.contains_key(&parent) {
                    return Err(Error::unknown_kind(parent.as_str())
                        .with_operation("kinds::register")
                        .with_context("child", name));
                }
                Some(parent)
            }
            None => None,
        };
        tracing::debug!(
            kind = name,
            parent = ?parent.as_ref().map(KindId::as_str),
            "registered kind"
        );
        self.parents.insert(kind.clone(), parent);
        Ok(kind)
    }

    pub fn contains(&self, kind: &KindId) -> bool {
        self.parents.contains_key(kind)
    }

    pub fn parent(&self, kind: &KindId) -> Option<&KindId> {
        self.parents.get(kind).and_then(Option::as_ref)
    }

    /// `kind` followed by each of its ancestors, nearest first.
    pub fn lineage<'a>(&'a self, kind: &'a KindId) -> impl Iterator<Item = &'a KindId> + 'a {
        std::iter::successors(Some(kind), move |current| self.parent(current))
    }

    /// Whether `kind` is `ancestor` or descends from it.
    ///
    /// Unregistered kinds are only a kind of themselves.
    pub fn is_kind_of(&self, kind: &KindId, ancestor: &KindId) -> bool {
        self.lineage(kind).any(|k| k == ancestor)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exkit_error::ErrorKind;

    fn registry() -> KindRegistry {
        let mut kinds = KindRegistry::new();
        kinds.register("io", Some("runtime")).unwrap();
        kinds.register("io.open", Some("io")).unwrap();
        kinds.register("parse", None).unwrap();
        kinds
    }

    #[test]
    fn test_builtin_roots() {
        let kinds = KindRegistry::new();
        assert!(kinds.contains(&KindId::unknown()));
        assert!(kinds.contains(&KindId::runtime()));
        assert_eq!(kinds.len(), 2);
    }

    #[test]
    fn test_is_kind_of() {
        let kinds = registry();
        let open = KindId::new("io.open");
        assert!(kinds.is_kind_of(&open, &open));
        assert!(kinds.is_kind_of(&open, &KindId::new("io")));
        assert!(kinds.is_kind_of(&open, &KindId::runtime()));
        assert!(!kinds.is_kind_of(&KindId::new("io"), &open));
        assert!(!kinds.is_kind_of(&KindId::new("parse"), &KindId::runtime()));
    }

    #[test]
    fn test_unregistered_kind_is_only_itself() {
        let kinds = registry();
        let stray = KindId::new("stray");
        assert!(kinds.is_kind_of(&stray, &stray));
        assert!(!kinds.is_kind_of(&stray, &KindId::runtime()));
    }

    #[test]
    fn test_lineage() {
        let kinds = registry();
        let open = KindId::new("io.open");
        let names: Vec<_> = kinds.lineage(&open).map(KindId::as_str).collect();
        assert_eq!(names, vec!["io.open", "io", "runtime"]);
    }

    #[test]
    fn test_register_errors() {
        let mut kinds = registry();
        assert_eq!(
            kinds.register("io", None).unwrap_err().kind(),
            ErrorKind::DuplicateKind
        );
        let err = kinds.register("net.dns", Some("net")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownKind);
        assert_eq!(err.context_value("child"), Some("net.dns"));
        assert_eq!(
            kinds.register("", None).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_display_unknown() {
        assert_eq!(KindId::unknown().to_string(), "unknown");
        assert_eq!(KindId::new("io").to_string(), "io");
    }
}
