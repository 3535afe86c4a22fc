//! Typed values for the property bag carried by an error.

use serde::{Serialize, Serializer};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Property bag: string keys, sorted for stable rendering.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A property value. Closed set of variants, plus an opaque escape hatch for
/// values the engine only carries around.
#[derive(Clone)]
pub enum PropertyValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl PropertyValue {
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        PropertyValue::Opaque(Arc::new(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            PropertyValue::Opaque(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Text form used by text matching. Opaque values have none.
    pub fn as_text(&self) -> Option<String> {
        match self {
            PropertyValue::Str(s) => Some(s.clone()),
            PropertyValue::Int(i) => Some(i.to_string()),
            PropertyValue::Bool(b) => Some(b.to_string()),
            PropertyValue::Opaque(_) => None,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyValue::Str(a), PropertyValue::Str(b)) => a == b,
            (PropertyValue::Int(a), PropertyValue::Int(b)) => a == b,
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => a == b,
            (PropertyValue::Opaque(a), PropertyValue::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => write!(f, "Str({s:?})"),
            PropertyValue::Int(i) => write!(f, "Int({i})"),
            PropertyValue::Bool(b) => write!(f, "Bool({b})"),
            PropertyValue::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => f.write_str(s),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyValue::Str(s) => serializer.serialize_str(s),
            PropertyValue::Int(i) => serializer.serialize_i64(*i),
            PropertyValue::Bool(b) => serializer.serialize_bool(*b),
            PropertyValue::Opaque(_) => serializer.serialize_str("<opaque>"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value.into())
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Int(value.into())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Handle(u16);

    #[test]
    fn test_accessors() {
        assert_eq!(PropertyValue::from("path").as_str(), Some("path"));
        assert_eq!(PropertyValue::from(7).as_int(), Some(7));
        assert_eq!(PropertyValue::from(true).as_bool(), Some(true));
        assert_eq!(PropertyValue::from(7).as_str(), None);
    }

    #[test]
    fn test_opaque_identity() {
        let a = PropertyValue::opaque(Handle(3));
        let b = a.clone();
        let c = PropertyValue::opaque(Handle(3));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<Handle>(), Some(&Handle(3)));
        assert_eq!(a.as_text(), None);
        assert_eq!(a.to_string(), "<opaque>");
    }

    #[test]
    fn test_serialize() {
        let mut props = Properties::new();
        props.insert("errno".into(), 2.into());
        props.insert("path".into(), "/etc/app.toml".into());
        props.insert("handle".into(), PropertyValue::opaque(Handle(1)));
        let json = serde_json::to_string(&props).unwrap();
        assert_eq!(
            json,
            r#"{"errno":2,"handle":"<opaque>","path":"/etc/app.toml"}"#
        );
    }
}
